//! End-to-end ingest tests.
//!
//! Tests cover:
//! - Report directory scanning with UTF-8 and UTF-16LE inputs
//! - Key resolution and per-directory skip behaviour
//! - Re-ingest overwrite semantics
//! - The SQLite adapter behind the same pipeline
//! - Rollups over stored reports

mod common;

use approx::assert_relative_eq;
use common::*;
use tempfile::TempDir;
use tradestats::cli::run_ingest_pipeline;
use tradestats::domain::config_validation::IngestSettings;
use tradestats::domain::error::TradeStatsError;
use tradestats::domain::labels::{Instrument, ReportKey, Schedule};
use tradestats::ports::report_store::ReportStore;

fn us30_key() -> ReportKey {
    ReportKey {
        instrument: Instrument::Us30,
        schedule: Schedule::DailyLondon,
        agent: "Cyberspace EA".into(),
    }
}

fn xau_key() -> ReportKey {
    ReportKey {
        instrument: Instrument::Xau,
        schedule: Schedule::Daily,
        agent: "Breakout EA by currency pro".into(),
    }
}

fn us30_statement() -> String {
    statement_html(
        "US30.cash",
        &[
            deal("2024.01.02 15:30:00", "2", "in", "11", "38 000.00", "0.00"),
            deal("2024.01.02 17:45:00", "3", "out", "11", "38 050.00", "50.00"),
            deal("2024.02.05 16:00:00", "5", "out", "12", "37 990.00", "-10.00"),
        ],
    )
}

fn xau_statement() -> String {
    statement_html(
        "XAUUSD",
        &[
            deal("2024.03.01 09:00", "7", "in", "21", "2 050.10", "0.00"),
            deal("2024.03.01 11:00", "8", "out", "21", "2 055.10", "25.00"),
            deal("2024.04.02 10:00", "9", "in", "22", "2 100.00", "0.00"),
            deal("2024.04.02 12:00", "10", "out", "22", "2 098.00", "-10.00"),
        ],
    )
}

/// Two valid report folders plus two that must be skipped.
fn setup_reports() -> TempDir {
    let root = TempDir::new().unwrap();
    let balance = balance_csv(&[
        ("2024.01.03 00:00", "10049.00", "10040.00"),
        ("2023.02.30 10:00", "1.00", "1.00"),
        ("2024.01.02", "10000.00", "abc"),
    ]);
    write_report_dir(
        root.path(),
        "US30 Daily + London (Cyberspace)",
        &utf16le_with_bom(&us30_statement()),
        Some(&utf16le_with_bom(&balance)),
    );
    write_report_dir(root.path(), "XAU Daily", xau_statement().as_bytes(), None);
    write_report_dir(
        root.path(),
        "GER40 weekly",
        statement_html("GER40", &[]).as_bytes(),
        None,
    );
    std::fs::create_dir(root.path().join("Empty Daily")).unwrap();
    root
}

mod mock_pipeline {
    use super::*;

    #[test]
    fn ingests_valid_directories_and_skips_the_rest() {
        let root = setup_reports();
        let store = MockReportStore::new();

        let outcome =
            run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();

        assert_eq!(outcome.ingested, vec![us30_key(), xau_key()]);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(skipped, vec!["Empty Daily", "GER40 weekly"]);
        assert!(outcome.skipped[0].1.contains("no statement file"));
        assert!(outcome.skipped[1].1.contains("instrument"));
        assert_eq!(store.report_count(), 2);
    }

    #[test]
    fn utf16_statement_summary_is_parsed() {
        let root = setup_reports();
        let store = MockReportStore::new();
        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();

        let summary = store.summary(&us30_key()).unwrap();
        assert_eq!(summary.instrument, Some(Instrument::Us30));
        assert_relative_eq!(summary.net_profit.unwrap(), 1234.56);
        assert_relative_eq!(summary.balance_drawdown_maximal.unwrap(), 300.0);
        assert_relative_eq!(summary.balance_drawdown_relative.unwrap(), 2.95);
        assert_relative_eq!(summary.equity_drawdown_relative.unwrap(), 3.10);
        assert_eq!(summary.total_trades, Some(40));
        assert_eq!(summary.profitable_trades, Some(26));
        assert_relative_eq!(summary.win_rate.unwrap(), 65.0);
        assert_relative_eq!(summary.loss_rate.unwrap(), 35.0);
        assert_eq!(summary.max_consecutive_wins, Some(6));
        assert_eq!(summary.max_consecutive_losses, Some(3));
    }

    #[test]
    fn unmatched_closes_are_dropped_by_default() {
        let root = setup_reports();
        let store = MockReportStore::new();
        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();

        let id = store.report_id(&us30_key()).unwrap().unwrap();
        let trades = store.trades_for(id).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].deal_number, 3);
        assert_eq!(trades[0].in_price, Some(38_000.0));
        assert_eq!(trades[0].out_price, Some(38_050.0));
        assert_relative_eq!(trades[0].commission, -1.0);
        assert_relative_eq!(trades[0].profit, 50.0);
    }

    #[test]
    fn keep_unmatched_persists_orphan_closes() {
        let root = setup_reports();
        let store = MockReportStore::new();
        let settings = IngestSettings {
            keep_unmatched: true,
            ..IngestSettings::default()
        };
        run_ingest_pipeline(&store, root.path(), &settings).unwrap();

        let id = store.report_id(&us30_key()).unwrap().unwrap();
        let trades = store.trades_for(id).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1].in_price, None);
        assert_relative_eq!(trades[1].commission, -0.5);
    }

    #[test]
    fn balance_is_decoded_filtered_and_sorted() {
        let root = setup_reports();
        let store = MockReportStore::new();
        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();

        let id = store.report_id(&us30_key()).unwrap().unwrap();
        let samples = store.balance_for(id).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].date_time.to_string(), "2024-01-02 00:00:00");
        assert_relative_eq!(samples[0].balance, 10_000.0);
        assert_relative_eq!(samples[0].equity, 0.0);
        assert_relative_eq!(samples[1].balance, 10_049.0);

        let xau_id = store.report_id(&xau_key()).unwrap().unwrap();
        assert!(store.balance_for(xau_id).unwrap().is_empty());
    }

    #[test]
    fn reingest_overwrites_instead_of_duplicating() {
        let root = setup_reports();
        let store = MockReportStore::new();
        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();
        let first_id = store.report_id(&xau_key()).unwrap().unwrap();

        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();
        assert_eq!(store.report_count(), 2);
        assert_eq!(store.report_id(&xau_key()).unwrap(), Some(first_id));
        assert_eq!(store.trades_for(first_id).unwrap().len(), 2);
    }

    #[test]
    fn configured_default_agent_is_used() {
        let root = setup_reports();
        let store = MockReportStore::new();
        let settings = IngestSettings {
            default_agent: "Night Owl EA".into(),
            ..IngestSettings::default()
        };
        let outcome = run_ingest_pipeline(&store, root.path(), &settings).unwrap();
        assert_eq!(outcome.ingested[1].agent, "Night Owl EA");
        assert_eq!(outcome.ingested[0].agent, "Cyberspace EA");
    }

    #[test]
    fn store_failures_skip_directories_without_aborting() {
        let root = setup_reports();
        let store = MockReportStore::failing();
        let outcome =
            run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();
        assert!(outcome.ingested.is_empty());
        assert_eq!(outcome.skipped.len(), 4);
    }

    #[test]
    fn balance_failure_still_counts_as_ingested() {
        let root = setup_reports();
        let store = MockReportStore::failing_balance();
        let outcome =
            run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();

        assert_eq!(outcome.ingested, vec![us30_key(), xau_key()]);
        assert_eq!(outcome.skipped.len(), 2);
        let id = store.report_id(&us30_key()).unwrap().unwrap();
        assert_eq!(store.trades_for(id).unwrap().len(), 1);
        assert!(store.balance_for(id).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let store = MockReportStore::new();
        let result = run_ingest_pipeline(
            &store,
            std::path::Path::new("/nonexistent/mt5-reports"),
            &IngestSettings::default(),
        );
        assert!(matches!(result, Err(TradeStatsError::Io(_))));
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_pipeline {
    use super::*;
    use tradestats::adapters::sqlite_adapter::SqliteAdapter;
    use tradestats::domain::rollup::{
        drawdown_rollup, monthly_pnl, win_rate_rollup, ReportFilter,
    };

    fn ingested_store() -> (TempDir, SqliteAdapter) {
        let root = setup_reports();
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        run_ingest_pipeline(&store, root.path(), &IngestSettings::default()).unwrap();
        (root, store)
    }

    #[test]
    fn reports_round_trip_through_sqlite() {
        let (_root, store) = ingested_store();
        let reports = store.list_reports().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].key, us30_key());
        assert_eq!(reports[1].key, xau_key());
        assert_eq!(reports[1].summary.instrument, Some(Instrument::Xau));
        assert_eq!(reports[1].summary.total_trades, Some(40));
    }

    #[test]
    fn trades_and_balance_round_trip_through_sqlite() {
        let (_root, store) = ingested_store();
        let id = store.report_id(&us30_key()).unwrap().unwrap();

        let trades = store.trades_for(id).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].symbol, "US30.cash");
        assert_eq!(trades[0].direction, "out");
        assert_eq!(trades[0].time.to_string(), "2024-01-02 17:45:00");

        let samples = store.balance_for(id).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].date_time < samples[1].date_time);
    }

    #[test]
    fn sqlite_and_mock_agree() {
        let root = setup_reports();
        let sqlite = SqliteAdapter::in_memory().unwrap();
        sqlite.initialize_schema().unwrap();
        let mock = MockReportStore::new();
        run_ingest_pipeline(&sqlite, root.path(), &IngestSettings::default()).unwrap();
        run_ingest_pipeline(&mock, root.path(), &IngestSettings::default()).unwrap();

        for key in [us30_key(), xau_key()] {
            let sqlite_id = sqlite.report_id(&key).unwrap().unwrap();
            let mock_id = mock.report_id(&key).unwrap().unwrap();
            assert_eq!(
                sqlite.trades_for(sqlite_id).unwrap(),
                mock.trades_for(mock_id).unwrap()
            );
            assert_eq!(
                sqlite.balance_for(sqlite_id).unwrap(),
                mock.balance_for(mock_id).unwrap()
            );
        }
        let sqlite_summaries: Vec<_> =
            sqlite.list_reports().unwrap().into_iter().map(|r| r.summary).collect();
        let mock_summaries: Vec<_> =
            mock.list_reports().unwrap().into_iter().map(|r| r.summary).collect();
        assert_eq!(sqlite_summaries, mock_summaries);
    }

    #[test]
    fn rollups_over_stored_reports() {
        let (_root, store) = ingested_store();
        let reports = store.list_reports().unwrap();

        let drawdowns = drawdown_rollup(&reports, &ReportFilter::default());
        assert_eq!(drawdowns.len(), 2);
        assert_relative_eq!(drawdowns[0].max_balance_drawdown.unwrap(), 300.0);

        let filter = ReportFilter {
            instrument: Some(Instrument::Xau),
            ..ReportFilter::default()
        };
        let win_rates = win_rate_rollup(&reports, &filter);
        assert_eq!(win_rates.len(), 1);
        assert_eq!(win_rates[0].profitable_trades, 26);
        assert_eq!(win_rates[0].total_trades, 40);
        assert_relative_eq!(win_rates[0].overall_win_rate.unwrap(), 65.0);
    }

    #[test]
    fn monthly_pnl_of_stored_trades() {
        let (_root, store) = ingested_store();
        let id = store.report_id(&xau_key()).unwrap().unwrap();
        let months = monthly_pnl(&store.trades_for(id).unwrap());

        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month.to_string(), "2024-03-01");
        assert_relative_eq!(months[0].pnl, 25.0);
        assert_eq!(months[1].trades, 1);
        assert_relative_eq!(months[1].pnl, -10.0);
    }
}
