//! PostgreSQL report store.

use crate::domain::balance::BalanceSample;
use crate::domain::error::TradeStatsError;
use crate::domain::labels::{Instrument, ReportKey, Schedule};
use crate::domain::ledger::CompletedTrade;
use crate::domain::rollup::StoredReport;
use crate::domain::statement::ReportSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_store::ReportStore;
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use std::cell::RefCell;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        id SERIAL PRIMARY KEY,
        instrument VARCHAR(10) NOT NULL,
        schedule VARCHAR(50) NOT NULL,
        agent VARCHAR(100) NOT NULL,
        net_profit DOUBLE PRECISION,
        balance_drawdown_absolute DOUBLE PRECISION,
        equity_drawdown_absolute DOUBLE PRECISION,
        balance_drawdown_maximal DOUBLE PRECISION,
        equity_drawdown_maximal DOUBLE PRECISION,
        balance_drawdown_relative DOUBLE PRECISION,
        equity_drawdown_relative DOUBLE PRECISION,
        total_trades BIGINT,
        profitable_trades BIGINT,
        win_rate DOUBLE PRECISION,
        loss_rate DOUBLE PRECISION,
        max_consecutive_wins BIGINT,
        max_consecutive_losses BIGINT,
        avg_consecutive_wins DOUBLE PRECISION,
        avg_consecutive_losses DOUBLE PRECISION,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (instrument, schedule, agent)
    );
    CREATE TABLE IF NOT EXISTS balance_equity (
        id SERIAL PRIMARY KEY,
        report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
        instrument VARCHAR(10) NOT NULL,
        schedule VARCHAR(50) NOT NULL,
        date_time TIMESTAMP NOT NULL,
        balance DOUBLE PRECISION NOT NULL,
        equity DOUBLE PRECISION NOT NULL,
        deposit_load DOUBLE PRECISION NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS deals (
        id SERIAL PRIMARY KEY,
        report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
        instrument VARCHAR(10) NOT NULL,
        schedule VARCHAR(50) NOT NULL,
        deal_number BIGINT NOT NULL,
        time TIMESTAMP NOT NULL,
        symbol VARCHAR(20),
        type VARCHAR(20),
        direction VARCHAR(10),
        volume DOUBLE PRECISION,
        in_price DOUBLE PRECISION,
        out_price DOUBLE PRECISION,
        profit DOUBLE PRECISION,
        commission DOUBLE PRECISION DEFAULT 0,
        swap DOUBLE PRECISION DEFAULT 0,
        balance DOUBLE PRECISION,
        comment TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_reports_key ON reports(instrument, schedule, agent);
    CREATE INDEX IF NOT EXISTS idx_balance_equity_report_id ON balance_equity(report_id);
    CREATE INDEX IF NOT EXISTS idx_balance_equity_date_time ON balance_equity(date_time);
    CREATE INDEX IF NOT EXISTS idx_deals_report_id ON deals(report_id);
    CREATE INDEX IF NOT EXISTS idx_deals_time ON deals(time);";

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn query_err(e: postgres::Error) -> TradeStatsError {
    TradeStatsError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn stored_report_from_row(row: &Row) -> Result<StoredReport, TradeStatsError> {
    let instrument: Instrument = row
        .get::<_, String>(1)
        .parse()
        .map_err(|reason| TradeStatsError::DatabaseQuery { reason })?;
    let schedule: Schedule = row
        .get::<_, String>(2)
        .parse()
        .map_err(|reason| TradeStatsError::DatabaseQuery { reason })?;
    let id: i32 = row.get(0);

    Ok(StoredReport {
        id: i64::from(id),
        key: ReportKey {
            instrument,
            schedule,
            agent: row.get(3),
        },
        summary: ReportSummary {
            instrument: Some(instrument),
            net_profit: row.get(4),
            balance_drawdown_absolute: row.get(5),
            equity_drawdown_absolute: row.get(6),
            balance_drawdown_maximal: row.get(7),
            equity_drawdown_maximal: row.get(8),
            balance_drawdown_relative: row.get(9),
            equity_drawdown_relative: row.get(10),
            total_trades: row.get(11),
            profitable_trades: row.get(12),
            win_rate: row.get(13),
            loss_rate: row.get(14),
            max_consecutive_wins: row.get(15),
            max_consecutive_losses: row.get(16),
            avg_consecutive_wins: row.get(17),
            avg_consecutive_losses: row.get(18),
        },
    })
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeStatsError> {
        // [postgres] connection_string first, then [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| TradeStatsError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| TradeStatsError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    fn report_ref(report_id: i64) -> Result<i32, TradeStatsError> {
        i32::try_from(report_id).map_err(|_| TradeStatsError::DatabaseQuery {
            reason: format!("report id {report_id} out of range"),
        })
    }
}

impl ReportStore for PostgresAdapter {
    fn initialize_schema(&self) -> Result<(), TradeStatsError> {
        self.client
            .borrow_mut()
            .batch_execute(SCHEMA)
            .map_err(query_err)
    }

    fn upsert_report(
        &self,
        key: &ReportKey,
        summary: &ReportSummary,
    ) -> Result<i64, TradeStatsError> {
        let query = "INSERT INTO reports (
                instrument, schedule, agent, net_profit,
                balance_drawdown_absolute, equity_drawdown_absolute,
                balance_drawdown_maximal, equity_drawdown_maximal,
                balance_drawdown_relative, equity_drawdown_relative,
                total_trades, profitable_trades, win_rate, loss_rate,
                max_consecutive_wins, max_consecutive_losses,
                avg_consecutive_wins, avg_consecutive_losses
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (instrument, schedule, agent) DO UPDATE SET
                net_profit = EXCLUDED.net_profit,
                balance_drawdown_absolute = EXCLUDED.balance_drawdown_absolute,
                equity_drawdown_absolute = EXCLUDED.equity_drawdown_absolute,
                balance_drawdown_maximal = EXCLUDED.balance_drawdown_maximal,
                equity_drawdown_maximal = EXCLUDED.equity_drawdown_maximal,
                balance_drawdown_relative = EXCLUDED.balance_drawdown_relative,
                equity_drawdown_relative = EXCLUDED.equity_drawdown_relative,
                total_trades = EXCLUDED.total_trades,
                profitable_trades = EXCLUDED.profitable_trades,
                win_rate = EXCLUDED.win_rate,
                loss_rate = EXCLUDED.loss_rate,
                max_consecutive_wins = EXCLUDED.max_consecutive_wins,
                max_consecutive_losses = EXCLUDED.max_consecutive_losses,
                avg_consecutive_wins = EXCLUDED.avg_consecutive_wins,
                avg_consecutive_losses = EXCLUDED.avg_consecutive_losses,
                created_at = CURRENT_TIMESTAMP
            RETURNING id";

        let instrument = key.instrument.code();
        let schedule = key.schedule.label();
        let params: &[&(dyn ToSql + Sync)] = &[
            &instrument,
            &schedule,
            &key.agent,
            &summary.net_profit,
            &summary.balance_drawdown_absolute,
            &summary.equity_drawdown_absolute,
            &summary.balance_drawdown_maximal,
            &summary.equity_drawdown_maximal,
            &summary.balance_drawdown_relative,
            &summary.equity_drawdown_relative,
            &summary.total_trades,
            &summary.profitable_trades,
            &summary.win_rate,
            &summary.loss_rate,
            &summary.max_consecutive_wins,
            &summary.max_consecutive_losses,
            &summary.avg_consecutive_wins,
            &summary.avg_consecutive_losses,
        ];

        let row = self
            .client
            .borrow_mut()
            .query_one(query, params)
            .map_err(query_err)?;
        let id: i32 = row.get(0);
        Ok(i64::from(id))
    }

    fn replace_trades(
        &self,
        report_id: i64,
        key: &ReportKey,
        trades: &[CompletedTrade],
    ) -> Result<(), TradeStatsError> {
        let report_ref = Self::report_ref(report_id)?;
        let instrument = key.instrument.code();
        let schedule = key.schedule.label();

        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM deals WHERE report_id = $1", &[&report_ref])
            .map_err(query_err)?;

        let stmt = tx
            .prepare(
                "INSERT INTO deals (
                    report_id, instrument, schedule, deal_number, time, symbol, type,
                    direction, volume, in_price, out_price, profit, commission, swap,
                    balance, comment
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            )
            .map_err(query_err)?;
        for trade in trades {
            tx.execute(
                &stmt,
                &[
                    &report_ref,
                    &instrument,
                    &schedule,
                    &trade.deal_number,
                    &trade.time,
                    &trade.symbol,
                    &trade.deal_type,
                    &trade.direction,
                    &trade.volume,
                    &trade.in_price,
                    &trade.out_price,
                    &trade.profit,
                    &trade.commission,
                    &trade.swap,
                    &trade.balance,
                    &trade.comment,
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn replace_balance(
        &self,
        report_id: i64,
        key: &ReportKey,
        samples: &[BalanceSample],
    ) -> Result<(), TradeStatsError> {
        let report_ref = Self::report_ref(report_id)?;
        let instrument = key.instrument.code();
        let schedule = key.schedule.label();

        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(query_err)?;
        tx.execute(
            "DELETE FROM balance_equity WHERE report_id = $1",
            &[&report_ref],
        )
        .map_err(query_err)?;

        let stmt = tx
            .prepare(
                "INSERT INTO balance_equity (
                    report_id, instrument, schedule, date_time, balance, equity, deposit_load
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .map_err(query_err)?;
        for sample in samples {
            tx.execute(
                &stmt,
                &[
                    &report_ref,
                    &instrument,
                    &schedule,
                    &sample.date_time,
                    &sample.balance,
                    &sample.equity,
                    &sample.deposit_load,
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn report_id(&self, key: &ReportKey) -> Result<Option<i64>, TradeStatsError> {
        let instrument = key.instrument.code();
        let schedule = key.schedule.label();
        let row = self
            .client
            .borrow_mut()
            .query_opt(
                "SELECT id FROM reports WHERE instrument = $1 AND schedule = $2 AND agent = $3",
                &[&instrument, &schedule, &key.agent],
            )
            .map_err(query_err)?;

        Ok(row.map(|r| i64::from(r.get::<_, i32>(0))))
    }

    fn list_reports(&self) -> Result<Vec<StoredReport>, TradeStatsError> {
        let query = "SELECT id, instrument, schedule, agent, net_profit, \
                            balance_drawdown_absolute, equity_drawdown_absolute, \
                            balance_drawdown_maximal, equity_drawdown_maximal, \
                            balance_drawdown_relative, equity_drawdown_relative, \
                            total_trades, profitable_trades, win_rate, loss_rate, \
                            max_consecutive_wins, max_consecutive_losses, \
                            avg_consecutive_wins, avg_consecutive_losses \
                     FROM reports ORDER BY instrument, schedule, agent";

        let rows = self
            .client
            .borrow_mut()
            .query(query, &[])
            .map_err(query_err)?;

        rows.iter().map(stored_report_from_row).collect()
    }

    fn trades_for(&self, report_id: i64) -> Result<Vec<CompletedTrade>, TradeStatsError> {
        let report_ref = Self::report_ref(report_id)?;
        let query = "SELECT deal_number, time, symbol, type, direction, volume, in_price, \
                            out_price, profit, commission, swap, balance, comment \
                     FROM deals WHERE report_id = $1 ORDER BY time ASC, id ASC";

        let rows = self
            .client
            .borrow_mut()
            .query(query, &[&report_ref])
            .map_err(query_err)?;

        let trades = rows
            .into_iter()
            .map(|row| CompletedTrade {
                deal_number: row.get(0),
                time: row.get(1),
                symbol: row.get::<_, Option<String>>(2).unwrap_or_default(),
                deal_type: row.get::<_, Option<String>>(3).unwrap_or_default(),
                direction: row.get::<_, Option<String>>(4).unwrap_or_default(),
                volume: row.get::<_, Option<f64>>(5).unwrap_or(0.0),
                in_price: row.get(6),
                out_price: row.get(7),
                profit: row.get::<_, Option<f64>>(8).unwrap_or(0.0),
                commission: row.get::<_, Option<f64>>(9).unwrap_or(0.0),
                swap: row.get::<_, Option<f64>>(10).unwrap_or(0.0),
                balance: row.get::<_, Option<f64>>(11).unwrap_or(0.0),
                comment: row.get::<_, Option<String>>(12).unwrap_or_default(),
            })
            .collect();

        Ok(trades)
    }

    fn balance_for(&self, report_id: i64) -> Result<Vec<BalanceSample>, TradeStatsError> {
        let report_ref = Self::report_ref(report_id)?;
        let query = "SELECT date_time, balance, equity, deposit_load \
                     FROM balance_equity WHERE report_id = $1 ORDER BY date_time ASC, id ASC";

        let rows = self
            .client
            .borrow_mut()
            .query(query, &[&report_ref])
            .map_err(query_err)?;

        let samples = rows
            .into_iter()
            .map(|row| BalanceSample {
                date_time: row.get(0),
                balance: row.get(1),
                equity: row.get(2),
                deposit_load: row.get(3),
            })
            .collect();

        Ok(samples)
    }
}
