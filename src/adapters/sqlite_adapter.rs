//! SQLite report store.

use crate::domain::balance::BalanceSample;
use crate::domain::error::TradeStatsError;
use crate::domain::labels::{Instrument, ReportKey, Schedule};
use crate::domain::ledger::CompletedTrade;
use crate::domain::rollup::StoredReport;
use crate::domain::statement::ReportSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_store::ReportStore;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Row};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        instrument TEXT NOT NULL,
        schedule TEXT NOT NULL,
        agent TEXT NOT NULL,
        net_profit REAL,
        balance_drawdown_absolute REAL,
        equity_drawdown_absolute REAL,
        balance_drawdown_maximal REAL,
        equity_drawdown_maximal REAL,
        balance_drawdown_relative REAL,
        equity_drawdown_relative REAL,
        total_trades INTEGER,
        profitable_trades INTEGER,
        win_rate REAL,
        loss_rate REAL,
        max_consecutive_wins INTEGER,
        max_consecutive_losses INTEGER,
        avg_consecutive_wins REAL,
        avg_consecutive_losses REAL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (instrument, schedule, agent)
    );
    CREATE TABLE IF NOT EXISTS balance_equity (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
        instrument TEXT NOT NULL,
        schedule TEXT NOT NULL,
        date_time TEXT NOT NULL,
        balance REAL NOT NULL,
        equity REAL NOT NULL,
        deposit_load REAL NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS deals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        report_id INTEGER NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
        instrument TEXT NOT NULL,
        schedule TEXT NOT NULL,
        deal_number INTEGER NOT NULL,
        time TEXT NOT NULL,
        symbol TEXT,
        type TEXT,
        direction TEXT,
        volume REAL,
        in_price REAL,
        out_price REAL,
        profit REAL,
        commission REAL DEFAULT 0,
        swap REAL DEFAULT 0,
        balance REAL,
        comment TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_reports_key ON reports(instrument, schedule, agent);
    CREATE INDEX IF NOT EXISTS idx_balance_equity_report_id ON balance_equity(report_id);
    CREATE INDEX IF NOT EXISTS idx_balance_equity_date_time ON balance_equity(date_time);
    CREATE INDEX IF NOT EXISTS idx_deals_report_id ON deals(report_id);
    CREATE INDEX IF NOT EXISTS idx_deals_time ON deals(time);";

const REPORT_COLUMNS: &str = "id, instrument, schedule, agent, net_profit, \
    balance_drawdown_absolute, equity_drawdown_absolute, balance_drawdown_maximal, \
    equity_drawdown_maximal, balance_drawdown_relative, equity_drawdown_relative, \
    total_trades, profitable_trades, win_rate, loss_rate, max_consecutive_wins, \
    max_consecutive_losses, avg_consecutive_wins, avg_consecutive_losses";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> TradeStatsError {
    TradeStatsError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TradeStatsError {
    TradeStatsError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, reason.into())
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_err(idx, format!("bad timestamp '{text}': {e}")))
}

fn stored_report_from_row(row: &Row<'_>) -> rusqlite::Result<StoredReport> {
    let instrument: Instrument = row
        .get::<_, String>(1)?
        .parse()
        .map_err(|e| conversion_err(1, e))?;
    let schedule: Schedule = row
        .get::<_, String>(2)?
        .parse()
        .map_err(|e| conversion_err(2, e))?;

    Ok(StoredReport {
        id: row.get(0)?,
        key: ReportKey {
            instrument,
            schedule,
            agent: row.get(3)?,
        },
        summary: ReportSummary {
            instrument: Some(instrument),
            net_profit: row.get(4)?,
            balance_drawdown_absolute: row.get(5)?,
            equity_drawdown_absolute: row.get(6)?,
            balance_drawdown_maximal: row.get(7)?,
            equity_drawdown_maximal: row.get(8)?,
            balance_drawdown_relative: row.get(9)?,
            equity_drawdown_relative: row.get(10)?,
            total_trades: row.get(11)?,
            profitable_trades: row.get(12)?,
            win_rate: row.get(13)?,
            loss_rate: row.get(14)?,
            max_consecutive_wins: row.get(15)?,
            max_consecutive_losses: row.get(16)?,
            avg_consecutive_wins: row.get(17)?,
            avg_consecutive_losses: row.get(18)?,
        },
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<CompletedTrade> {
    Ok(CompletedTrade {
        deal_number: row.get(0)?,
        time: timestamp_at(row, 1)?,
        symbol: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        deal_type: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        direction: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        volume: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        in_price: row.get(6)?,
        out_price: row.get(7)?,
        profit: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
        commission: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        swap: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
        balance: row.get::<_, Option<f64>>(11)?.unwrap_or(0.0),
        comment: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeStatsError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TradeStatsError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TradeStatsError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradeStatsError> {
        self.pool.get().map_err(pool_err)
    }
}

impl ReportStore for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), TradeStatsError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn upsert_report(
        &self,
        key: &ReportKey,
        summary: &ReportSummary,
    ) -> Result<i64, TradeStatsError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO reports (
                instrument, schedule, agent, net_profit,
                balance_drawdown_absolute, equity_drawdown_absolute,
                balance_drawdown_maximal, equity_drawdown_maximal,
                balance_drawdown_relative, equity_drawdown_relative,
                total_trades, profitable_trades, win_rate, loss_rate,
                max_consecutive_wins, max_consecutive_losses,
                avg_consecutive_wins, avg_consecutive_losses
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT (instrument, schedule, agent) DO UPDATE SET
                net_profit = excluded.net_profit,
                balance_drawdown_absolute = excluded.balance_drawdown_absolute,
                equity_drawdown_absolute = excluded.equity_drawdown_absolute,
                balance_drawdown_maximal = excluded.balance_drawdown_maximal,
                equity_drawdown_maximal = excluded.equity_drawdown_maximal,
                balance_drawdown_relative = excluded.balance_drawdown_relative,
                equity_drawdown_relative = excluded.equity_drawdown_relative,
                total_trades = excluded.total_trades,
                profitable_trades = excluded.profitable_trades,
                win_rate = excluded.win_rate,
                loss_rate = excluded.loss_rate,
                max_consecutive_wins = excluded.max_consecutive_wins,
                max_consecutive_losses = excluded.max_consecutive_losses,
                avg_consecutive_wins = excluded.avg_consecutive_wins,
                avg_consecutive_losses = excluded.avg_consecutive_losses",
            params![
                key.instrument.code(),
                key.schedule.label(),
                key.agent,
                summary.net_profit,
                summary.balance_drawdown_absolute,
                summary.equity_drawdown_absolute,
                summary.balance_drawdown_maximal,
                summary.equity_drawdown_maximal,
                summary.balance_drawdown_relative,
                summary.equity_drawdown_relative,
                summary.total_trades,
                summary.profitable_trades,
                summary.win_rate,
                summary.loss_rate,
                summary.max_consecutive_wins,
                summary.max_consecutive_losses,
                summary.avg_consecutive_wins,
                summary.avg_consecutive_losses,
            ],
        )
        .map_err(query_err)?;

        conn.query_row(
            "SELECT id FROM reports WHERE instrument = ?1 AND schedule = ?2 AND agent = ?3",
            params![key.instrument.code(), key.schedule.label(), key.agent],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    fn replace_trades(
        &self,
        report_id: i64,
        key: &ReportKey,
        trades: &[CompletedTrade],
    ) -> Result<(), TradeStatsError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute("DELETE FROM deals WHERE report_id = ?1", params![report_id])
            .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO deals (
                        report_id, instrument, schedule, deal_number, time, symbol, type,
                        direction, volume, in_price, out_price, profit, commission, swap,
                        balance, comment
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                )
                .map_err(query_err)?;
            for trade in trades {
                stmt.execute(params![
                    report_id,
                    key.instrument.code(),
                    key.schedule.label(),
                    trade.deal_number,
                    trade.time.format(TIMESTAMP_FORMAT).to_string(),
                    trade.symbol,
                    trade.deal_type,
                    trade.direction,
                    trade.volume,
                    trade.in_price,
                    trade.out_price,
                    trade.profit,
                    trade.commission,
                    trade.swap,
                    trade.balance,
                    trade.comment,
                ])
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)
    }

    fn replace_balance(
        &self,
        report_id: i64,
        key: &ReportKey,
        samples: &[BalanceSample],
    ) -> Result<(), TradeStatsError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "DELETE FROM balance_equity WHERE report_id = ?1",
            params![report_id],
        )
        .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO balance_equity (
                        report_id, instrument, schedule, date_time, balance, equity, deposit_load
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for sample in samples {
                stmt.execute(params![
                    report_id,
                    key.instrument.code(),
                    key.schedule.label(),
                    sample.date_time.format(TIMESTAMP_FORMAT).to_string(),
                    sample.balance,
                    sample.equity,
                    sample.deposit_load,
                ])
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)
    }

    fn report_id(&self, key: &ReportKey) -> Result<Option<i64>, TradeStatsError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id FROM reports WHERE instrument = ?1 AND schedule = ?2 AND agent = ?3",
            )
            .map_err(query_err)?;
        let mut rows = stmt
            .query_map(
                params![key.instrument.code(), key.schedule.label(), key.agent],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        let id = rows.next().transpose().map_err(query_err)?;
        Ok(id)
    }

    fn list_reports(&self) -> Result<Vec<StoredReport>, TradeStatsError> {
        let conn = self.conn()?;
        let query =
            format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY instrument, schedule, agent");
        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map([], stored_report_from_row)
            .map_err(query_err)?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(row.map_err(query_err)?);
        }
        Ok(reports)
    }

    fn trades_for(&self, report_id: i64) -> Result<Vec<CompletedTrade>, TradeStatsError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT deal_number, time, symbol, type, direction, volume, in_price, out_price,
                        profit, commission, swap, balance, comment
                 FROM deals WHERE report_id = ?1 ORDER BY time ASC, id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![report_id], trade_from_row)
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_err)?);
        }
        Ok(trades)
    }

    fn balance_for(&self, report_id: i64) -> Result<Vec<BalanceSample>, TradeStatsError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date_time, balance, equity, deposit_load
                 FROM balance_equity WHERE report_id = ?1 ORDER BY date_time ASC, id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![report_id], |row| {
                Ok(BalanceSample {
                    date_time: timestamp_at(row, 0)?,
                    balance: row.get(1)?,
                    equity: row.get(2)?,
                    deposit_load: row.get(3)?,
                })
            })
            .map_err(query_err)?;

        let mut samples = Vec::new();
        for row in rows {
            samples.push(row.map_err(query_err)?);
        }
        Ok(samples)
    }
}
