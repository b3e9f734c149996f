//! Table definitions for the persisted entities in spec §6.
//!
//! Table names and shapes mirror the Postgres tables named in the
//! specification one-for-one; the engine itself is SQLite (see `db::mod`).

use rusqlite::{Connection, Result};

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS quotes (
            symbol TEXT PRIMARY KEY,
            price REAL NOT NULL,
            bid REAL NOT NULL,
            ask REAL NOT NULL,
            bid_size REAL NOT NULL,
            ask_size REAL NOT NULL,
            volume REAL NOT NULL,
            timestamp TEXT NOT NULL,
            exchange TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS candles (
            symbol TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume REAL NOT NULL,
            vwap REAL,
            PRIMARY KEY (symbol, timestamp)
        );

        CREATE TABLE IF NOT EXISTS strategy_signals (
            id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            strategy_id TEXT NOT NULL,
            signal_type TEXT NOT NULL,
            confidence REAL NOT NULL,
            entry_price REAL NOT NULL,
            stop_loss REAL NOT NULL,
            take_profit TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            status TEXT NOT NULL,
            orchestration_run_id TEXT,
            indicators TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_strategy_signals_lookup
            ON strategy_signals (symbol, strategy_id, generated_at DESC, id);

        CREATE TABLE IF NOT EXISTS orchestration_runs (
            id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            trigger_type TEXT NOT NULL,
            trigger_id TEXT,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            agent_suggestion TEXT,
            confidence REAL,
            reasoning TEXT,
            memories_recalled TEXT,
            tool_runs TEXT,
            agent_response TEXT,
            error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_orchestration_runs_trigger
            ON orchestration_runs (trigger_id);

        CREATE TABLE IF NOT EXISTS trade_approvals (
            signal_id TEXT PRIMARY KEY,
            orchestration_run_id TEXT,
            approved INTEGER NOT NULL,
            approved_by TEXT NOT NULL,
            approved_at TEXT NOT NULL,
            modification_notes TEXT,
            order_id TEXT
        );

        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            direction TEXT NOT NULL,
            entry REAL NOT NULL,
            stop REAL NOT NULL,
            targets TEXT NOT NULL,
            event_id TEXT,
            strategy_id TEXT NOT NULL,
            notes TEXT,
            risk_amount REAL NOT NULL,
            risk_percent REAL NOT NULL,
            risk_position_value REAL NOT NULL,
            risk_quantity INTEGER NOT NULL,
            risk_order_id TEXT NOT NULL,
            risk_status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_trades_created_at ON trades (created_at DESC, id);

        CREATE TABLE IF NOT EXISTS strategy_artifacts (
            id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL UNIQUE,
            schema_version INTEGER NOT NULL,
            strategy_name TEXT NOT NULL,
            strategy_version TEXT NOT NULL,
            document TEXT NOT NULL,
            hash TEXT NOT NULL,
            signature TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_strategy_artifacts_strategy
            ON strategy_artifacts (strategy_name, strategy_version);

        CREATE TABLE IF NOT EXISTS artifact_approvals (
            id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL UNIQUE,
            state TEXT NOT NULL,
            previous_state TEXT,
            validation_passed INTEGER NOT NULL,
            validation_run_id TEXT,
            reviewer TEXT,
            reviewed_at TEXT,
            review_notes TEXT,
            approved_by TEXT,
            approved_at TEXT,
            state_changed_by TEXT NOT NULL,
            state_changed_at TEXT NOT NULL,
            state_change_reason TEXT
        );

        CREATE TABLE IF NOT EXISTS artifact_promotions (
            id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL,
            from_state TEXT,
            to_state TEXT NOT NULL,
            promoted_by TEXT NOT NULL,
            promoted_at TEXT NOT NULL,
            reason TEXT,
            validation_data TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_artifact_promotions_artifact
            ON artifact_promotions (artifact_id, promoted_at);

        CREATE TABLE IF NOT EXISTS validation_reports (
            id TEXT PRIMARY KEY,
            artifact_id TEXT NOT NULL,
            backtest_run_id TEXT,
            metrics TEXT,
            determinism_seed INTEGER,
            report_uri TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_events (
            id TEXT PRIMARY KEY,
            correlation_id TEXT NOT NULL,
            action TEXT NOT NULL,
            outcome TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            payload TEXT NOT NULL,
            error TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_audit_events_correlation
            ON audit_events (correlation_id, timestamp);
        ",
    )
}
