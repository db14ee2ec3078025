// ==========================================
// 影院经营决策系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发流水线写入时的偶发 busy 错误
// - 提供幂等建表（外部档案系统未建表时用于本地/测试库）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
///
/// 表清单:
/// - movie / screen / seat_category / show / booking / show_price: 外部档案与交易数据
/// - forecast_log / movie_correction: 复盘闭环
/// - pipeline_checkpoint: 审批挂起的流水线断点
/// - config_kv: 参数覆写与外部信号
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS movie (
            movie_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            runtime_minutes INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS screen (
            screen_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            seat_capacity INTEGER NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS seat_category (
            category_id TEXT PRIMARY KEY,
            screen_id TEXT NOT NULL REFERENCES screen(screen_id),
            name TEXT NOT NULL,
            base_price REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS show (
            show_id TEXT PRIMARY KEY,
            movie_id TEXT NOT NULL REFERENCES movie(movie_id),
            screen_id TEXT NOT NULL REFERENCES screen(screen_id),
            show_date TEXT NOT NULL,
            show_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'upcoming',
            UNIQUE (screen_id, show_date, show_time)
        );
        CREATE INDEX IF NOT EXISTS idx_show_date_status ON show(show_date, status);

        CREATE TABLE IF NOT EXISTS booking (
            booking_id TEXT PRIMARY KEY,
            show_id TEXT NOT NULL REFERENCES show(show_id),
            seats INTEGER NOT NULL DEFAULT 1,
            booked_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_booking_show ON booking(show_id);

        CREATE TABLE IF NOT EXISTS show_price (
            show_id TEXT NOT NULL REFERENCES show(show_id) ON DELETE CASCADE,
            category_id TEXT NOT NULL REFERENCES seat_category(category_id),
            price REAL NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (show_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS forecast_log (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            show_id TEXT NOT NULL,
            movie_id TEXT NOT NULL,
            show_date TEXT NOT NULL,
            forecast_demand REAL NOT NULL,
            actual_bookings INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_forecast_log_date ON forecast_log(show_date);

        CREATE TABLE IF NOT EXISTS movie_correction (
            movie_id TEXT PRIMARY KEY,
            correction_factor REAL NOT NULL,
            sample_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS pipeline_checkpoint (
            token TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            request_json TEXT NOT NULL,
            context_json TEXT NOT NULL,
            next_stage TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            resolved_at TEXT
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
