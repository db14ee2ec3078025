// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、影片/影厅/场次/售票种子数据、编排器构造
// ==========================================
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use cinema_ops::config::{ConfigManager, PipelinePolicy};
use cinema_ops::db::{ensure_schema, open_sqlite_connection};
use cinema_ops::engine::{PipelineOrchestrator, PipelineRepositories};
use cinema_ops::signals::{ConfigSignalStore, NoopAdjustmentService};
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接
pub fn shared_connection(db_path: &str) -> Arc<Mutex<Connection>> {
    let conn = open_sqlite_connection(db_path).expect("打开测试数据库失败");
    Arc::new(Mutex::new(conn))
}

/// 固定的"当前时间": 2026-03-02 (周一) 09:00
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
}

pub fn tomorrow() -> NaiveDate {
    fixed_now().date().succ_opt().unwrap()
}

pub fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// 影片 M1(120分钟)、M2(95分钟)，影厅 S1(120座)、S2(80座)，每厅两档座位
pub fn seed_catalog(conn: &Arc<Mutex<Connection>>) {
    let conn = conn.lock().unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO movie (movie_id, title, runtime_minutes) VALUES
            ('M1', '长夜将尽', 120),
            ('M2', '星港', 95);
        INSERT INTO screen (screen_id, name, seat_capacity) VALUES
            ('S1', '1号厅', 120),
            ('S2', '2号厅', 80);
        INSERT INTO seat_category (category_id, screen_id, name, base_price) VALUES
            ('S1-STD', 'S1', '普通座', 40.0),
            ('S1-VIP', 'S1', '情侣座', 60.0),
            ('S2-STD', 'S2', '普通座', 35.0),
            ('S2-VIP', 'S2', '情侣座', 55.0);
        "#,
    )
    .expect("写入影片/影厅失败");
}

pub fn insert_show(
    conn: &Arc<Mutex<Connection>>,
    show_id: &str,
    movie_id: &str,
    screen_id: &str,
    date: NaiveDate,
    time: &str,
    end_time: &str,
) {
    let conn = conn.lock().unwrap();
    conn.execute(
        "INSERT INTO show (show_id, movie_id, screen_id, show_date, show_time, end_time, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'upcoming')",
        params![show_id, movie_id, screen_id, date_str(date), time, end_time],
    )
    .expect("写入场次失败");
}

pub fn set_show_status(conn: &Arc<Mutex<Connection>>, show_id: &str, status: &str) {
    let conn = conn.lock().unwrap();
    conn.execute(
        "UPDATE show SET status = ?1 WHERE show_id = ?2",
        params![status, show_id],
    )
    .expect("更新场次状态失败");
}

pub fn insert_booking(conn: &Arc<Mutex<Connection>>, show_id: &str, seats: u32) {
    let conn = conn.lock().unwrap();
    conn.execute(
        "INSERT INTO booking (booking_id, show_id, seats) VALUES (?1, ?2, ?3)",
        params![format!("B-{}-{}", show_id, seats), show_id, seats],
    )
    .expect("写入售票失败");
}

pub fn set_config(conn: &Arc<Mutex<Connection>>, key: &str, value: &str) {
    ConfigManager::from_connection(conn.clone())
        .set_global_config_value(key, value)
        .expect("写入配置失败");
}

pub fn count(conn: &Arc<Mutex<Connection>>, sql: &str) -> i64 {
    let conn = conn.lock().unwrap();
    conn.query_row(sql, [], |row| row.get(0)).expect("计数查询失败")
}

/// 构造编排器（无外部修正服务，信号取自 config_kv，时间固定）
pub fn build_orchestrator(conn: &Arc<Mutex<Connection>>) -> PipelineOrchestrator {
    let config = Arc::new(ConfigManager::from_connection(conn.clone()));
    let policy: PipelinePolicy = config.load_policy().expect("加载参数失败");
    let signals = Arc::new(ConfigSignalStore::new(config));

    PipelineOrchestrator::new(
        PipelineRepositories::from_connection(conn.clone()),
        policy,
        Arc::new(NoopAdjustmentService),
        signals.clone(),
        signals,
    )
    .with_now(fixed_now())
}
