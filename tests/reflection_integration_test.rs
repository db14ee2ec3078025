// ==========================================
// 复盘集成测试
// ==========================================
// 场景: 回填实际售票 → 计算误差 → 持久化影片校正系数
// ==========================================

mod test_helpers;

use cinema_ops::domain::forecast::ShowForecast;
use cinema_ops::domain::types::SlotBucket;
use cinema_ops::repository::ForecastLogRepository;
use rusqlite::params;
use test_helpers::*;

fn insert_log(
    conn: &std::sync::Arc<std::sync::Mutex<rusqlite::Connection>>,
    show_id: &str,
    movie_id: &str,
    show_date: &str,
    forecast: f64,
) {
    let conn = conn.lock().unwrap();
    conn.execute(
        "INSERT INTO forecast_log (run_id, show_id, movie_id, show_date, forecast_demand)
         VALUES ('R-PAST', ?1, ?2, ?3, ?4)",
        params![show_id, movie_id, show_date, forecast],
    )
    .unwrap();
}

#[test]
fn test_reflect_backfills_and_persists_corrections() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);

    let yesterday = fixed_now().date().pred_opt().unwrap();
    insert_show(&conn, "P1", "M1", "S1", yesterday, "20:00", "22:00");
    insert_show(&conn, "P2", "M2", "S2", yesterday, "15:00", "16:35");
    insert_show(&conn, "P3", "M2", "S1", yesterday, "12:30", "14:05");
    set_show_status(&conn, "P1", "completed");
    set_show_status(&conn, "P2", "completed");
    set_show_status(&conn, "P3", "cancelled");
    insert_booking(&conn, "P1", 30);
    insert_booking(&conn, "P2", 5);

    let day = date_str(yesterday);
    insert_log(&conn, "P1", "M1", &day, 20.0);
    insert_log(&conn, "P2", "M2", &day, 10.0);
    insert_log(&conn, "P3", "M2", &day, 8.0);
    insert_log(&conn, "GONE", "M1", &day, 8.0);
    // 未开映的预测不参与复盘
    insert_log(&conn, "FUTURE", "M1", &date_str(tomorrow()), 12.0);

    let orchestrator = build_orchestrator(&conn);
    let section = orchestrator.reflect().unwrap();

    assert_eq!(section.resolved_count, 2);
    assert!((section.mean_error - 0.5).abs() < 1e-9);
    assert!(section.quality.is_some());
    assert!(section.message.contains('2'));

    // 已取消/不存在的场次日志被丢弃
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM forecast_log"), 3);
    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM forecast_log WHERE actual_bookings IS NOT NULL"
        ),
        2
    );

    // 校正系数截断到 [0.7, 1.3]
    let repo = ForecastLogRepository::new(conn.clone());
    let m1 = repo.find_correction("M1").unwrap().unwrap();
    let m2 = repo.find_correction("M2").unwrap().unwrap();
    assert!((m1.correction_factor - 1.3).abs() < 1e-9);
    assert!((m2.correction_factor - 0.7).abs() < 1e-9);
    assert_eq!(m1.sample_count, 1);

    // 再次复盘: 没有新的待回填日志，窗口内结果不变
    let again = orchestrator.reflect().unwrap();
    assert_eq!(again.resolved_count, 2);
    assert_eq!(again.corrections.len(), 2);
}

#[test]
fn test_reflect_without_samples() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    let orchestrator = build_orchestrator(&conn);

    let section = orchestrator.reflect().unwrap();
    assert_eq!(section.resolved_count, 0);
    assert!(section.quality.is_none());
    assert!(section.quality_score.is_none());
    assert!(section.corrections.is_empty());
    assert!(!section.message.is_empty());
}

fn show_forecast(show_id: &str, demand: f64) -> ShowForecast {
    ShowForecast {
        show_id: show_id.to_string(),
        movie_id: "M1".to_string(),
        screen_id: "S1".to_string(),
        date: tomorrow(),
        slot: SlotBucket::Prime,
        forecast_demand: demand,
        capacity: 120,
        fill_ratio: demand / 120.0,
        confidence: 0.7,
    }
}

#[test]
fn test_later_run_supersedes_pending_forecast() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);

    // 已回填的历史日志不受影响
    let yesterday = fixed_now().date().pred_opt().unwrap();
    insert_show(&conn, "P1", "M1", "S1", yesterday, "20:00", "22:00");
    insert_log(&conn, "P1", "M1", &date_str(yesterday), 20.0);
    conn.lock()
        .unwrap()
        .execute("UPDATE forecast_log SET actual_bookings = 18 WHERE show_id = 'P1'", [])
        .unwrap();

    let repo = ForecastLogRepository::new(conn.clone());
    repo.insert_show_forecasts("R1", &[show_forecast("T1", 30.0), show_forecast("T2", 10.0)])
        .unwrap();
    repo.insert_show_forecasts("R2", &[show_forecast("T1", 45.0)])
        .unwrap();

    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM forecast_log WHERE show_id = 'T1'"),
        1
    );
    let latest = repo.list_by_run("R2").unwrap();
    assert_eq!(latest.len(), 1);
    assert!((latest[0].forecast_demand - 45.0).abs() < 1e-9);
    assert_eq!(repo.list_by_run("R1").unwrap().len(), 1);
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM forecast_log WHERE show_id = 'P1'"),
        1
    );
}
