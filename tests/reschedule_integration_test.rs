// ==========================================
// 存量调度集成测试
// ==========================================
// 场景: 互换事务 / 取消只作用于零售票场次 / 开场时间集合不变
// ==========================================

mod test_helpers;

use chrono::NaiveTime;
use cinema_ops::domain::pipeline::{OperateRequest, RunOutcome};
use cinema_ops::domain::types::{Intent, RescheduleActionType, ShowStatus};
use cinema_ops::repository::error::RepositoryError;
use cinema_ops::repository::ShowRepository;
use std::collections::BTreeSet;
use test_helpers::*;

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_swap_show_times_in_one_transaction() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);
    let day = tomorrow();
    insert_show(&conn, "A", "M1", "S1", day, "12:30", "14:30");
    insert_show(&conn, "B", "M2", "S1", day, "20:00", "21:35");

    let repo = ShowRepository::new(conn.clone());
    repo.swap_show_times("A", "B", hm(22, 0), hm(14, 5)).unwrap();

    let a = repo.find_by_id("A").unwrap().unwrap();
    let b = repo.find_by_id("B").unwrap().unwrap();
    assert_eq!((a.show_time, a.end_time), (hm(20, 0), hm(22, 0)));
    assert_eq!((b.show_time, b.end_time), (hm(12, 30), hm(14, 5)));
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM show WHERE show_time LIKE '%swap%'"),
        0
    );
}

#[test]
fn test_swap_rejects_cross_screen_and_leaves_rows_untouched() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);
    let day = tomorrow();
    insert_show(&conn, "A", "M1", "S1", day, "12:30", "14:30");
    insert_show(&conn, "C", "M2", "S2", day, "20:00", "21:35");
    insert_show(&conn, "D", "M2", "S1", day, "20:00", "21:35");
    set_show_status(&conn, "D", "cancelled");

    let repo = ShowRepository::new(conn.clone());
    let err = repo.swap_show_times("A", "C", hm(22, 0), hm(14, 5)).unwrap_err();
    assert!(matches!(err, RepositoryError::FieldValueError { .. }));

    let err = repo.swap_show_times("A", "D", hm(22, 0), hm(14, 5)).unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidStateTransition { .. }));

    let err = repo.swap_show_times("A", "missing", hm(22, 0), hm(14, 5)).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));

    assert_eq!(repo.find_by_id("A").unwrap().unwrap().show_time, hm(12, 30));
    assert_eq!(repo.find_by_id("C").unwrap().unwrap().show_time, hm(20, 0));
}

#[test]
fn test_cancel_only_affects_upcoming() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);
    insert_show(&conn, "A", "M1", "S1", tomorrow(), "12:30", "14:30");

    let repo = ShowRepository::new(conn.clone());
    assert!(repo.cancel_show("A").unwrap());
    assert!(!repo.cancel_show("A").unwrap());
    assert_eq!(
        repo.find_by_id("A").unwrap().unwrap().status,
        ShowStatus::Cancelled
    );
}

#[tokio::test]
async fn test_optimize_run_keeps_time_grid_and_sold_shows() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let conn = shared_connection(&db_path);
    seed_catalog(&conn);

    let day = tomorrow();
    insert_show(&conn, "S1-A", "M1", "S1", day, "10:00", "12:00");
    insert_show(&conn, "S1-B", "M2", "S1", day, "12:30", "14:05");
    insert_show(&conn, "S1-C", "M1", "S1", day, "15:00", "17:00");
    insert_show(&conn, "S1-D", "M2", "S1", day, "20:00", "21:35");
    insert_show(&conn, "S2-A", "M2", "S2", day, "17:30", "19:05");
    insert_show(&conn, "S2-B", "M1", "S2", day, "20:00", "22:00");
    insert_booking(&conn, "S1-C", 40);
    insert_booking(&conn, "S2-B", 10);

    let before: BTreeSet<(String, String)> = time_grid(&conn);

    let orchestrator = build_orchestrator(&conn);
    let outcome = orchestrator
        .operate(OperateRequest {
            intent: Some(Intent::Optimize),
            query: None,
            movies: None,
            forecast_days: 1,
        })
        .await
        .unwrap();
    let RunOutcome::Completed { result, .. } = outcome else {
        panic!("显式意图不应挂起");
    };
    let reschedule = result.reschedule.as_ref().unwrap();

    // 互换只交换开场时间，取消保留原时间: 每厅的时间集合不变
    assert_eq!(time_grid(&conn), before);

    let repo = ShowRepository::new(conn.clone());
    for sold in ["S1-C", "S2-B"] {
        let show = repo.find_by_id(sold).unwrap().unwrap();
        assert_eq!(show.status, ShowStatus::Upcoming);
        assert!(reschedule.actions.iter().all(|a| a.show_id != sold));
    }
    assert_eq!(repo.find_by_id("S1-C").unwrap().unwrap().show_time, hm(15, 0));

    for action in &reschedule.actions {
        let show = repo.find_by_id(&action.show_id).unwrap().unwrap();
        match action.action {
            RescheduleActionType::Cancelled => {
                assert_eq!(show.status, ShowStatus::Cancelled);
                assert_eq!(show.booked_seats, 0);
            }
            RescheduleActionType::SwappedIntoPrime | RescheduleActionType::SwappedOffPrime => {
                assert!(action.with_show_id.is_some());
                assert_eq!(show.status, ShowStatus::Upcoming);
            }
        }
    }

    // 被取消的场次不参与调价
    let cancelled: Vec<&str> = reschedule
        .actions
        .iter()
        .filter(|a| a.action == RescheduleActionType::Cancelled)
        .map(|a| a.show_id.as_str())
        .collect();
    let pricing = result.pricing.as_ref().unwrap();
    assert!(pricing
        .updates
        .iter()
        .all(|u| !cancelled.contains(&u.show_id.as_str())));
}

/// (screen_id, show_time) 集合
fn time_grid(
    conn: &std::sync::Arc<std::sync::Mutex<rusqlite::Connection>>,
) -> BTreeSet<(String, String)> {
    let conn = conn.lock().unwrap();
    let mut stmt = conn
        .prepare("SELECT screen_id, show_time FROM show")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<BTreeSet<_>, _>>()
        .unwrap();
    rows
}
