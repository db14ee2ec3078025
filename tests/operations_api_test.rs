// ==========================================
// API 层集成测试
// ==========================================
// 职责: 验证 AppState 组装、入参校验与错误映射
// ==========================================

mod test_helpers;

use cinema_ops::api::{ApiError, MAX_FORECAST_DAYS};
use cinema_ops::app::AppState;
use cinema_ops::domain::pipeline::OperateRequest;
use cinema_ops::domain::types::Intent;
use test_helpers::*;

fn request(days: u32) -> OperateRequest {
    OperateRequest {
        intent: Some(Intent::Pricing),
        query: None,
        movies: None,
        forecast_days: days,
    }
}

#[tokio::test]
async fn test_operate_validates_forecast_days() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();

    for days in [0, MAX_FORECAST_DAYS + 1] {
        let err = state.operations_api.operate(request(days)).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)), "days={}", days);
    }

    let mut filtered = request(1);
    filtered.movies = Some(vec!["  ".to_string()]);
    let err = state.operations_api.operate(filtered).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[tokio::test]
async fn test_operate_surfaces_missing_input() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();

    let err = state.operations_api.operate(request(1)).await.unwrap_err();
    match err {
        ApiError::MissingInput { stage, .. } => assert_eq!(stage, "forecast"),
        other => panic!("Expected MissingInput, got {:?}", other),
    }
}

#[tokio::test]
async fn test_approve_error_mapping() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();

    assert!(matches!(
        state.operations_api.approve("   ").await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        state.operations_api.approve("unknown-token").await,
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_config_overrides_survive_restart() {
    let (_tmp, db_path) = create_test_db().unwrap();

    {
        let state = AppState::new(db_path.clone()).unwrap();
        state
            .config_api
            .update_config("scheduler.max_shows_per_film_per_day", "2")
            .unwrap();
        state.config_api.set_buzz("M1", 0.8).unwrap();
    }

    let state = AppState::new(db_path).unwrap();
    let policy = state.config_api.current_policy().unwrap();
    assert_eq!(policy.scheduler.max_shows_per_film_per_day, 2);
    assert_eq!(
        state.config_api.get_config("buzz/M1").unwrap().as_deref(),
        Some("0.8")
    );

    let section = state.operations_api.reflect().unwrap();
    assert_eq!(section.resolved_count, 0);
}
