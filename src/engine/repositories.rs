// ==========================================
// 影院经营决策系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合流水线编排所需的全部 Repository
// 所有仓储共享同一个 SQLite 连接
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    BookingRepository, CatalogRepository, CheckpointRepository, ForecastLogRepository,
    PricingRepository, ShowRepository,
};

/// 流水线仓储集合
///
/// # 包含的仓储
/// - `catalog`: 影片/影厅/座位档位
/// - `shows`: 场次读写（重排、互换、取消）
/// - `bookings`: 售票历史
/// - `prices`: 档位价格
/// - `forecast_log`: 预测日志与校正系数
/// - `checkpoints`: 审批断点
#[derive(Clone)]
pub struct PipelineRepositories {
    pub catalog: Arc<CatalogRepository>,
    pub shows: Arc<ShowRepository>,
    pub bookings: Arc<BookingRepository>,
    pub prices: Arc<PricingRepository>,
    pub forecast_log: Arc<ForecastLogRepository>,
    pub checkpoints: Arc<CheckpointRepository>,
}

impl PipelineRepositories {
    /// 基于共享连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            catalog: Arc::new(CatalogRepository::new(conn.clone())),
            shows: Arc::new(ShowRepository::new(conn.clone())),
            bookings: Arc::new(BookingRepository::new(conn.clone())),
            prices: Arc::new(PricingRepository::new(conn.clone())),
            forecast_log: Arc::new(ForecastLogRepository::new(conn.clone())),
            checkpoints: Arc::new(CheckpointRepository::new(conn)),
        }
    }
}
