// ==========================================
// 影院经营决策系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod booking_repo;
pub mod catalog_repo;
pub mod checkpoint_repo;
pub mod error;
pub mod forecast_log_repo;
pub mod pricing_repo;
pub mod show_repo;

// 重导出核心仓储
pub use booking_repo::BookingRepository;
pub use catalog_repo::CatalogRepository;
pub use checkpoint_repo::{CheckpointRecord, CheckpointRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use forecast_log_repo::ForecastLogRepository;
pub use pricing_repo::PricingRepository;
pub use show_repo::{ReplaceScreenDayOutcome, ShowRepository};
