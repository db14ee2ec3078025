// ==========================================
// 影院经营决策系统 - 外部信号层
// ==========================================
// 职责: 热度、节假日、需求调整服务
// 红线: 信号失败只降级单片预测，不中断流水线
// ==========================================

pub mod adjustment;
pub mod adjustment_http;
pub mod error;
pub mod market;

pub use adjustment::{
    AdjustmentMultipliers, AdjustmentRequest, DemandAdjustmentService, NoopAdjustmentService,
    TrendDirection,
};
pub use adjustment_http::{adjustment_service_from_env, HttpAdjustmentConfig, HttpAdjustmentService};
pub use error::{SignalError, SignalResult};
pub use market::{ConfigSignalStore, HolidayCalendar, TrendSignalProvider};
