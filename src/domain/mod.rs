// ==========================================
// 影院经营决策系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、流水线数据契约
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod forecast;
pub mod pipeline;
pub mod schedule;
pub mod types;

// 重导出核心类型
pub use catalog::{compute_end_time, Movie, Screen, SeatCategory, Show};
pub use forecast::{
    BookingHistory, CorrectionRecord, DailyBookings, DemandForecast, ForecastLogEntry,
    ResolvedForecast, ShowForecast, SlotForecast, SlotHistoryRow,
};
pub use pipeline::{
    ForecastSection, OperateRequest, PipelineContext, PipelineResult, PipelineStage,
    PricingSection, ReflectionSection, RescheduleSection, RoutingDecision, RunOutcome,
    SchedulingSection, SectionConflict, ShowForecastSection, SlotForecastSection, StageOutcome,
    StageSection,
};
pub use schedule::{PricingUpdate, RescheduleAction, ScheduleAssignment};
pub use types::{
    DataQuality, ForecastMethod, Intent, QualityLevel, RescheduleActionType, ShowStatus,
    SlotBucket,
};
