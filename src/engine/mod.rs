// ==========================================
// 影院经营决策系统 - 引擎层
// ==========================================
// 职责: 实现预测、排片、调度、调价、复盘规则
// 红线: Engine 不拼 SQL，读写一律经由 Repository
// 红线: 所有动作与降级必须输出 reason
// ==========================================

pub mod approval;
pub mod error;
pub mod forecast;
pub mod orchestrator;
pub mod pricing;
pub mod reflection;
pub mod repositories;
pub mod rescheduler;
pub mod router;
pub mod scheduler;
pub mod show_expander;
pub mod slot_distributor;

// 重导出核心引擎
pub use approval::ApprovalGate;
pub use error::{EngineError, EngineResult};
pub use forecast::{FilmForecast, FilmForecastInput, ForecastEngine};
pub use orchestrator::PipelineOrchestrator;
pub use pricing::{CategoryPrice, PricingEngine};
pub use reflection::ReflectionEngine;
pub use repositories::PipelineRepositories;
pub use rescheduler::{PlannedAction, Rescheduler};
pub use router::IntentRouter;
pub use scheduler::{CandidateSlot, FilmDemand, ScreenDayPlan, Scheduler};
pub use show_expander::ShowExpander;
pub use slot_distributor::{SlotDistributor, SlotWeightCell, SlotWeightTable};
