// ==========================================
// 影院经营决策系统 - 配置层
// ==========================================
// 职责: 系统配置管理,编译期默认值 + config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod policy;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use policy::{
    ApprovalPolicy, ForecastPolicy, PipelinePolicy, PricingPolicy, ReschedulePolicy,
    SchedulerPolicy, SlotPolicy,
};
