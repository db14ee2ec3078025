// ==========================================
// 影院经营决策系统 - 策略参数
// ==========================================
// 职责: 各阶段可调参数（均有编译期默认值，可由 config_kv 覆写）
// ==========================================

use serde::{Deserialize, Serialize};

/// 需求预测参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPolicy {
    /// 历史回看窗口（天）
    pub lookback_days: u32,
    /// 截尾均值所用的最近窗口（天）
    pub baseline_window_days: usize,
    /// 单侧截尾比例
    pub trim_ratio: f64,
    /// 启用统计模型所需最少历史天数
    pub min_history_for_model: usize,
    pub statistical_model_enabled: bool,
    /// 统计模型权重上限
    pub max_model_weight: f64,
    /// 统计模型权重 = min(上限, 历史天数 / 该值)
    pub model_weight_days_scale: f64,
    pub ridge_lambda: f64,
    pub demand_floor: f64,
    /// 日需求上限 = 物理日容量 × 该比例
    pub capacity_ceiling_ratio: f64,
    pub cold_start_base_fraction: f64,
    pub cold_start_buzz_fraction: f64,
    pub cold_start_decay: f64,
    pub cold_start_confidence: f64,
    /// 周一..周日 日系数
    pub day_factors: [f64; 7],
    pub market_pressure_neutral: f64,
    pub market_pressure_sensitivity: f64,
    pub fallback_confidence_penalty: f64,
}

impl Default for ForecastPolicy {
    fn default() -> Self {
        Self {
            lookback_days: 28,
            baseline_window_days: 14,
            trim_ratio: 0.10,
            min_history_for_model: 7,
            statistical_model_enabled: true,
            max_model_weight: 0.40,
            model_weight_days_scale: 70.0,
            ridge_lambda: 1.0,
            demand_floor: 1.0,
            capacity_ceiling_ratio: 0.95,
            cold_start_base_fraction: 0.05,
            cold_start_buzz_fraction: 0.20,
            cold_start_decay: 0.97,
            cold_start_confidence: 0.40,
            day_factors: [0.85, 0.80, 0.85, 0.90, 1.15, 1.35, 1.25],
            market_pressure_neutral: 0.45,
            market_pressure_sensitivity: 0.30,
            fallback_confidence_penalty: 0.90,
        }
    }
}

/// 时段分布参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPolicy {
    /// (星期, 时段) 最少场次样本
    pub min_samples: u32,
    /// 样本足够但总票数低于该值时标记 learned_low_volume
    pub low_volume_bookings: u32,
    /// 黄金时段加权 (>= 1.5)
    pub prime_multiplier: f64,
    /// 周末表中傍晚及黄金时段的额外放大
    pub weekend_multiplier: f64,
    /// 默认权重（按 SlotBucket 顺序），每个黄金时段只有一个规范值
    pub weekday_defaults: [f64; 5],
    pub weekend_defaults: [f64; 5],
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            min_samples: 3,
            low_volume_bookings: 20,
            prime_multiplier: 1.6,
            weekend_multiplier: 1.15,
            weekday_defaults: [0.12, 0.16, 0.20, 0.28, 0.24],
            weekend_defaults: [0.14, 0.18, 0.20, 0.26, 0.22],
        }
    }
}

/// 排片参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerPolicy {
    /// 营业开始（距零点分钟）
    pub open_minute: u32,
    /// 营业结束（可跨零点，如 1470 = 次日 00:30）
    pub close_minute: u32,
    /// 单场占用时长（分钟）
    pub block_minutes: u32,
    /// 清场间隔（分钟）
    pub cleaning_buffer_minutes: u32,
    /// 黄金时段起点（距零点分钟）
    pub prime_start_minute: u32,
    pub max_shows_per_film_per_day: u32,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            open_minute: 10 * 60,
            close_minute: 24 * 60 + 30,
            block_minutes: 150,
            cleaning_buffer_minutes: 30,
            prime_start_minute: 18 * 60 + 30,
            max_shows_per_film_per_day: 3,
        }
    }
}

/// 存量场次调度参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReschedulePolicy {
    /// 预测需求不高于该值视为"死场"
    pub dead_demand_threshold: f64,
    /// 距开场不足该小时数不再取消
    pub cancel_min_lead_hours: f64,
    pub promote_fill_threshold: f64,
    pub demote_fill_threshold: f64,
}

impl Default for ReschedulePolicy {
    fn default() -> Self {
        Self {
            dead_demand_threshold: 2.0,
            cancel_min_lead_hours: 6.0,
            promote_fill_threshold: 0.60,
            demote_fill_threshold: 0.20,
        }
    }
}

/// 调价参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub demand_sensitivity: f64,
    pub demand_midpoint: f64,
    pub demand_amplitude: f64,
    pub occupancy_sensitivity: f64,
    pub occupancy_midpoint: f64,
    pub occupancy_amplitude: f64,
    /// 新目标价权重，其余保留当前价
    pub smoothing_weight: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub denomination: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            demand_sensitivity: 0.04,
            demand_midpoint: 60.0,
            demand_amplitude: 0.25,
            occupancy_sensitivity: 6.0,
            occupancy_midpoint: 0.5,
            occupancy_amplitude: 0.20,
            smoothing_weight: 0.6,
            min_ratio: 0.8,
            max_ratio: 1.5,
            denomination: 5.0,
        }
    }
}

/// 人工审批门槛
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub threshold: f64,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self { threshold: 0.60 }
    }
}

/// 全链路参数集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelinePolicy {
    pub forecast: ForecastPolicy,
    pub slot: SlotPolicy,
    pub scheduler: SchedulerPolicy,
    pub reschedule: ReschedulePolicy,
    pub pricing: PricingPolicy,
    pub approval: ApprovalPolicy,
}
