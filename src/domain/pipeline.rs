// ==========================================
// 影院经营决策系统 - 流水线上下文与分段结果
// ==========================================
// 职责: 定义贯穿各阶段的上下文、阶段枚举、各阶段不可变输出段
// 红线: 结果段只增不改，已写入的段不允许被后续阶段静默覆盖
// ==========================================

use crate::domain::forecast::{CorrectionRecord, DemandForecast, ShowForecast, SlotForecast};
use crate::domain::schedule::{PricingUpdate, RescheduleAction, ScheduleAssignment};
use crate::domain::types::{Intent, QualityLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==========================================
// 调用请求与路由决策
// ==========================================

/// operate 入口请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperateRequest {
    /// 显式意图（优先于 query）
    #[serde(default)]
    pub intent: Option<Intent>,
    /// 自由文本诉求，由意图路由器解析
    #[serde(default)]
    pub query: Option<String>,
    /// 影片过滤（None = 全部在映影片）
    #[serde(default)]
    pub movies: Option<Vec<String>>,
    pub forecast_days: u32,
}

/// 上游路由决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub route: Intent,
    pub confidence: f64, // [0.35, 0.95]
    pub reason: String,
}

// ==========================================
// 阶段枚举
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Approval,
    Forecast,
    SlotDistribution,
    Scheduling,
    ShowExpansion,
    Rescheduling,
    Pricing,
    Formatting,
    Reflection,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Approval => "approval",
            PipelineStage::Forecast => "forecast",
            PipelineStage::SlotDistribution => "slot_distribution",
            PipelineStage::Scheduling => "scheduling",
            PipelineStage::ShowExpansion => "show_expansion",
            PipelineStage::Rescheduling => "rescheduling",
            PipelineStage::Pricing => "pricing",
            PipelineStage::Formatting => "formatting",
            PipelineStage::Reflection => "reflection",
        }
    }

    pub fn parse(s: &str) -> Option<PipelineStage> {
        match s.trim() {
            "approval" => Some(PipelineStage::Approval),
            "forecast" => Some(PipelineStage::Forecast),
            "slot_distribution" => Some(PipelineStage::SlotDistribution),
            "scheduling" => Some(PipelineStage::Scheduling),
            "show_expansion" => Some(PipelineStage::ShowExpansion),
            "rescheduling" => Some(PipelineStage::Rescheduling),
            "pricing" => Some(PipelineStage::Pricing),
            "formatting" => Some(PipelineStage::Formatting),
            "reflection" => Some(PipelineStage::Reflection),
            _ => None,
        }
    }

    /// 按意图展开的阶段序列
    ///
    /// - scheduling: 排片 → 场次展开（新生成场次）→ 调价
    /// - optimize:   场次展开 → 存量调度 → 调价
    /// - pricing:    场次展开 → 调价
    pub fn plan_for(intent: Intent) -> Vec<PipelineStage> {
        let mut stages = vec![
            PipelineStage::Approval,
            PipelineStage::Forecast,
            PipelineStage::SlotDistribution,
        ];
        match intent {
            Intent::Scheduling => {
                stages.push(PipelineStage::Scheduling);
                stages.push(PipelineStage::ShowExpansion);
            }
            Intent::Optimize => {
                stages.push(PipelineStage::ShowExpansion);
                stages.push(PipelineStage::Rescheduling);
            }
            Intent::Pricing => {
                stages.push(PipelineStage::ShowExpansion);
            }
        }
        stages.push(PipelineStage::Pricing);
        stages.push(PipelineStage::Formatting);
        stages.push(PipelineStage::Reflection);
        stages
    }
}

// ==========================================
// 各阶段输出段
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSection {
    pub forecasts: Vec<DemandForecast>,
    /// 降级到 statistical/fallback 的影片
    pub degraded_movies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotForecastSection {
    pub slots: Vec<SlotForecast>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowForecastSection {
    pub shows: Vec<ShowForecast>,
    /// 没有匹配到任何实际场次的时段行数
    pub unmatched_slot_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingSection {
    pub assignments: Vec<ScheduleAssignment>,
    pub show_ids: Vec<String>,
    /// 因约束冲突被跳过的时段数
    pub skipped_slots: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RescheduleSection {
    pub actions: Vec<RescheduleAction>,
    /// 执行失败被跳过的场次及原因
    pub skipped: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingSection {
    pub updates: Vec<PricingUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionSection {
    pub resolved_count: usize,
    pub mean_error: f64,
    /// 无可复盘样本时为 None
    pub quality: Option<QualityLevel>,
    pub quality_score: Option<u8>,
    pub corrections: Vec<CorrectionRecord>,
    pub message: String,
}

/// 阶段输出（交给聚合器合并）
#[derive(Debug, Clone, PartialEq)]
pub enum StageSection {
    Forecast(ForecastSection),
    SlotForecast(SlotForecastSection),
    ShowForecast(ShowForecastSection),
    Scheduling(SchedulingSection),
    Reschedule(RescheduleSection),
    Pricing(PricingSection),
    Reflection(ReflectionSection),
    Summary(String),
}

impl StageSection {
    pub fn name(&self) -> &'static str {
        match self {
            StageSection::Forecast(_) => "forecast",
            StageSection::SlotForecast(_) => "slot_forecast",
            StageSection::ShowForecast(_) => "show_forecast",
            StageSection::Scheduling(_) => "scheduling",
            StageSection::Reschedule(_) => "reschedule",
            StageSection::Pricing(_) => "pricing",
            StageSection::Reflection(_) => "reflection",
            StageSection::Summary(_) => "summary",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("结果段已存在，不允许覆盖: {0}")]
pub struct SectionConflict(pub &'static str);

// ==========================================
// PipelineResult - 分段聚合结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub forecast: Option<ForecastSection>,
    pub slot_forecast: Option<SlotForecastSection>,
    pub show_forecast: Option<ShowForecastSection>,
    pub scheduling: Option<SchedulingSection>,
    pub reschedule: Option<RescheduleSection>,
    pub pricing: Option<PricingSection>,
    pub reflection: Option<ReflectionSection>,
    pub summary: Option<String>,
}

fn put<T>(slot: &mut Option<T>, value: T, name: &'static str) -> Result<(), SectionConflict> {
    if slot.is_some() {
        return Err(SectionConflict(name));
    }
    *slot = Some(value);
    Ok(())
}

impl PipelineResult {
    /// 合并一个阶段输出段；同名段重复写入返回冲突
    pub fn merge(&mut self, section: StageSection) -> Result<(), SectionConflict> {
        let name = section.name();
        match section {
            StageSection::Forecast(s) => put(&mut self.forecast, s, name),
            StageSection::SlotForecast(s) => put(&mut self.slot_forecast, s, name),
            StageSection::ShowForecast(s) => put(&mut self.show_forecast, s, name),
            StageSection::Scheduling(s) => put(&mut self.scheduling, s, name),
            StageSection::Reschedule(s) => put(&mut self.reschedule, s, name),
            StageSection::Pricing(s) => put(&mut self.pricing, s, name),
            StageSection::Reflection(s) => put(&mut self.reflection, s, name),
            StageSection::Summary(s) => put(&mut self.summary, s, name),
        }
    }

    pub fn day_forecasts(&self) -> &[DemandForecast] {
        self.forecast
            .as_ref()
            .map(|s| s.forecasts.as_slice())
            .unwrap_or(&[])
    }

    pub fn slot_forecasts(&self) -> &[SlotForecast] {
        self.slot_forecast
            .as_ref()
            .map(|s| s.slots.as_slice())
            .unwrap_or(&[])
    }

    pub fn show_forecasts(&self) -> &[ShowForecast] {
        self.show_forecast
            .as_ref()
            .map(|s| s.shows.as_slice())
            .unwrap_or(&[])
    }
}

// ==========================================
// PipelineContext - 流水线上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    pub run_id: String,
    pub intent: Intent,
    pub movies: Option<Vec<String>>,
    pub forecast_days: u32,
    pub decision: RoutingDecision,
    pub approved: bool,
    pub result: PipelineResult,
}

impl PipelineContext {
    pub fn new(run_id: String, request: &OperateRequest, decision: RoutingDecision) -> Self {
        Self {
            run_id,
            intent: decision.route,
            movies: request.movies.clone(),
            forecast_days: request.forecast_days.max(1),
            decision,
            approved: false,
            result: PipelineResult::default(),
        }
    }
}

/// 阶段推进结果
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Continue(PipelineContext),
    PendingApproval {
        token: String,
        context: PipelineContext,
    },
}

/// 对外的运行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        run_id: String,
        result: PipelineResult,
    },
    PendingApproval {
        run_id: String,
        token: String,
        decision: RoutingDecision,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_rejects_overwrite() {
        let mut result = PipelineResult::default();
        result
            .merge(StageSection::Pricing(PricingSection::default()))
            .unwrap();
        let err = result
            .merge(StageSection::Pricing(PricingSection::default()))
            .unwrap_err();
        assert_eq!(err, SectionConflict("pricing"));
    }

    #[test]
    fn test_plan_for_branches() {
        let scheduling = PipelineStage::plan_for(Intent::Scheduling);
        assert!(scheduling.contains(&PipelineStage::Scheduling));
        assert!(!scheduling.contains(&PipelineStage::Rescheduling));

        let optimize = PipelineStage::plan_for(Intent::Optimize);
        assert!(optimize.contains(&PipelineStage::Rescheduling));
        assert!(!optimize.contains(&PipelineStage::Scheduling));

        let pricing = PipelineStage::plan_for(Intent::Pricing);
        assert_eq!(pricing.first(), Some(&PipelineStage::Approval));
        assert_eq!(pricing.last(), Some(&PipelineStage::Reflection));
    }
}
