// ==========================================
// 影院经营决策系统 - 需求调整服务
// ==========================================
// 职责: 定义调整服务 trait、请求载荷与经过校验的乘数值对象
// 红线: 服务只返回有界乘数，永远不返回绝对票数
// 红线: 服务输出不可信，必须经 AdjustmentMultipliers::parse 校验后才能使用
//       缺失/非有限值 → 拒绝；有限但越界 → 截断到允许区间
// ==========================================

use crate::domain::forecast::DailyBookings;
use crate::signals::error::{SignalError, SignalResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==========================================
// 乘数允许区间
// ==========================================
pub const BASE_MULTIPLIER_RANGE: (f64, f64) = (0.5, 2.0);
pub const WEEKDAY_MULTIPLIER_RANGE: (f64, f64) = (0.6, 1.6);
pub const DECAY_RATE_RANGE: (f64, f64) = (0.0, 0.15);
pub const COMPETITION_RANGE: (f64, f64) = (0.7, 1.1);

/// 趋势方向（定性）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Flat,
    Down,
}

// ==========================================
// AdjustmentMultipliers - 已校验的调整乘数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentMultipliers {
    pub base_multiplier: f64,
    /// 周一..周日
    pub weekday_multipliers: [f64; 7],
    pub decay_rate: f64,
    pub competition_adjustment: f64,
    pub trend_direction: TrendDirection,
    pub drivers: Vec<String>,
    pub risks: Vec<String>,
}

impl AdjustmentMultipliers {
    /// 中性乘数（全部为 1，无衰减）
    pub fn neutral() -> Self {
        Self {
            base_multiplier: 1.0,
            weekday_multipliers: [1.0; 7],
            decay_rate: 0.0,
            competition_adjustment: 1.0,
            trend_direction: TrendDirection::Flat,
            drivers: Vec::new(),
            risks: Vec::new(),
        }
    }

    /// 解析并校验服务原始输出
    ///
    /// 允许输出被 markdown 代码块包裹，取第一个 `{` 到最后一个 `}` 之间的内容
    pub fn parse(raw: &str) -> SignalResult<Self> {
        let start = raw.find('{');
        let end = raw.rfind('}');
        let body = match (start, end) {
            (Some(s), Some(e)) if e > s => &raw[s..=e],
            _ => {
                return Err(SignalError::InvalidResponse(
                    "响应中没有 JSON 对象".to_string(),
                ))
            }
        };
        let value: Value = serde_json::from_str(body)
            .map_err(|e| SignalError::InvalidResponse(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> SignalResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            SignalError::InvalidResponse("响应顶层不是 JSON 对象".to_string())
        })?;

        let base_multiplier = bounded(obj.get("base_multiplier"), "base_multiplier", BASE_MULTIPLIER_RANGE)?;
        let decay_rate = bounded(obj.get("decay_rate"), "decay_rate", DECAY_RATE_RANGE)?;
        let competition_adjustment = bounded(
            obj.get("competition_adjustment"),
            "competition_adjustment",
            COMPETITION_RANGE,
        )?;

        let weekday_raw = obj
            .get("weekday_multipliers")
            .and_then(Value::as_array)
            .ok_or_else(|| missing("weekday_multipliers"))?;
        if weekday_raw.len() != 7 {
            return Err(SignalError::Validation {
                field: "weekday_multipliers".to_string(),
                message: format!("需要 7 个值，实际 {}", weekday_raw.len()),
            });
        }
        let mut weekday_multipliers = [1.0; 7];
        for (idx, v) in weekday_raw.iter().enumerate() {
            weekday_multipliers[idx] = bounded(
                Some(v),
                &format!("weekday_multipliers[{}]", idx),
                WEEKDAY_MULTIPLIER_RANGE,
            )?;
        }

        let trend_direction = match obj
            .get("trend_direction")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            Some("up") => TrendDirection::Up,
            Some("down") => TrendDirection::Down,
            _ => TrendDirection::Flat,
        };

        Ok(Self {
            base_multiplier,
            weekday_multipliers,
            decay_rate,
            competition_adjustment,
            trend_direction,
            drivers: string_list(obj.get("drivers")),
            risks: string_list(obj.get("risks")),
        })
    }

    /// 乘数调整后的单日需求（不含节假日与市场压力）
    ///
    /// # 参数
    /// - baseline: 历史截尾均值
    /// - weekday: 0 = 周一
    /// - horizon_index: 预测期内第几天（从 0 开始）
    pub fn apply(&self, baseline: f64, weekday: usize, horizon_index: u32) -> f64 {
        let weekday_factor = self.weekday_multipliers.get(weekday).copied().unwrap_or(1.0);
        baseline
            * self.base_multiplier
            * weekday_factor
            * (1.0 - self.decay_rate).powi(horizon_index as i32)
            * self.competition_adjustment
    }
}

fn missing(field: &str) -> SignalError {
    SignalError::Validation {
        field: field.to_string(),
        message: "缺失或不是数值".to_string(),
    }
}

fn bounded(value: Option<&Value>, field: &str, (lo, hi): (f64, f64)) -> SignalResult<f64> {
    let v = value.and_then(Value::as_f64).ok_or_else(|| missing(field))?;
    if !v.is_finite() {
        return Err(SignalError::Validation {
            field: field.to_string(),
            message: format!("非有限值: {}", v),
        });
    }
    let clamped = v.clamp(lo, hi);
    if clamped != v {
        tracing::debug!(field, raw = v, clamped, "调整乘数越界，已截断");
    }
    Ok(clamped)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

// ==========================================
// AdjustmentRequest - 调整服务请求载荷
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentRequest {
    pub movie_id: String,
    pub title: String,
    pub history: Vec<DailyBookings>,
    pub baseline: f64,
    /// 统计模型对预测期每天的基线预测（无模型时为空）
    pub statistical_baseline: Vec<f64>,
    pub horizon: Vec<NaiveDate>,
    pub buzz: f64,
    /// 预测期每天的节假日系数
    pub holiday_boosts: Vec<f64>,
    pub market_pressure: f64,
}

impl AdjustmentRequest {
    /// 生成结构化提示词（要求严格 JSON 输出）
    pub fn to_prompt(&self) -> String {
        let history: Vec<String> = self
            .history
            .iter()
            .map(|d| format!("{} {}: {}", d.date, d.date.format("%a"), d.bookings))
            .collect();
        let horizon: Vec<String> = self
            .horizon
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let stat = self
                    .statistical_baseline
                    .get(i)
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "n/a".to_string());
                let holiday = self.holiday_boosts.get(i).copied().unwrap_or(1.0);
                format!("{} {}: statistical={}, holiday_boost={:.2}", date, date.format("%a"), stat, holiday)
            })
            .collect();

        format!(
            "Film: {title} ({movie_id})\n\
             Daily bookings history:\n{history}\n\
             Trimmed-mean baseline: {baseline:.1}\n\
             Buzz score (0-1): {buzz:.2}\n\
             Market pressure (0.15-0.75): {pressure:.2}\n\
             Forecast horizon:\n{horizon}\n\n\
             Return ONLY a JSON object with keys:\n\
             base_multiplier (number {b0}-{b1}), weekday_multipliers (array of 7 numbers {w0}-{w1}, Monday first), \
             decay_rate (number {d0}-{d1}), competition_adjustment (number {c0}-{c1}), \
             trend_direction (\"up\"|\"flat\"|\"down\"), drivers (array of strings), risks (array of strings).\n\
             Never return absolute ticket counts.",
            title = self.title,
            movie_id = self.movie_id,
            history = history.join("\n"),
            baseline = self.baseline,
            buzz = self.buzz,
            pressure = self.market_pressure,
            horizon = horizon.join("\n"),
            b0 = BASE_MULTIPLIER_RANGE.0,
            b1 = BASE_MULTIPLIER_RANGE.1,
            w0 = WEEKDAY_MULTIPLIER_RANGE.0,
            w1 = WEEKDAY_MULTIPLIER_RANGE.1,
            d0 = DECAY_RATE_RANGE.0,
            d1 = DECAY_RATE_RANGE.1,
            c0 = COMPETITION_RANGE.0,
            c1 = COMPETITION_RANGE.1,
        )
    }
}

// ==========================================
// DemandAdjustmentService - 调整服务 trait
// ==========================================
#[async_trait]
pub trait DemandAdjustmentService: Send + Sync {
    /// 请求调整乘数；任何失败都以 Err 返回，由调用方降级
    async fn adjust(&self, request: &AdjustmentRequest) -> SignalResult<AdjustmentMultipliers>;

    /// 服务名称（日志用）
    fn name(&self) -> &'static str;
}

/// 未配置调整服务时使用：始终返回 Unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAdjustmentService;

#[async_trait]
impl DemandAdjustmentService for NoopAdjustmentService {
    async fn adjust(&self, _request: &AdjustmentRequest) -> SignalResult<AdjustmentMultipliers> {
        Err(SignalError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
