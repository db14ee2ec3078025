// ==========================================
// 影院经营决策系统 - 需求预测引擎
// ==========================================
// 职责: 单片逐日需求预测（日级）
// 输入: 售票历史 + 热度/节假日信号 + 市场份额 + 物理日容量
// 输出: DemandForecast（每片每天一条）
// ==========================================
// 降级阶梯:
//   调整服务可用 → hybrid（有统计模型）/ llm_only（无统计模型）
//   调整服务失败 → statistical
//   统计模型也不可用 → fallback（确定性公式）
//   无历史 → cold_start
// 红线: 单片任何失败只降级该片，不影响其他影片
// ==========================================

pub mod baseline;
pub mod seasonal_model;

use crate::config::policy::ForecastPolicy;
use crate::domain::catalog::{Movie, Screen};
use crate::domain::forecast::{BookingHistory, DemandForecast};
use crate::domain::pipeline::ForecastSection;
use crate::domain::types::ForecastMethod;
use crate::signals::adjustment::{AdjustmentMultipliers, AdjustmentRequest, DemandAdjustmentService};
use baseline::{coefficient_of_variation, market_pressure, trimmed_mean, velocity};
use chrono::{Datelike, NaiveDate};
use seasonal_model::{SeasonalModel, INTERVAL_Z};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const MIN_CONFIDENCE: f64 = 0.35;
pub const MAX_CONFIDENCE: f64 = 0.95;
const BLEND_AGREEMENT_BONUS: f64 = 0.05;

/// 单片预测输入
#[derive(Debug, Clone)]
pub struct FilmForecastInput<'a> {
    pub movie: &'a Movie,
    /// 回看窗口内的日售票（按日期升序）
    pub history: &'a BookingHistory,
    /// 近 14 天该片售票占全部影片的份额
    pub market_share: f64,
    pub buzz: f64,
    /// 历史期与预测期日期的节假日系数（缺省 1.0）
    pub holidays: &'a HashMap<NaiveDate, f64>,
}

/// 单片预测结果
#[derive(Debug, Clone, PartialEq)]
pub struct FilmForecast {
    pub forecasts: Vec<DemandForecast>,
    pub method: ForecastMethod,
    /// 是否走了 statistical/fallback 降级
    pub degraded: bool,
}

// ==========================================
// ForecastEngine - 需求预测引擎
// ==========================================
pub struct ForecastEngine {
    policy: ForecastPolicy,
    adjustment: Arc<dyn DemandAdjustmentService>,
}

impl ForecastEngine {
    pub fn new(policy: ForecastPolicy, adjustment: Arc<dyn DemandAdjustmentService>) -> Self {
        Self { policy, adjustment }
    }

    /// 物理日容量 = 可用影厅座位数之和 × 每日场次数
    pub fn daily_capacity(screens: &[Screen], slots_per_day: usize) -> f64 {
        let seats: f64 = screens
            .iter()
            .filter(|s| s.is_available)
            .map(|s| s.seat_capacity as f64)
            .sum();
        seats * slots_per_day as f64
    }

    /// 批量预测（逐片顺序执行，单片降级互不影响）
    pub async fn forecast_films(
        &self,
        inputs: &[FilmForecastInput<'_>],
        horizon: &[NaiveDate],
        daily_capacity: f64,
    ) -> ForecastSection {
        let mut section = ForecastSection::default();
        for input in inputs {
            let film = self.forecast_film(input, horizon, daily_capacity).await;
            if film.degraded {
                section.degraded_movies.push(input.movie.movie_id.clone());
            }
            section.forecasts.extend(film.forecasts);
        }
        info!(
            films = inputs.len(),
            forecasts = section.forecasts.len(),
            degraded = section.degraded_movies.len(),
            "需求预测完成"
        );
        section
    }

    /// 单片逐日预测
    ///
    /// # 参数
    /// - input: 单片输入
    /// - horizon: 预测日期（升序）
    /// - daily_capacity: 物理日容量（座位×场次）
    #[instrument(skip_all, fields(movie_id = %input.movie.movie_id, horizon = horizon.len()))]
    pub async fn forecast_film(
        &self,
        input: &FilmForecastInput<'_>,
        horizon: &[NaiveDate],
        daily_capacity: f64,
    ) -> FilmForecast {
        let p = &self.policy;
        let lookback = p.lookback_days.max(1) as usize;
        let days = &input.history.days[input.history.days.len().saturating_sub(lookback)..];
        let pressure = market_pressure(input.market_share);
        let ceiling = (daily_capacity * p.capacity_ceiling_ratio).max(p.demand_floor);
        let holiday_of = |d: &NaiveDate| input.holidays.get(d).copied().unwrap_or(1.0);

        if days.is_empty() {
            return self.cold_start(input, horizon, daily_capacity, pressure, ceiling);
        }

        let counts: Vec<f64> = days.iter().map(|d| d.bookings as f64).collect();
        let window = &counts[counts.len().saturating_sub(p.baseline_window_days.max(1))..];
        let baseline = trimmed_mean(window, p.trim_ratio);
        let vel = velocity(&counts);
        let stability = 1.0 - coefficient_of_variation(&counts).min(1.0);
        let history_score = (counts.len() as f64 / lookback as f64).min(1.0);

        // ===== 统计模型 =====
        let model = if p.statistical_model_enabled && counts.len() >= p.min_history_for_model {
            let observations: Vec<(NaiveDate, f64)> =
                days.iter().map(|d| (d.date, d.bookings as f64)).collect();
            SeasonalModel::fit(
                &observations,
                input.buzz,
                input.holidays,
                p.ridge_lambda,
                p.min_history_for_model,
            )
        } else {
            None
        };
        let stat_preds: Vec<f64> = match &model {
            Some(m) => horizon
                .iter()
                .map(|d| m.predict(*d, input.buzz, holiday_of(d)))
                .collect(),
            None => Vec::new(),
        };
        let weight = if model.is_some() {
            (counts.len() as f64 / p.model_weight_days_scale.max(1.0)).min(p.max_model_weight)
        } else {
            0.0
        };

        // ===== 调整服务 =====
        let request = AdjustmentRequest {
            movie_id: input.movie.movie_id.clone(),
            title: input.movie.title.clone(),
            history: days.to_vec(),
            baseline,
            statistical_baseline: stat_preds.clone(),
            horizon: horizon.to_vec(),
            buzz: input.buzz,
            holiday_boosts: horizon.iter().map(holiday_of).collect(),
            market_pressure: pressure,
        };
        let multipliers: Option<AdjustmentMultipliers> = match self.adjustment.adjust(&request).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(
                    movie_id = %input.movie.movie_id,
                    service = self.adjustment.name(),
                    error = %e,
                    "需求调整服务不可用，降级"
                );
                None
            }
        };

        let method = match (&multipliers, &model) {
            (Some(_), Some(_)) if weight > 0.0 => ForecastMethod::Hybrid,
            (Some(_), _) => ForecastMethod::LlmOnly,
            (None, Some(_)) => ForecastMethod::Statistical,
            (None, None) => ForecastMethod::Fallback,
        };

        let pressure_adj = 1.0 + p.market_pressure_sensitivity * (p.market_pressure_neutral - pressure);

        let mut confidence = MIN_CONFIDENCE
            + 0.6 * (0.45 * history_score + 0.20 * (1.0 - pressure) + 0.35 * stability);
        if multipliers.is_some() && weight > 0.0 {
            confidence += BLEND_AGREEMENT_BONUS;
        }
        if method == ForecastMethod::Fallback {
            confidence *= p.fallback_confidence_penalty;
        }
        let confidence = confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

        let mut forecasts = Vec::with_capacity(horizon.len());
        for (i, date) in horizon.iter().enumerate() {
            let dow = date.weekday().num_days_from_monday() as usize;
            let holiday = holiday_of(date);
            let stat = stat_preds.get(i).copied();

            let raw = match (&multipliers, stat) {
                (Some(m), stat) => {
                    let adjusted = m.apply(baseline, dow, i as u32) * holiday;
                    let blended = match stat {
                        Some(s) if weight > 0.0 => weight * s + (1.0 - weight) * adjusted,
                        _ => adjusted,
                    };
                    blended * pressure_adj
                }
                (None, Some(s)) => s * pressure_adj,
                (None, None) => baseline * p.day_factors[dow] * vel.sqrt() * holiday,
            };
            let demand = sanitize(raw).clamp(p.demand_floor, ceiling);

            let (lower, upper) = match &model {
                Some(m) => {
                    let band = INTERVAL_Z * m.residual_std();
                    (Some((demand - band).max(0.0)), Some((demand + band).min(ceiling)))
                }
                None => (None, None),
            };

            forecasts.push(DemandForecast {
                movie_id: input.movie.movie_id.clone(),
                date: *date,
                movie_day_demand: round2(demand),
                velocity: vel,
                market_pressure: pressure,
                confidence,
                forecast_method: method,
                prediction_lower: lower.map(round2),
                prediction_upper: upper.map(round2),
            });
        }

        debug!(
            movie_id = %input.movie.movie_id,
            method = %method,
            baseline,
            weight,
            confidence,
            "单片预测完成"
        );

        FilmForecast {
            forecasts,
            method,
            degraded: matches!(method, ForecastMethod::Statistical | ForecastMethod::Fallback),
        }
    }

    /// 冷启动：容量 × (基础比例 + 热度比例 × 热度) × 日系数 × 衰减^i × 节假日
    fn cold_start(
        &self,
        input: &FilmForecastInput<'_>,
        horizon: &[NaiveDate],
        daily_capacity: f64,
        pressure: f64,
        ceiling: f64,
    ) -> FilmForecast {
        let p = &self.policy;
        let fraction = p.cold_start_base_fraction + p.cold_start_buzz_fraction * input.buzz.clamp(0.0, 1.0);
        let confidence = p.cold_start_confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

        let forecasts = horizon
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let dow = date.weekday().num_days_from_monday() as usize;
                let holiday = input.holidays.get(date).copied().unwrap_or(1.0);
                let raw = daily_capacity
                    * fraction
                    * p.day_factors[dow]
                    * p.cold_start_decay.powi(i as i32)
                    * holiday;
                DemandForecast {
                    movie_id: input.movie.movie_id.clone(),
                    date: *date,
                    movie_day_demand: round2(sanitize(raw).clamp(p.demand_floor, ceiling)),
                    velocity: 1.0,
                    market_pressure: pressure,
                    confidence,
                    forecast_method: ForecastMethod::ColdStart,
                    prediction_lower: None,
                    prediction_upper: None,
                }
            })
            .collect();

        info!(movie_id = %input.movie.movie_id, buzz = input.buzz, "无历史数据，使用冷启动预测");
        FilmForecast {
            forecasts,
            method: ForecastMethod::ColdStart,
            degraded: false,
        }
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::DailyBookings;
    use crate::signals::adjustment::NoopAdjustmentService;
    use crate::signals::error::{SignalError, SignalResult};
    use async_trait::async_trait;

    struct FixedAdjustment(AdjustmentMultipliers);

    #[async_trait]
    impl DemandAdjustmentService for FixedAdjustment {
        async fn adjust(&self, _request: &AdjustmentRequest) -> SignalResult<AdjustmentMultipliers> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct BrokenAdjustment;

    #[async_trait]
    impl DemandAdjustmentService for BrokenAdjustment {
        async fn adjust(&self, _request: &AdjustmentRequest) -> SignalResult<AdjustmentMultipliers> {
            Err(SignalError::InvalidResponse("garbage".to_string()))
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn movie() -> Movie {
        Movie {
            movie_id: "M1".to_string(),
            title: "Test Film".to_string(),
            runtime_minutes: 120,
            is_active: true,
        }
    }

    fn flat_history(days: u32, bookings: u32) -> BookingHistory {
        // 最后一天为 2026-03-15
        let last = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        BookingHistory {
            movie_id: "M1".to_string(),
            days: (0..days)
                .rev()
                .map(|k| DailyBookings {
                    date: last - chrono::Duration::days(k as i64),
                    bookings,
                })
                .collect(),
        }
    }

    fn horizon() -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        (0..7).map(|i| start + chrono::Duration::days(i)).collect()
    }

    #[tokio::test]
    async fn test_fallback_flat_history_tracks_day_factors() {
        let mut policy = ForecastPolicy::default();
        policy.statistical_model_enabled = false;
        let engine = ForecastEngine::new(policy.clone(), Arc::new(NoopAdjustmentService));
        let m = movie();
        let history = flat_history(14, 50);
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 1.0,
            buzz: 0.5,
            holidays: &holidays,
        };

        let film = engine.forecast_film(&input, &horizon(), 10_000.0).await;
        assert_eq!(film.method, ForecastMethod::Fallback);
        assert!(film.degraded);
        for f in &film.forecasts {
            let dow = f.date.weekday().num_days_from_monday() as usize;
            let expected = 50.0 * policy.day_factors[dow];
            assert!((f.movie_day_demand - expected).abs() < 0.5, "{} vs {}", f.movie_day_demand, expected);
            assert!(f.confidence >= 0.5);
            assert_eq!(f.forecast_method, ForecastMethod::Fallback);
        }
    }

    #[tokio::test]
    async fn test_cold_start_without_history() {
        let engine = ForecastEngine::new(ForecastPolicy::default(), Arc::new(NoopAdjustmentService));
        let m = movie();
        let history = BookingHistory {
            movie_id: "M1".to_string(),
            days: Vec::new(),
        };
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 0.0,
            buzz: 1.0,
            holidays: &holidays,
        };

        let film = engine.forecast_film(&input, &horizon(), 1000.0).await;
        assert_eq!(film.method, ForecastMethod::ColdStart);
        let first = &film.forecasts[0];
        // 2026-03-16 周一: 1000 × 0.25 × 0.85
        assert!((first.movie_day_demand - 212.5).abs() < 0.01);
        assert_eq!(first.confidence, 0.40);
        assert_eq!(first.market_pressure, 0.75);
    }

    #[tokio::test]
    async fn test_hybrid_with_adjustment_and_model() {
        let engine = ForecastEngine::new(
            ForecastPolicy::default(),
            Arc::new(FixedAdjustment(AdjustmentMultipliers::neutral())),
        );
        let m = movie();
        let history = flat_history(28, 60);
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 0.5,
            buzz: 0.5,
            holidays: &holidays,
        };

        let film = engine.forecast_film(&input, &horizon(), 10_000.0).await;
        assert_eq!(film.method, ForecastMethod::Hybrid);
        assert!(!film.degraded);
        for f in &film.forecasts {
            assert!(f.prediction_lower.is_some() && f.prediction_upper.is_some());
            assert!(f.confidence >= MIN_CONFIDENCE && f.confidence <= MAX_CONFIDENCE);
            // 中性乘数 + 平坦历史：结果贴近 60 × 市场压力修正
            let pressure_adj = 1.0 + 0.3 * (0.45 - 0.5);
            assert!((f.movie_day_demand - 60.0 * pressure_adj).abs() < 2.0);
        }
    }

    #[tokio::test]
    async fn test_adjustment_failure_degrades_to_statistical() {
        let engine = ForecastEngine::new(ForecastPolicy::default(), Arc::new(BrokenAdjustment));
        let m = movie();
        let history = flat_history(21, 40);
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 0.3,
            buzz: 0.5,
            holidays: &holidays,
        };
        let film = engine.forecast_film(&input, &horizon(), 10_000.0).await;
        assert_eq!(film.method, ForecastMethod::Statistical);
        assert!(film.degraded);
    }

    #[tokio::test]
    async fn test_short_history_with_adjustment_is_llm_only() {
        let engine = ForecastEngine::new(
            ForecastPolicy::default(),
            Arc::new(FixedAdjustment(AdjustmentMultipliers::neutral())),
        );
        let m = movie();
        let history = flat_history(3, 30);
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 0.3,
            buzz: 0.5,
            holidays: &holidays,
        };
        let film = engine.forecast_film(&input, &horizon(), 10_000.0).await;
        assert_eq!(film.method, ForecastMethod::LlmOnly);
        assert!(film.forecasts.iter().all(|f| f.prediction_lower.is_none()));
    }

    #[tokio::test]
    async fn test_demand_clamped_to_capacity() {
        let engine = ForecastEngine::new(ForecastPolicy::default(), Arc::new(NoopAdjustmentService));
        let m = movie();
        let history = flat_history(14, 5_000);
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 1.0,
            buzz: 0.5,
            holidays: &holidays,
        };
        let film = engine.forecast_film(&input, &horizon(), 200.0).await;
        assert!(film.forecasts.iter().all(|f| f.movie_day_demand <= 190.0));
        assert!(film.forecasts.iter().all(|f| f.movie_day_demand >= 1.0));
    }

    #[tokio::test]
    async fn test_prediction_band_clamped_to_capacity() {
        let engine = ForecastEngine::new(ForecastPolicy::default(), Arc::new(BrokenAdjustment));
        let m = movie();
        // 逐日高低交替，残差不为零
        let mut history = flat_history(28, 0);
        for (k, day) in history.days.iter_mut().enumerate() {
            day.bookings = if k % 2 == 0 { 5_000 } else { 1_000 };
        }
        let holidays = HashMap::new();
        let input = FilmForecastInput {
            movie: &m,
            history: &history,
            market_share: 1.0,
            buzz: 0.5,
            holidays: &holidays,
        };
        let film = engine.forecast_film(&input, &horizon(), 200.0).await;
        assert_eq!(film.method, ForecastMethod::Statistical);
        for f in &film.forecasts {
            let upper = f.prediction_upper.unwrap();
            let lower = f.prediction_lower.unwrap();
            assert!(upper <= 190.0, "upper={}", upper);
            assert!(lower <= f.movie_day_demand && f.movie_day_demand <= upper);
        }
    }
}
