// ==========================================
// 影院经营决策系统 - 复盘引擎
// ==========================================
// 误差 = |实际 − 预测| / max(预测, 1)
// 校正 = clamp(实际 / max(预测, 1), 0.7, 1.3)
// 影片校正系数 = 该片校正的均值（开环，仅持久化）
// ==========================================

use crate::domain::forecast::{CorrectionRecord, ForecastLogEntry, ResolvedForecast};
use crate::domain::pipeline::ReflectionSection;
use crate::domain::types::QualityLevel;
use crate::i18n::t_with_args;
use std::collections::BTreeMap;

pub const CORRECTION_MIN: f64 = 0.7;
pub const CORRECTION_MAX: f64 = 1.3;
/// 聚合校正系数时回看的天数
pub const CORRECTION_LOOKBACK_DAYS: i64 = 30;

pub struct ReflectionEngine {
    // 无状态引擎
}

impl Default for ReflectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflectionEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 单条预测复盘
    pub fn resolve(&self, entry: &ForecastLogEntry, actual: u32) -> ResolvedForecast {
        let denom = entry.forecast_demand.max(1.0);
        let actual_f = actual as f64;
        ResolvedForecast {
            show_id: entry.show_id.clone(),
            movie_id: entry.movie_id.clone(),
            forecast_demand: entry.forecast_demand,
            actual_bookings: actual,
            error: (actual_f - entry.forecast_demand).abs() / denom,
            correction_factor: (actual_f / denom).clamp(CORRECTION_MIN, CORRECTION_MAX),
        }
    }

    /// 按影片聚合校正系数（按 movie_id 排序）
    pub fn aggregate(&self, resolved: &[ResolvedForecast]) -> Vec<CorrectionRecord> {
        let mut by_movie: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for r in resolved {
            let entry = by_movie.entry(r.movie_id.as_str()).or_insert((0.0, 0));
            entry.0 += r.correction_factor;
            entry.1 += 1;
        }
        by_movie
            .into_iter()
            .map(|(movie_id, (sum, n))| CorrectionRecord {
                movie_id: movie_id.to_string(),
                correction_factor: (sum / n as f64).clamp(CORRECTION_MIN, CORRECTION_MAX),
                sample_count: n,
            })
            .collect()
    }

    /// 生成复盘结果段
    ///
    /// # 参数
    /// - resolved: 回看窗口内全部已复盘预测
    /// - corrections: 本次写入的影片校正系数
    pub fn summarize(
        &self,
        resolved: &[ResolvedForecast],
        corrections: Vec<CorrectionRecord>,
    ) -> ReflectionSection {
        if resolved.is_empty() {
            return ReflectionSection {
                resolved_count: 0,
                mean_error: 0.0,
                quality: None,
                quality_score: None,
                corrections,
                message: t_with_args("reflection.no_samples", &[]),
            };
        }

        let mean_error = resolved.iter().map(|r| r.error).sum::<f64>() / resolved.len() as f64;
        let quality = QualityLevel::from_mean_error(mean_error);
        let count = resolved.len().to_string();
        let error = format!("{:.3}", mean_error);
        let score = quality.score().to_string();
        let corrected = corrections.len().to_string();
        let message = t_with_args(
            "reflection.summary",
            &[
                ("count", count.as_str()),
                ("error", error.as_str()),
                ("quality", quality.as_str()),
                ("score", score.as_str()),
                ("corrections", corrected.as_str()),
            ],
        );

        ReflectionSection {
            resolved_count: resolved.len(),
            mean_error,
            quality: Some(quality),
            quality_score: Some(quality.score()),
            corrections,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(movie: &str, forecast: f64) -> ForecastLogEntry {
        ForecastLogEntry {
            log_id: 1,
            run_id: "R1".to_string(),
            show_id: format!("{}-show", movie),
            movie_id: movie.to_string(),
            show_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            forecast_demand: forecast,
            actual_bookings: None,
        }
    }

    #[test]
    fn test_resolve_error_and_correction() {
        let engine = ReflectionEngine::new();
        let r = engine.resolve(&entry("M1", 50.0), 60);
        assert!((r.error - 0.2).abs() < 1e-9);
        assert!((r.correction_factor - 1.2).abs() < 1e-9);

        // 校正截断
        let r = engine.resolve(&entry("M1", 10.0), 100);
        assert_eq!(r.correction_factor, CORRECTION_MAX);
        let r = engine.resolve(&entry("M1", 100.0), 0);
        assert_eq!(r.correction_factor, CORRECTION_MIN);

        // 预测为 0 时分母取 1
        let r = engine.resolve(&entry("M1", 0.0), 1);
        assert!((r.error - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_per_movie() {
        let engine = ReflectionEngine::new();
        let resolved = vec![
            engine.resolve(&entry("M1", 50.0), 60),
            engine.resolve(&entry("M1", 50.0), 40),
            engine.resolve(&entry("M2", 100.0), 110),
        ];
        let corrections = engine.aggregate(&resolved);
        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0].movie_id, "M1");
        assert_eq!(corrections[0].sample_count, 2);
        assert!((corrections[0].correction_factor - 1.0).abs() < 1e-9);
        assert!((corrections[1].correction_factor - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_quality() {
        let engine = ReflectionEngine::new();
        let resolved = vec![engine.resolve(&entry("M1", 100.0), 105)];
        let corrections = engine.aggregate(&resolved);
        let section = engine.summarize(&resolved, corrections);
        assert_eq!(section.resolved_count, 1);
        assert_eq!(section.quality, Some(QualityLevel::Excellent));
        assert_eq!(section.quality_score, Some(5));
        assert!(!section.message.is_empty());
    }

    #[test]
    fn test_summarize_without_samples() {
        let section = ReflectionEngine::new().summarize(&[], Vec::new());
        assert_eq!(section.resolved_count, 0);
        assert!(section.quality.is_none());
    }
}
