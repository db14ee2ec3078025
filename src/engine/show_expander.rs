// ==========================================
// 影院经营决策系统 - 时段→场次展开引擎
// ==========================================
// 职责: 将时段需求按座位数占比分摊到实际场次
// 红线: 同一 (影片, 日期, 时段) 的场次需求之和 = 时段需求
// 红线: 全部输入都匹配不到场次时显式失败，不返回空结果
// ==========================================

use crate::domain::catalog::Show;
use crate::domain::forecast::{ShowForecast, SlotForecast};
use crate::domain::pipeline::ShowForecastSection;
use crate::domain::types::SlotBucket;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::forecast::round2;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

pub struct ShowExpander {
    // 无状态引擎
}

impl Default for ShowExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl ShowExpander {
    pub fn new() -> Self {
        Self {}
    }

    /// 展开时段预测到场次
    ///
    /// # 参数
    /// - slots: 时段预测
    /// - shows: 待映场次
    ///
    /// # 返回
    /// - Ok: 场次预测 + 未匹配时段数
    /// - Err(MissingInput): 没有任何时段匹配到场次
    #[instrument(skip_all, fields(slots = slots.len(), shows = shows.len()))]
    pub fn expand(&self, slots: &[SlotForecast], shows: &[Show]) -> EngineResult<ShowForecastSection> {
        let mut groups: HashMap<(&str, NaiveDate, SlotBucket), Vec<&Show>> = HashMap::new();
        for show in shows {
            groups
                .entry((show.movie_id.as_str(), show.show_date, show.bucket()))
                .or_default()
                .push(show);
        }

        let mut section = ShowForecastSection::default();
        for slot in slots {
            let Some(group) = groups.get(&(slot.movie_id.as_str(), slot.date, slot.slot)) else {
                section.unmatched_slot_count += 1;
                continue;
            };

            let total_capacity: f64 = group.iter().map(|s| s.capacity as f64).sum();
            let shares: Vec<f64> = if total_capacity > 0.0 {
                group.iter().map(|s| s.capacity as f64 / total_capacity).collect()
            } else {
                vec![1.0 / group.len() as f64; group.len()]
            };

            let mut demands: Vec<f64> = shares
                .iter()
                .map(|share| round2(slot.slot_expected_demand * share))
                .collect();
            let remainder = slot.slot_expected_demand - demands.iter().sum::<f64>();
            if let Some(idx) = largest_index(&shares) {
                demands[idx] = round2(demands[idx] + remainder).max(0.0);
            }

            for (show, demand) in group.iter().zip(demands) {
                let fill_ratio = if show.capacity > 0 {
                    demand / show.capacity as f64
                } else {
                    0.0
                };
                section.shows.push(ShowForecast {
                    show_id: show.show_id.clone(),
                    movie_id: show.movie_id.clone(),
                    screen_id: show.screen_id.clone(),
                    date: show.show_date,
                    slot: slot.slot,
                    forecast_demand: demand,
                    capacity: show.capacity,
                    fill_ratio,
                    confidence: slot.confidence,
                });
            }
        }

        if section.shows.is_empty() {
            return Err(EngineError::missing(
                "show_expansion",
                format!(
                    "{} 条时段预测均未匹配到待映场次（场次数 {}）",
                    slots.len(),
                    shows.len()
                ),
            ));
        }
        if section.unmatched_slot_count > 0 {
            warn!(unmatched = section.unmatched_slot_count, "部分时段预测没有对应场次");
        }
        info!(show_forecasts = section.shows.len(), "场次展开完成");
        Ok(section)
    }
}

fn largest_index(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DataQuality, ShowStatus};
    use chrono::NaiveTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn show(id: &str, screen: &str, h: u32, m: u32, capacity: u32) -> Show {
        Show {
            show_id: id.to_string(),
            movie_id: "M1".to_string(),
            screen_id: screen.to_string(),
            show_date: date(),
            show_time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt((h + 2) % 24, m, 0).unwrap(),
            status: ShowStatus::Upcoming,
            capacity,
            booked_seats: 0,
        }
    }

    fn slot(bucket: SlotBucket, demand: f64) -> SlotForecast {
        SlotForecast {
            movie_id: "M1".to_string(),
            date: date(),
            slot: bucket,
            slot_expected_demand: demand,
            slot_weight: 0.3,
            demand_share: 0.3,
            is_prime_slot: bucket.is_prime(),
            data_quality: DataQuality::Fallback,
            confidence: 0.6,
        }
    }

    #[test]
    fn test_split_by_capacity_share() {
        let expander = ShowExpander::new();
        let shows = vec![show("A", "S1", 19, 0, 100), show("B", "S2", 19, 30, 300)];
        let section = expander.expand(&[slot(SlotBucket::Prime, 80.0)], &shows).unwrap();
        assert_eq!(section.shows.len(), 2);
        let a = section.shows.iter().find(|s| s.show_id == "A").unwrap();
        let b = section.shows.iter().find(|s| s.show_id == "B").unwrap();
        assert!((a.forecast_demand - 20.0).abs() < 1e-9);
        assert!((b.forecast_demand - 60.0).abs() < 1e-9);
        assert!((a.fill_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_sum_matches_slot_demand() {
        let expander = ShowExpander::new();
        let shows = vec![
            show("A", "S1", 13, 0, 97),
            show("B", "S2", 13, 10, 151),
            show("C", "S3", 12, 50, 33),
        ];
        let demand = 77.77;
        let section = expander.expand(&[slot(SlotBucket::Afternoon, demand)], &shows).unwrap();
        let sum: f64 = section.shows.iter().map(|s| s.forecast_demand).sum();
        assert!((sum - demand).abs() <= 0.05);
    }

    #[test]
    fn test_unmatched_slots_reported() {
        let expander = ShowExpander::new();
        let shows = vec![show("A", "S1", 10, 0, 100)];
        let section = expander
            .expand(&[slot(SlotBucket::Morning, 10.0), slot(SlotBucket::Prime, 30.0)], &shows)
            .unwrap();
        assert_eq!(section.unmatched_slot_count, 1);
        assert_eq!(section.shows.len(), 1);
    }

    #[test]
    fn test_no_match_is_missing_input() {
        let expander = ShowExpander::new();
        let err = expander.expand(&[slot(SlotBucket::Prime, 30.0)], &[]).unwrap_err();
        assert!(matches!(err, EngineError::MissingInput { stage: "show_expansion", .. }));
    }
}
