// ==========================================
// 影院经营决策系统 - 时段分布引擎
// ==========================================
// 职责: 将日级需求拆分到五个固定时段桶
// 输入: DemandForecast + 已完成场次历史 + 影厅总座位数
// 输出: SlotForecast
// ==========================================
// 红线: 同片同日各时段需求之和 = 日级需求（两位小数，余数并入最大桶）
// 红线: 置信度截断到 [0.35, 0.95]
// ==========================================

use crate::config::policy::SlotPolicy;
use crate::domain::forecast::{CompletedShowStat, DemandForecast, SlotForecast, SlotHistoryRow};
use crate::domain::types::{DataQuality, SlotBucket};
use crate::engine::forecast::{round2, MAX_CONFIDENCE, MIN_CONFIDENCE};
use chrono::Datelike;
use tracing::{info, instrument};

const BUCKETS: usize = 5;

/// 单个 (星期, 时段) 单元的权重
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotWeightCell {
    pub weight: f64,
    pub quality: DataQuality,
}

/// 星期 × 时段 权重表（每个星期行归一化）
#[derive(Debug, Clone, PartialEq)]
pub struct SlotWeightTable {
    rows: [[SlotWeightCell; BUCKETS]; 7],
}

impl SlotWeightTable {
    pub fn row(&self, weekday: usize) -> &[SlotWeightCell; BUCKETS] {
        &self.rows[weekday.min(6)]
    }
}

// ==========================================
// SlotDistributor - 时段分布引擎
// ==========================================
pub struct SlotDistributor {
    policy: SlotPolicy,
}

impl SlotDistributor {
    pub fn new(policy: SlotPolicy) -> Self {
        Self { policy }
    }

    /// 周六、周日使用周末默认表
    fn is_weekend(weekday: usize) -> bool {
        weekday >= 5
    }

    /// 默认权重（已归一化）
    pub fn default_weights(&self, weekday: usize) -> [f64; BUCKETS] {
        let mut w = if Self::is_weekend(weekday) {
            let mut w = self.policy.weekend_defaults;
            for slot in [SlotBucket::Evening, SlotBucket::Prime, SlotBucket::LatePrime] {
                w[slot.index()] *= self.policy.weekend_multiplier;
            }
            w
        } else {
            self.policy.weekday_defaults
        };
        normalize(&mut w);
        w
    }

    /// 已完成场次按 (星期, 时段) 聚合
    pub fn aggregate_history(stats: &[CompletedShowStat]) -> Vec<SlotHistoryRow> {
        let mut cells = [[(0u32, 0u32); BUCKETS]; 7];
        for s in stats {
            let weekday = s.date.weekday().num_days_from_monday() as usize;
            let slot = SlotBucket::nearest(s.time);
            let cell = &mut cells[weekday][slot.index()];
            cell.0 += 1;
            cell.1 += s.bookings;
        }

        let mut rows = Vec::new();
        for (weekday, row) in cells.iter().enumerate() {
            for slot in SlotBucket::ALL {
                let (show_count, bookings) = row[slot.index()];
                if show_count > 0 {
                    rows.push(SlotHistoryRow {
                        weekday: weekday as u32,
                        slot,
                        show_count,
                        bookings,
                    });
                }
            }
        }
        rows
    }

    /// 学习权重表
    ///
    /// 每个星期行内:
    /// - 样本不足的单元使用默认权重，标记 fallback
    /// - 样本充足的单元按"场均售票"占比，分摊这些单元在默认表中的总权重
    /// - 样本充足但总票数过低的单元标记 learned_low_volume
    pub fn learn_weights(&self, history: &[SlotHistoryRow]) -> SlotWeightTable {
        let fallback_cell = SlotWeightCell {
            weight: 0.0,
            quality: DataQuality::Fallback,
        };
        let mut rows = [[fallback_cell; BUCKETS]; 7];

        for (weekday, row) in rows.iter_mut().enumerate() {
            let defaults = self.default_weights(weekday);
            let mut avg = [None::<(f64, u32)>; BUCKETS];
            for h in history.iter().filter(|h| h.weekday as usize == weekday) {
                if h.show_count >= self.policy.min_samples {
                    avg[h.slot.index()] = Some((h.bookings as f64 / h.show_count as f64, h.bookings));
                }
            }

            let learned_mass: f64 = (0..BUCKETS)
                .filter(|&b| avg[b].is_some())
                .map(|b| defaults[b])
                .sum();
            let learned_avg_total: f64 = avg.iter().flatten().map(|(a, _)| *a).sum();

            for b in 0..BUCKETS {
                row[b] = match avg[b] {
                    None => SlotWeightCell {
                        weight: defaults[b],
                        quality: DataQuality::Fallback,
                    },
                    Some((a, bookings)) => {
                        let weight = if learned_avg_total > 0.0 {
                            learned_mass * a / learned_avg_total
                        } else {
                            defaults[b]
                        };
                        let quality = if bookings < self.policy.low_volume_bookings {
                            DataQuality::LearnedLowVolume
                        } else {
                            DataQuality::Learned
                        };
                        SlotWeightCell { weight, quality }
                    }
                };
            }
        }

        SlotWeightTable { rows }
    }

    /// 拆分日级需求到时段
    ///
    /// # 参数
    /// - forecasts: 日级预测
    /// - table: 权重表
    /// - aggregate_seats: 可用影厅座位数之和（时段填充率分母）
    #[instrument(skip_all, fields(forecasts = forecasts.len()))]
    pub fn distribute(
        &self,
        forecasts: &[DemandForecast],
        table: &SlotWeightTable,
        aggregate_seats: f64,
    ) -> Vec<SlotForecast> {
        let mut out = Vec::with_capacity(forecasts.len() * BUCKETS);

        for f in forecasts {
            let weekday = f.date.weekday().num_days_from_monday() as usize;
            let cells = table.row(weekday);

            let mut raw = [0.0; BUCKETS];
            for slot in SlotBucket::ALL {
                let mut w = cells[slot.index()].weight.max(0.0);
                if slot.is_prime() {
                    w *= self.policy.prime_multiplier;
                }
                raw[slot.index()] = w;
            }
            let total: f64 = raw.iter().sum();
            let shares: [f64; BUCKETS] = if total > 0.0 {
                raw.map(|w| w / total)
            } else {
                [1.0 / BUCKETS as f64; BUCKETS]
            };

            let day_total = round2(f.movie_day_demand);
            let mut demands = shares.map(|s| round2(s * day_total));
            let largest = largest_index(&shares);
            let remainder = day_total - demands.iter().sum::<f64>();
            demands[largest] = round2(demands[largest] + remainder).max(0.0);

            for slot in SlotBucket::ALL {
                let idx = slot.index();
                let quality = cells[idx].quality;
                out.push(SlotForecast {
                    movie_id: f.movie_id.clone(),
                    date: f.date,
                    slot,
                    slot_expected_demand: demands[idx],
                    slot_weight: raw[idx],
                    demand_share: shares[idx],
                    is_prime_slot: slot.is_prime(),
                    data_quality: quality,
                    confidence: slot_confidence(
                        f.confidence,
                        quality,
                        demands[idx],
                        aggregate_seats,
                        slot.is_prime(),
                    ),
                });
            }
        }

        info!(slots = out.len(), "时段分布完成");
        out
    }
}

/// 时段置信度 = 日级置信度 + 数据质量 + 填充率 + 黄金时段
pub fn slot_confidence(
    day_confidence: f64,
    quality: DataQuality,
    slot_demand: f64,
    aggregate_seats: f64,
    is_prime: bool,
) -> f64 {
    let quality_adj = match quality {
        DataQuality::Learned => 0.05,
        DataQuality::LearnedLowVolume => -0.03,
        DataQuality::Fallback => -0.08,
    };
    let fill = if aggregate_seats > 0.0 {
        slot_demand / aggregate_seats
    } else {
        0.0
    };
    let fill_adj = if fill < 0.10 {
        -0.10
    } else if fill > 0.95 {
        -0.08
    } else if (0.40..=0.85).contains(&fill) {
        0.05
    } else {
        0.0
    };
    let prime_adj = if is_prime { 0.03 } else { 0.0 };

    (day_confidence + quality_adj + fill_adj + prime_adj).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

fn normalize(w: &mut [f64; BUCKETS]) {
    let total: f64 = w.iter().sum();
    if total > 0.0 {
        for v in w.iter_mut() {
            *v /= total;
        }
    }
}

fn largest_index(values: &[f64; BUCKETS]) -> usize {
    let mut best = 0;
    for i in 1..BUCKETS {
        if values[i] > values[best] {
            best = i;
        }
    }
    best
}
