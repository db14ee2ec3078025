// ==========================================
// 影院经营决策系统 - 调价引擎
// ==========================================
// 公式:
//   f_d = 1 + A_d × (2σ(k_d × (demand − m_d)) − 1)
//   f_o = 1 + A_o × (2σ(k_o × (occupancy − m_o)) − 1)
//   raw = base × f_d × f_o
//   smoothed = w × raw + (1 − w) × current
//   clamp [min_ratio × base, max_ratio × base] → 按面额取整 → 再约束
// 红线: 结果对 demand / occupancy 单调不减
// ==========================================

use crate::config::PricingPolicy;
use crate::domain::catalog::SeatCategory;
use crate::domain::schedule::PricingUpdate;
use tracing::debug;

const PRICE_EPSILON: f64 = 1e-9;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 某影厅档位及其当前价（None = 尚未定价）
#[derive(Debug, Clone)]
pub struct CategoryPrice {
    pub category: SeatCategory,
    pub current: Option<f64>,
}

pub struct PricingEngine {
    policy: PricingPolicy,
}

impl PricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { policy }
    }

    /// 价格区间 [下限, 上限]
    pub fn bounds(&self, base: f64) -> (f64, f64) {
        let lo = base * self.policy.min_ratio;
        let hi = base * self.policy.max_ratio.max(self.policy.min_ratio);
        (lo, hi)
    }

    /// 计算单档位新价格
    ///
    /// # 参数
    /// - demand: 场次预测需求
    /// - occupancy: 当前上座率 [0, 1]
    /// - current: 当前价格
    /// - base: 档位基础价
    pub fn price(&self, demand: f64, occupancy: f64, current: f64, base: f64) -> f64 {
        let p = &self.policy;
        let demand = if demand.is_finite() { demand.max(0.0) } else { 0.0 };
        let occupancy = if occupancy.is_finite() { occupancy.clamp(0.0, 1.0) } else { 0.0 };

        let f_d = 1.0
            + p.demand_amplitude * (2.0 * sigmoid(p.demand_sensitivity * (demand - p.demand_midpoint)) - 1.0);
        let f_o = 1.0
            + p.occupancy_amplitude
                * (2.0 * sigmoid(p.occupancy_sensitivity * (occupancy - p.occupancy_midpoint)) - 1.0);

        let raw = base * f_d * f_o;
        let w = p.smoothing_weight.clamp(0.0, 1.0);
        let smoothed = w * raw + (1.0 - w) * current;

        let (lo, hi) = self.bounds(base);
        let clamped = smoothed.clamp(lo, hi);
        self.round_to_denomination(clamped, lo, hi)
    }

    /// 按面额取整，并把越界结果拉回区间内最近的面额倍数
    fn round_to_denomination(&self, value: f64, lo: f64, hi: f64) -> f64 {
        let denom = self.policy.denomination;
        if denom <= 0.0 {
            return round_cents(value);
        }
        let mut rounded = (value / denom).round() * denom;
        if rounded < lo - PRICE_EPSILON {
            rounded = (lo / denom - PRICE_EPSILON).ceil() * denom;
        }
        if rounded > hi + PRICE_EPSILON {
            rounded = (hi / denom + PRICE_EPSILON).floor() * denom;
        }
        if rounded < lo - PRICE_EPSILON || rounded > hi + PRICE_EPSILON {
            // 区间内不存在面额倍数
            return round_cents(value);
        }
        round_cents(rounded)
    }

    /// 为一个场次的所有档位生成调价记录
    ///
    /// 未定价档位以基础价作为旧价
    pub fn updates_for_show(
        &self,
        show_id: &str,
        demand: f64,
        occupancy: f64,
        categories: &[CategoryPrice],
    ) -> Vec<PricingUpdate> {
        categories
            .iter()
            .map(|cp| {
                let base = cp.category.base_price;
                let old_price = cp.current.unwrap_or(base);
                let new_price = self.price(demand, occupancy, old_price, base);
                debug!(
                    show_id = %show_id,
                    category_id = %cp.category.category_id,
                    old_price,
                    new_price,
                    "档位调价"
                );
                PricingUpdate {
                    show_id: show_id.to_string(),
                    category_id: cp.category.category_id.clone(),
                    old_price,
                    new_price,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingPolicy::default())
    }

    #[test]
    fn test_price_within_bounds() {
        let engine = engine();
        for demand in [0.0, 10.0, 60.0, 200.0, 10_000.0] {
            for occupancy in [0.0, 0.3, 0.5, 0.9, 1.0] {
                for current in [50.0, 100.0, 500.0] {
                    let p = engine.price(demand, occupancy, current, 100.0);
                    assert!((80.0..=150.0).contains(&p), "p={}", p);
                    assert!((p / 5.0 - (p / 5.0).round()).abs() < 1e-9, "p={}", p);
                }
            }
        }
    }

    #[test]
    fn test_price_monotonic_in_demand_and_occupancy() {
        let engine = engine();
        let mut last = 0.0;
        for demand in (0..=200).step_by(5) {
            let p = engine.price(demand as f64, 0.5, 100.0, 100.0);
            assert!(p >= last, "demand {} dropped price {} < {}", demand, p, last);
            last = p;
        }
        let mut last = 0.0;
        for step in 0..=20 {
            let occ = step as f64 / 20.0;
            let p = engine.price(60.0, occ, 100.0, 100.0);
            assert!(p >= last, "occupancy {} dropped price {} < {}", occ, p, last);
            last = p;
        }
    }

    #[test]
    fn test_neutral_inputs_hold_price() {
        // demand=midpoint, occupancy=midpoint → raw = base
        let p = engine().price(60.0, 0.5, 100.0, 100.0);
        assert_eq!(p, 100.0);
    }

    #[test]
    fn test_high_pressure_raises_price() {
        let p = engine().price(300.0, 1.0, 100.0, 100.0);
        assert!(p > 100.0);
    }

    #[test]
    fn test_no_denomination_multiple_in_bounds() {
        // base=3 → [2.4, 4.5]，区间内没有 5 的倍数
        let p = engine().price(60.0, 0.5, 3.0, 3.0);
        assert!((2.4..=4.5).contains(&p));
    }

    #[test]
    fn test_updates_seed_missing_price_from_base() {
        let engine = engine();
        let categories = vec![
            CategoryPrice {
                category: SeatCategory {
                    category_id: "REG".to_string(),
                    screen_id: "S1".to_string(),
                    name: "Regular".to_string(),
                    base_price: 100.0,
                },
                current: None,
            },
            CategoryPrice {
                category: SeatCategory {
                    category_id: "VIP".to_string(),
                    screen_id: "S1".to_string(),
                    name: "VIP".to_string(),
                    base_price: 200.0,
                },
                current: Some(220.0),
            },
        ];
        let updates = engine.updates_for_show("SH1", 60.0, 0.5, &categories);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].old_price, 100.0);
        assert_eq!(updates[1].old_price, 220.0);
        assert!((160.0..=300.0).contains(&updates[1].new_price));
    }
}
