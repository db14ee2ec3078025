// ==========================================
// 影院经营决策系统 - 存量场次调度引擎
// ==========================================
// 职责: 对次日已排"待映"场次生成有限的纠偏动作
// 动作:
// - 取消: 零售票 + 预测需求 ≤ 死场阈值 + 距开场 ≥ 宽限小时
// - 升黄金: 非黄金高需求场次与同厅同日低需求黄金场次互换
// - 降黄金: 黄金低需求场次与同厅同日更优非黄金场次互换
// 红线: 每个场次单次运行至多参与一个动作
// 红线: 有售票的场次不参与互换
// ==========================================

use crate::config::ReschedulePolicy;
use crate::domain::catalog::{compute_end_time, Show};
use crate::domain::forecast::ShowForecast;
use crate::domain::schedule::RescheduleAction;
use crate::domain::types::RescheduleActionType;
use chrono::{NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument};

/// 待执行动作
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    Cancel {
        show_id: String,
        reason: String,
    },
    /// `into_prime` 换入 `off_prime` 的开场时间，反之亦然
    Swap {
        into_prime: String,
        off_prime: String,
        /// 换位后 into_prime 的散场时间
        into_prime_end: NaiveTime,
        /// 换位后 off_prime 的散场时间
        off_prime_end: NaiveTime,
        reason: String,
    },
}

impl PlannedAction {
    /// 展开为对外报告的动作记录（互换产生两条）
    pub fn to_actions(&self) -> Vec<RescheduleAction> {
        match self {
            PlannedAction::Cancel { show_id, reason } => vec![RescheduleAction {
                show_id: show_id.clone(),
                action: RescheduleActionType::Cancelled,
                with_show_id: None,
                reason: reason.clone(),
            }],
            PlannedAction::Swap {
                into_prime,
                off_prime,
                reason,
                ..
            } => vec![
                RescheduleAction {
                    show_id: into_prime.clone(),
                    action: RescheduleActionType::SwappedIntoPrime,
                    with_show_id: Some(off_prime.clone()),
                    reason: reason.clone(),
                },
                RescheduleAction {
                    show_id: off_prime.clone(),
                    action: RescheduleActionType::SwappedOffPrime,
                    with_show_id: Some(into_prime.clone()),
                    reason: reason.clone(),
                },
            ],
        }
    }

    pub fn show_ids(&self) -> Vec<&str> {
        match self {
            PlannedAction::Cancel { show_id, .. } => vec![show_id.as_str()],
            PlannedAction::Swap {
                into_prime,
                off_prime,
                ..
            } => vec![into_prime.as_str(), off_prime.as_str()],
        }
    }
}

pub struct Rescheduler {
    policy: ReschedulePolicy,
}

impl Rescheduler {
    pub fn new(policy: ReschedulePolicy) -> Self {
        Self { policy }
    }

    /// 生成调度动作
    ///
    /// # 参数
    /// - shows: 次日"待映"场次
    /// - forecasts: 场次级预测（按 show_id）
    /// - runtimes: 影片片长（分钟，按 movie_id）
    /// - now: 当前时间（宽限窗口判断）
    ///
    /// # 返回
    /// 动作列表（先取消后互换）
    #[instrument(skip_all, fields(shows = shows.len()))]
    pub fn plan(
        &self,
        shows: &[Show],
        forecasts: &HashMap<String, ShowForecast>,
        runtimes: &HashMap<String, u32>,
        now: NaiveDateTime,
    ) -> Vec<PlannedAction> {
        let mut by_screen: BTreeMap<&str, Vec<&Show>> = BTreeMap::new();
        for show in shows {
            by_screen.entry(show.screen_id.as_str()).or_default().push(show);
        }
        for list in by_screen.values_mut() {
            list.sort_by_key(|s| (s.show_date, s.show_time));
        }

        let mut used: HashSet<&str> = HashSet::new();
        let mut actions = Vec::new();

        // 第一轮: 取消死场
        for list in by_screen.values() {
            for show in list {
                let Some(fc) = forecasts.get(&show.show_id) else {
                    continue;
                };
                if self.should_cancel(show, fc, now) {
                    used.insert(show.show_id.as_str());
                    actions.push(PlannedAction::Cancel {
                        show_id: show.show_id.clone(),
                        reason: format!(
                            "零售票且预测需求 {:.2} ≤ {:.2}，距开场 {:.1} 小时",
                            fc.forecast_demand,
                            self.policy.dead_demand_threshold,
                            show.hours_until_start(now)
                        ),
                    });
                }
            }
        }

        // 第二轮: 黄金时段互换
        for list in by_screen.values() {
            for show in list {
                if used.contains(show.show_id.as_str()) || show.booked_seats > 0 {
                    continue;
                }
                let Some(fill) = fill_of(show, forecasts) else {
                    continue;
                };

                let is_prime = show.bucket().is_prime();
                let partner = if !is_prime && fill >= self.policy.promote_fill_threshold {
                    list.iter()
                        .filter(|p| p.bucket().is_prime() && swappable(p, &used))
                        .filter_map(|p| fill_of(p, forecasts).map(|f| (*p, f)))
                        .filter(|(_, f)| *f < fill)
                        .min_by(|a, b| a.1.total_cmp(&b.1))
                } else if is_prime && fill <= self.policy.demote_fill_threshold {
                    list.iter()
                        .filter(|p| !p.bucket().is_prime() && swappable(p, &used))
                        .filter_map(|p| fill_of(p, forecasts).map(|f| (*p, f)))
                        .filter(|(_, f)| *f > fill)
                        .max_by(|a, b| a.1.total_cmp(&b.1))
                } else {
                    None
                };

                let Some((partner, partner_fill)) = partner else {
                    continue;
                };
                if partner.show_id == show.show_id {
                    continue;
                }

                let (into_prime, off_prime, into_fill, off_fill) = if is_prime {
                    (partner, *show, partner_fill, fill)
                } else {
                    (*show, partner, fill, partner_fill)
                };

                used.insert(into_prime.show_id.as_str());
                used.insert(off_prime.show_id.as_str());
                debug!(
                    screen_id = %show.screen_id,
                    into_prime = %into_prime.show_id,
                    off_prime = %off_prime.show_id,
                    "计划互换场次"
                );
                actions.push(PlannedAction::Swap {
                    into_prime: into_prime.show_id.clone(),
                    off_prime: off_prime.show_id.clone(),
                    into_prime_end: end_after_move(into_prime, off_prime.show_time, runtimes),
                    off_prime_end: end_after_move(off_prime, into_prime.show_time, runtimes),
                    reason: format!(
                        "预测上座率 {:.2} ({}) ↔ {:.2} ({})",
                        into_fill, into_prime.show_time, off_fill, off_prime.show_time
                    ),
                });
            }
        }

        info!(actions = actions.len(), "调度动作规划完成");
        actions
    }

    fn should_cancel(&self, show: &Show, forecast: &ShowForecast, now: NaiveDateTime) -> bool {
        show.booked_seats == 0
            && show.occupancy() <= 0.0
            && forecast.forecast_demand <= self.policy.dead_demand_threshold
            && show.hours_until_start(now) >= self.policy.cancel_min_lead_hours
    }
}

fn fill_of(show: &Show, forecasts: &HashMap<String, ShowForecast>) -> Option<f64> {
    forecasts.get(&show.show_id).map(|f| f.fill_ratio)
}

fn swappable(show: &Show, used: &HashSet<&str>) -> bool {
    show.booked_seats == 0 && !used.contains(show.show_id.as_str())
}

/// 移到新开场时间后的散场时间：优先按片长，缺失时保留原时长
fn end_after_move(show: &Show, new_start: NaiveTime, runtimes: &HashMap<String, u32>) -> NaiveTime {
    match runtimes.get(&show.movie_id) {
        Some(runtime) => compute_end_time(new_start, *runtime),
        None => {
            let mut duration = show.end_time - show.show_time;
            if duration < chrono::Duration::zero() {
                duration = duration + chrono::Duration::days(1);
            }
            let (end, _) = new_start.overflowing_add_signed(duration);
            end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ShowStatus, SlotBucket};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn show(id: &str, movie: &str, h: u32, booked: u32) -> Show {
        Show {
            show_id: id.to_string(),
            movie_id: movie.to_string(),
            screen_id: "S1".to_string(),
            show_date: date(),
            show_time: t(h, 0),
            end_time: t(h + 2, 0),
            status: ShowStatus::Upcoming,
            capacity: 100,
            booked_seats: booked,
        }
    }

    fn forecast(show: &Show, demand: f64) -> ShowForecast {
        ShowForecast {
            show_id: show.show_id.clone(),
            movie_id: show.movie_id.clone(),
            screen_id: show.screen_id.clone(),
            date: show.show_date,
            slot: SlotBucket::nearest(show.show_time),
            forecast_demand: demand,
            capacity: show.capacity,
            fill_ratio: demand / show.capacity as f64,
            confidence: 0.6,
        }
    }

    fn forecasts(pairs: &[(&Show, f64)]) -> HashMap<String, ShowForecast> {
        pairs
            .iter()
            .map(|(s, d)| (s.show_id.clone(), forecast(s, *d)))
            .collect()
    }

    #[test]
    fn test_cancel_respects_grace_window() {
        let rescheduler = Rescheduler::new(ReschedulePolicy::default());
        let evening = show("E", "M1", 19, 0);
        let fc = forecasts(&[(&evening, 1.0)]);

        // 11 小时前 → 取消
        let early = date().and_hms_opt(8, 0, 0).unwrap();
        let actions = rescheduler.plan(&[evening.clone()], &fc, &HashMap::new(), early);
        assert!(matches!(actions.as_slice(), [PlannedAction::Cancel { show_id, .. }] if show_id == "E"));

        // 3 小时前 → 不取消
        let late = date().and_hms_opt(16, 0, 0).unwrap();
        let actions = rescheduler.plan(&[evening], &fc, &HashMap::new(), late);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_booked_show_is_never_cancelled() {
        let rescheduler = Rescheduler::new(ReschedulePolicy::default());
        let booked = show("B", "M1", 19, 1);
        let fc = forecasts(&[(&booked, 0.5)]);
        let now = date().and_hms_opt(0, 0, 0).unwrap();
        assert!(rescheduler.plan(&[booked], &fc, &HashMap::new(), now).is_empty());
    }

    #[test]
    fn test_promote_into_prime() {
        let rescheduler = Rescheduler::new(ReschedulePolicy::default());
        let hot = show("HOT", "M1", 13, 0);
        let weak_prime = show("WEAK", "M2", 19, 0);
        let fc = forecasts(&[(&hot, 70.0), (&weak_prime, 30.0)]);
        let runtimes: HashMap<String, u32> =
            [("M1".to_string(), 150), ("M2".to_string(), 90)].into_iter().collect();
        let now = date().and_hms_opt(0, 0, 0).unwrap();

        let actions = rescheduler.plan(&[hot, weak_prime], &fc, &runtimes, now);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            PlannedAction::Swap {
                into_prime,
                off_prime,
                into_prime_end,
                off_prime_end,
                ..
            } => {
                assert_eq!(into_prime, "HOT");
                assert_eq!(off_prime, "WEAK");
                assert_eq!(*into_prime_end, t(21, 30));
                assert_eq!(*off_prime_end, t(14, 30));
            }
            other => panic!("unexpected action {:?}", other),
        }
        let reported = actions[0].to_actions();
        assert_eq!(reported[0].action, RescheduleActionType::SwappedIntoPrime);
        assert_eq!(reported[1].action, RescheduleActionType::SwappedOffPrime);
    }

    #[test]
    fn test_demote_off_prime() {
        let rescheduler = Rescheduler::new(ReschedulePolicy::default());
        let dull_prime = show("DULL", "M1", 19, 0);
        let ok_morning = show("OK", "M2", 10, 0);
        let better_afternoon = show("BETTER", "M3", 13, 0);
        let fc = forecasts(&[(&dull_prime, 10.0), (&ok_morning, 30.0), (&better_afternoon, 45.0)]);
        let now = date().and_hms_opt(0, 0, 0).unwrap();

        let actions = rescheduler.plan(
            &[dull_prime, ok_morning, better_afternoon],
            &fc,
            &HashMap::new(),
            now,
        );
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            &actions[0],
            PlannedAction::Swap { into_prime, off_prime, .. } if into_prime == "BETTER" && off_prime == "DULL"
        ));
    }

    #[test]
    fn test_each_show_in_at_most_one_action() {
        let rescheduler = Rescheduler::new(ReschedulePolicy::default());
        let a = show("A", "M1", 10, 0);
        let b = show("B", "M2", 13, 0);
        let prime = show("P", "M3", 19, 0);
        let fc = forecasts(&[(&a, 80.0), (&b, 75.0), (&prime, 5.0)]);
        let now = date().and_hms_opt(0, 0, 0).unwrap();

        let actions = rescheduler.plan(&[a, b, prime], &fc, &HashMap::new(), now);
        let mut seen = HashSet::new();
        for action in &actions {
            for id in action.show_ids() {
                assert!(seen.insert(id.to_string()), "show {} used twice", id);
            }
        }
        assert_eq!(actions.len(), 1);
    }
}
