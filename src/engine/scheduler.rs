// ==========================================
// 影院经营决策系统 - 排片引擎
// ==========================================
// 职责: 为单影厅单日的空闲时段分配影片
// 规则:
// - 候选时段 = 营业窗口内按 (单场时长 + 清场间隔) 步进
// - 配额 = clamp(round(需求占比 × 空闲时段数), 1, 单片单日上限)
// - 黄金时段优先: 取 剩余配额 × 需求 最大者（同分按影片ID）
// - 非黄金时段: 按需求降序轮转
// 红线: 有售票的保留场次不动，其占用时段不再分配
// ==========================================

use crate::config::SchedulerPolicy;
use crate::domain::catalog::{compute_end_time, Movie, Show};
use crate::domain::schedule::ScheduleAssignment;
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// 候选开场时段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSlot {
    /// 距营业日零点分钟数（可超过 1440 表示次日凌晨）
    pub start_minute: u32,
    pub time: NaiveTime,
    pub is_prime: bool,
}

/// 参与排片的影片及其当日需求
#[derive(Debug, Clone)]
pub struct FilmDemand {
    pub movie: Movie,
    pub demand: f64,
}

/// 单影厅单日排片结果
#[derive(Debug, Clone, Default)]
pub struct ScreenDayPlan {
    pub assignments: Vec<ScheduleAssignment>,
    /// 被保留场次占用的候选时段数
    pub blocked_slots: usize,
    /// 配额耗尽后留空的时段数
    pub idle_slots: usize,
}

pub struct Scheduler {
    policy: SchedulerPolicy,
}

impl Scheduler {
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self { policy }
    }

    /// 营业窗口内的全部候选时段
    pub fn candidate_slots(&self) -> Vec<CandidateSlot> {
        let step = (self.policy.block_minutes + self.policy.cleaning_buffer_minutes).max(1);
        let mut slots = Vec::new();
        let mut start = self.policy.open_minute;
        while start + self.policy.block_minutes <= self.policy.close_minute {
            let wrapped = start % MINUTES_PER_DAY;
            let time = NaiveTime::from_hms_opt(wrapped / 60, wrapped % 60, 0).unwrap_or(NaiveTime::MIN);
            slots.push(CandidateSlot {
                start_minute: start,
                time,
                is_prime: start >= self.policy.prime_start_minute,
            });
            start += step;
        }
        slots
    }

    /// 每日可排场次数（物理容量计算用）
    pub fn slots_per_day(&self) -> usize {
        self.candidate_slots().len()
    }

    /// 单影厅单日排片
    ///
    /// # 参数
    /// - screen_id / date: 目标影厅与日期
    /// - films: 参与排片的影片及当日需求
    /// - kept: 该影厅当日保留的已售票场次
    ///
    /// # 返回
    /// 排片结果（尚未写库）
    #[instrument(skip(self, films, kept), fields(films = films.len(), kept = kept.len()))]
    pub fn plan_screen_day(
        &self,
        screen_id: &str,
        date: NaiveDate,
        films: &[FilmDemand],
        kept: &[Show],
    ) -> ScreenDayPlan {
        let mut plan = ScreenDayPlan::default();

        let free: Vec<CandidateSlot> = self
            .candidate_slots()
            .into_iter()
            .filter(|slot| {
                let blocked = kept.iter().any(|show| self.overlaps(slot, show));
                if blocked {
                    plan.blocked_slots += 1;
                }
                !blocked
            })
            .collect();

        if free.is_empty() || films.is_empty() {
            plan.idle_slots = free.len();
            return plan;
        }

        let mut remaining = self.quotas(films, kept, free.len());

        // 黄金时段优先
        for slot in free.iter().filter(|s| s.is_prime) {
            let pick = films
                .iter()
                .filter(|f| remaining.get(f.movie.movie_id.as_str()).copied().unwrap_or(0) > 0)
                .max_by(|a, b| {
                    let sa = remaining[a.movie.movie_id.as_str()] as f64 * a.demand;
                    let sb = remaining[b.movie.movie_id.as_str()] as f64 * b.demand;
                    sa.total_cmp(&sb).then_with(|| b.movie.movie_id.cmp(&a.movie.movie_id))
                });
            match pick {
                Some(film) => {
                    self.assign(&mut plan, &mut remaining, screen_id, date, slot, &film.movie)
                }
                None => plan.idle_slots += 1,
            }
        }

        // 非黄金时段轮转
        let mut order: Vec<&FilmDemand> = films.iter().collect();
        order.sort_by(|a, b| {
            b.demand
                .total_cmp(&a.demand)
                .then_with(|| a.movie.movie_id.cmp(&b.movie.movie_id))
        });
        let mut cursor = 0usize;
        for slot in free.iter().filter(|s| !s.is_prime) {
            let mut picked = None;
            for step in 0..order.len() {
                let film = order[(cursor + step) % order.len()];
                if remaining.get(film.movie.movie_id.as_str()).copied().unwrap_or(0) > 0 {
                    picked = Some(film);
                    cursor = (cursor + step + 1) % order.len();
                    break;
                }
            }
            match picked {
                Some(film) => {
                    self.assign(&mut plan, &mut remaining, screen_id, date, slot, &film.movie)
                }
                None => plan.idle_slots += 1,
            }
        }

        plan.assignments.sort_by_key(|a| a.time);
        debug!(
            screen_id = %screen_id,
            date = %date,
            assigned = plan.assignments.len(),
            blocked = plan.blocked_slots,
            idle = plan.idle_slots,
            "影厅排片完成"
        );
        plan
    }

    /// 各影片剩余配额（已扣除保留场次）
    fn quotas<'a>(
        &self,
        films: &'a [FilmDemand],
        kept: &[Show],
        free_slots: usize,
    ) -> HashMap<&'a str, u32> {
        let cap = self.policy.max_shows_per_film_per_day.max(1);
        let total: f64 = films.iter().map(|f| f.demand.max(0.0)).sum();
        films
            .iter()
            .map(|f| {
                let share = if total > 0.0 {
                    f.demand.max(0.0) / total
                } else {
                    1.0 / films.len() as f64
                };
                let quota = ((share * free_slots as f64).round() as u32).clamp(1, cap);
                let already = kept.iter().filter(|s| s.movie_id == f.movie.movie_id).count() as u32;
                (f.movie.movie_id.as_str(), quota.saturating_sub(already))
            })
            .collect()
    }

    fn assign(
        &self,
        plan: &mut ScreenDayPlan,
        remaining: &mut HashMap<&str, u32>,
        screen_id: &str,
        date: NaiveDate,
        slot: &CandidateSlot,
        movie: &Movie,
    ) {
        if let Some(left) = remaining.get_mut(movie.movie_id.as_str()) {
            *left = left.saturating_sub(1);
        }
        plan.assignments.push(ScheduleAssignment {
            show_id: Uuid::new_v4().to_string(),
            screen_id: screen_id.to_string(),
            movie_id: movie.movie_id.clone(),
            date,
            time: slot.time,
            end_time: compute_end_time(slot.time, movie.runtime_minutes),
            is_prime: slot.is_prime,
        });
    }

    /// 候选时段是否与保留场次重叠
    fn overlaps(&self, slot: &CandidateSlot, show: &Show) -> bool {
        let mut start = show.show_time.hour() * 60 + show.show_time.minute();
        if start < self.policy.open_minute {
            start += MINUTES_PER_DAY;
        }
        let mut end = show.end_time.hour() * 60 + show.end_time.minute();
        while end <= start {
            end += MINUTES_PER_DAY;
        }
        let slot_end = slot.start_minute + self.policy.block_minutes;
        slot.start_minute < end && start < slot_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ShowStatus;

    fn movie(id: &str, runtime: u32) -> Movie {
        Movie {
            movie_id: id.to_string(),
            title: format!("Film {}", id),
            runtime_minutes: runtime,
            is_active: true,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_candidate_slots_default_window() {
        let scheduler = Scheduler::new(SchedulerPolicy::default());
        let slots = scheduler.candidate_slots();
        let times: Vec<NaiveTime> = slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![t(10, 0), t(13, 0), t(16, 0), t(19, 0), t(22, 0)]);
        let prime: Vec<bool> = slots.iter().map(|s| s.is_prime).collect();
        assert_eq!(prime, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_prime_goes_to_strongest_film() {
        let scheduler = Scheduler::new(SchedulerPolicy::default());
        let films = vec![
            FilmDemand { movie: movie("A", 120), demand: 300.0 },
            FilmDemand { movie: movie("B", 100), demand: 100.0 },
        ];
        let plan = scheduler.plan_screen_day("S1", date(), &films, &[]);
        // 配额 A=3, B=1，剩余一个时段留空
        assert_eq!(plan.assignments.len(), 4);
        assert_eq!(plan.idle_slots, 1);
        let at_19 = plan.assignments.iter().find(|a| a.time == t(19, 0)).unwrap();
        assert_eq!(at_19.movie_id, "A");
        assert!(at_19.is_prime);
        assert_eq!(at_19.end_time, t(21, 0));
    }

    #[test]
    fn test_film_cap_is_respected() {
        let policy = SchedulerPolicy {
            max_shows_per_film_per_day: 2,
            ..SchedulerPolicy::default()
        };
        let scheduler = Scheduler::new(policy);
        let films = vec![FilmDemand { movie: movie("A", 120), demand: 500.0 }];
        let plan = scheduler.plan_screen_day("S1", date(), &films, &[]);
        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.idle_slots, 3);
        assert!(plan.assignments.iter().all(|a| a.is_prime));
    }

    #[test]
    fn test_every_film_gets_at_least_one_show() {
        let scheduler = Scheduler::new(SchedulerPolicy::default());
        let films = vec![
            FilmDemand { movie: movie("A", 120), demand: 1000.0 },
            FilmDemand { movie: movie("B", 120), demand: 1.0 },
        ];
        let plan = scheduler.plan_screen_day("S1", date(), &films, &[]);
        assert!(plan.assignments.iter().any(|a| a.movie_id == "B"));
        assert!(plan.assignments.iter().filter(|a| a.movie_id == "A").count() <= 3);
    }

    #[test]
    fn test_kept_show_blocks_slot_and_counts_toward_cap() {
        let scheduler = Scheduler::new(SchedulerPolicy::default());
        let kept = Show {
            show_id: "KEEP".to_string(),
            movie_id: "A".to_string(),
            screen_id: "S1".to_string(),
            show_date: date(),
            show_time: t(19, 0),
            end_time: t(21, 0),
            status: ShowStatus::Upcoming,
            capacity: 100,
            booked_seats: 4,
        };
        let films = vec![FilmDemand { movie: movie("A", 120), demand: 500.0 }];
        let plan = scheduler.plan_screen_day("S1", date(), &films, &[kept]);
        assert_eq!(plan.blocked_slots, 1);
        assert!(plan.assignments.iter().all(|a| a.time != t(19, 0)));
        // 上限 3，保留场次已占 1
        assert_eq!(plan.assignments.len(), 2);
    }

    #[test]
    fn test_no_duplicate_slots_per_screen() {
        let scheduler = Scheduler::new(SchedulerPolicy::default());
        let films = vec![
            FilmDemand { movie: movie("A", 120), demand: 50.0 },
            FilmDemand { movie: movie("B", 120), demand: 50.0 },
            FilmDemand { movie: movie("C", 120), demand: 50.0 },
        ];
        let plan = scheduler.plan_screen_day("S1", date(), &films, &[]);
        let mut times: Vec<NaiveTime> = plan.assignments.iter().map(|a| a.time).collect();
        let before = times.len();
        times.dedup();
        assert_eq!(before, times.len());
    }
}
