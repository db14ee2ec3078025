// ==========================================
// 影院经营决策系统 - 影片/影厅/场次领域模型
// ==========================================
// 说明: 基础档案由外部系统维护，此处只定义决策链路读写所需字段
// ==========================================

use crate::domain::types::{ShowStatus, SlotBucket};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Movie - 影片
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub movie_id: String,
    pub title: String,
    pub runtime_minutes: u32,
    pub is_active: bool,
}

// ==========================================
// Screen - 影厅
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub screen_id: String,
    pub name: String,
    pub seat_capacity: u32, // 可售座位数
    pub is_available: bool,
}

// ==========================================
// Show - 场次
// ==========================================
// 约束: (screen_id, show_date, show_time) 唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub show_id: String,
    pub movie_id: String,
    pub screen_id: String,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ShowStatus,

    // ===== 关联统计 (查询时 JOIN 得出) =====
    pub capacity: u32,     // 影厅座位数
    pub booked_seats: u32, // 已售座位数
}

impl Show {
    /// 当前上座率
    pub fn occupancy(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.booked_seats as f64 / self.capacity as f64
    }

    /// 场次所属时段桶
    pub fn bucket(&self) -> SlotBucket {
        SlotBucket::nearest(self.show_time)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.show_date.and_time(self.show_time)
    }

    /// 距开场小时数（已开场为负数）
    pub fn hours_until_start(&self, now: NaiveDateTime) -> f64 {
        (self.starts_at() - now).num_minutes() as f64 / 60.0
    }
}

/// 由开场时间与片长推算散场时间（跨零点自动回绕）
pub fn compute_end_time(start: NaiveTime, runtime_minutes: u32) -> NaiveTime {
    let (end, _) = start.overflowing_add_signed(Duration::minutes(runtime_minutes as i64));
    end
}

// ==========================================
// SeatCategory - 座位档位
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatCategory {
    pub category_id: String,
    pub screen_id: String,
    pub name: String,
    pub base_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_end_time_wraps_midnight() {
        let start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        assert_eq!(
            compute_end_time(start, 150),
            NaiveTime::from_hms_opt(0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_hours_until_start() {
        let show = Show {
            show_id: "S1".to_string(),
            movie_id: "M1".to_string(),
            screen_id: "SCR1".to_string(),
            show_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            show_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            status: ShowStatus::Upcoming,
            capacity: 100,
            booked_seats: 25,
        };
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(show.hours_until_start(now), 11.0);
        assert_eq!(show.occupancy(), 0.25);
        assert_eq!(show.bucket(), SlotBucket::Prime);
    }
}
