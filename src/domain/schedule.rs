// ==========================================
// 影院经营决策系统 - 排片/调度/调价领域模型
// ==========================================

use crate::domain::types::RescheduleActionType;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleAssignment - 排片结果
// ==========================================
// 红线: 同一影厅同一日不可重复占用同一时段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    pub show_id: String,
    pub screen_id: String,
    pub movie_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_prime: bool,
}

// ==========================================
// RescheduleAction - 场次调度动作
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleAction {
    pub show_id: String,
    pub action: RescheduleActionType,
    pub with_show_id: Option<String>,
    pub reason: String,
}

// ==========================================
// PricingUpdate - 调价记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingUpdate {
    pub show_id: String,
    pub category_id: String,
    pub old_price: f64,
    pub new_price: f64,
}
