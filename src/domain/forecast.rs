// ==========================================
// 影院经营决策系统 - 需求预测领域模型
// ==========================================
// 层级: 日级 (DemandForecast) → 时段级 (SlotForecast) → 场次级 (ShowForecast)
// 红线: 同一 (影片, 日期) 的时段需求之和 = 日级需求
// 红线: 同一 (影片, 日期, 时段) 的场次需求之和 = 时段需求
// ==========================================

use crate::domain::types::{DataQuality, ForecastMethod, SlotBucket};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// 历史输入
// ==========================================

/// 单日售票量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBookings {
    pub date: NaiveDate,
    pub bookings: u32,
}

/// 单片售票历史（按日期升序）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingHistory {
    pub movie_id: String,
    pub days: Vec<DailyBookings>,
}

impl BookingHistory {
    pub fn counts(&self) -> Vec<f64> {
        self.days.iter().map(|d| d.bookings as f64).collect()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.days.iter().map(|d| d.bookings as f64).sum()
    }
}

/// 单个已完成场次的售票明细
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletedShowStat {
    pub date: NaiveDate,
    pub time: chrono::NaiveTime,
    pub bookings: u32,
}

/// 已完成场次按 (星期, 时段桶) 聚合的历史
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotHistoryRow {
    /// 0 = 周一 … 6 = 周日
    pub weekday: u32,
    pub slot: SlotBucket,
    pub show_count: u32,
    pub bookings: u32,
}

// ==========================================
// DemandForecast - 日级需求预测
// ==========================================
// 生命周期: 每次预测运行生成一次，之后不可变，下次运行整体替换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    pub movie_id: String,
    pub date: NaiveDate,
    pub movie_day_demand: f64, // [0, 0.95 × 物理日容量]
    pub velocity: f64,         // [0.70, 1.30]
    pub market_pressure: f64,  // [0.15, 0.75]
    pub confidence: f64,       // [0.35, 0.95]
    pub forecast_method: ForecastMethod,
    pub prediction_lower: Option<f64>,
    pub prediction_upper: Option<f64>,
}

// ==========================================
// SlotForecast - 时段级需求预测
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotForecast {
    pub movie_id: String,
    pub date: NaiveDate,
    pub slot: SlotBucket,
    pub slot_expected_demand: f64,
    pub slot_weight: f64,  // 黄金时段加权后的原始权重
    pub demand_share: f64, // 归一化后占比，同片同日求和为 1
    pub is_prime_slot: bool,
    pub data_quality: DataQuality,
    pub confidence: f64,
}

// ==========================================
// ShowForecast - 场次级需求预测
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowForecast {
    pub show_id: String,
    pub movie_id: String,
    pub screen_id: String,
    pub date: NaiveDate,
    pub slot: SlotBucket,
    pub forecast_demand: f64,
    pub capacity: u32,
    pub fill_ratio: f64,
    pub confidence: f64,
}

// ==========================================
// 复盘相关
// ==========================================

/// 预测日志（场次级），复盘时回填实际售票
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastLogEntry {
    pub log_id: i64,
    pub run_id: String,
    pub show_id: String,
    pub movie_id: String,
    pub show_date: NaiveDate,
    pub forecast_demand: f64,
    pub actual_bookings: Option<u32>,
}

/// 单条预测复盘结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedForecast {
    pub show_id: String,
    pub movie_id: String,
    pub forecast_demand: f64,
    pub actual_bookings: u32,
    pub error: f64,
    pub correction_factor: f64,
}

/// 影片校正系数（开环：仅持久化供下次预测参考）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub movie_id: String,
    pub correction_factor: f64, // [0.7, 1.3]
    pub sample_count: usize,
}
