// ==========================================
// 影院经营决策系统 - 领域类型定义
// ==========================================
// 职责: 枚举型领域值 (意图/预测方法/时段桶/场次状态/调度动作/质量等级)
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 调用意图 (Intent)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Scheduling, // 排片
    Pricing,    // 调价
    Optimize,   // 存量场次优化
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Scheduling => "scheduling",
            Intent::Pricing => "pricing",
            Intent::Optimize => "optimize",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduling" | "schedule" => Ok(Intent::Scheduling),
            "pricing" | "price" => Ok(Intent::Pricing),
            "optimize" | "optimise" => Ok(Intent::Optimize),
            other => Err(format!("未知意图: {}", other)),
        }
    }
}

// ==========================================
// 预测方法 (Forecast Method)
// ==========================================
// 降级阶梯: hybrid/llm_only → statistical → fallback; 无历史 → cold_start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Hybrid,
    LlmOnly,
    Statistical,
    ColdStart,
    Fallback,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::Hybrid => "hybrid",
            ForecastMethod::LlmOnly => "llm_only",
            ForecastMethod::Statistical => "statistical",
            ForecastMethod::ColdStart => "cold_start",
            ForecastMethod::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 时段权重数据质量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Learned,
    LearnedLowVolume,
    Fallback,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Learned => "learned",
            DataQuality::LearnedLowVolume => "learned_low_volume",
            DataQuality::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 时段桶 (Slot Bucket)
// ==========================================
// 所有实际场次时间都归一到以下五个固定桶之一
// Prime / LatePrime 为黄金时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotBucket {
    Morning,   // 10:00
    Afternoon, // 13:00
    Evening,   // 16:00
    Prime,     // 19:00
    LatePrime, // 22:00
}

const MINUTES_PER_DAY: i64 = 24 * 60;

impl SlotBucket {
    pub const ALL: [SlotBucket; 5] = [
        SlotBucket::Morning,
        SlotBucket::Afternoon,
        SlotBucket::Evening,
        SlotBucket::Prime,
        SlotBucket::LatePrime,
    ];

    pub fn index(&self) -> usize {
        match self {
            SlotBucket::Morning => 0,
            SlotBucket::Afternoon => 1,
            SlotBucket::Evening => 2,
            SlotBucket::Prime => 3,
            SlotBucket::LatePrime => 4,
        }
    }

    /// 桶起始时间（距零点分钟数）
    pub fn start_minute(&self) -> u32 {
        match self {
            SlotBucket::Morning => 10 * 60,
            SlotBucket::Afternoon => 13 * 60,
            SlotBucket::Evening => 16 * 60,
            SlotBucket::Prime => 19 * 60,
            SlotBucket::LatePrime => 22 * 60,
        }
    }

    pub fn start_time(&self) -> NaiveTime {
        let m = self.start_minute();
        NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn is_prime(&self) -> bool {
        matches!(self, SlotBucket::Prime | SlotBucket::LatePrime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotBucket::Morning => "morning",
            SlotBucket::Afternoon => "afternoon",
            SlotBucket::Evening => "evening",
            SlotBucket::Prime => "prime",
            SlotBucket::LatePrime => "late_prime",
        }
    }

    /// 将任意场次时间归一到最近的时段桶
    ///
    /// 距离按环形分钟差计算（00:15 视为接近 22:00 而非 10:00），
    /// 距离相同时取较早的桶。
    pub fn nearest(time: NaiveTime) -> SlotBucket {
        let minute = (time.hour() * 60 + time.minute()) as i64;
        let mut best = SlotBucket::Morning;
        let mut best_dist = i64::MAX;
        for bucket in Self::ALL {
            let raw = (minute - bucket.start_minute() as i64).abs();
            let dist = raw.min(MINUTES_PER_DAY - raw);
            if dist < best_dist {
                best = bucket;
                best_dist = dist;
            }
        }
        best
    }
}

impl fmt::Display for SlotBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SlotBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(SlotBucket::Morning),
            "afternoon" => Ok(SlotBucket::Afternoon),
            "evening" => Ok(SlotBucket::Evening),
            "prime" => Ok(SlotBucket::Prime),
            "late_prime" => Ok(SlotBucket::LatePrime),
            other => Err(format!("未知时段桶: {}", other)),
        }
    }
}

// ==========================================
// 场次状态 (Show Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl ShowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowStatus::Upcoming => "upcoming",
            ShowStatus::Completed => "completed",
            ShowStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ShowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(ShowStatus::Upcoming),
            "completed" => Ok(ShowStatus::Completed),
            "cancelled" => Ok(ShowStatus::Cancelled),
            other => Err(format!("未知场次状态: {}", other)),
        }
    }
}

// ==========================================
// 调度动作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleActionType {
    Cancelled,
    SwappedIntoPrime,
    SwappedOffPrime,
}

impl RescheduleActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescheduleActionType::Cancelled => "cancelled",
            RescheduleActionType::SwappedIntoPrime => "swapped_into_prime",
            RescheduleActionType::SwappedOffPrime => "swapped_off_prime",
        }
    }
}

impl fmt::Display for RescheduleActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 预测质量等级 (复盘五档)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl QualityLevel {
    /// 按平均误差分档
    pub fn from_mean_error(mean_error: f64) -> QualityLevel {
        if mean_error < 0.10 {
            QualityLevel::Excellent
        } else if mean_error < 0.20 {
            QualityLevel::Good
        } else if mean_error < 0.35 {
            QualityLevel::Fair
        } else if mean_error < 0.50 {
            QualityLevel::Poor
        } else {
            QualityLevel::Critical
        }
    }

    /// 五档评分 (5 = 最好)
    pub fn score(&self) -> u8 {
        match self {
            QualityLevel::Excellent => 5,
            QualityLevel::Good => 4,
            QualityLevel::Fair => 3,
            QualityLevel::Poor => 2,
            QualityLevel::Critical => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
            QualityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
