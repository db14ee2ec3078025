// ==========================================
// 影院经营决策系统 - 热度与节假日信号
// ==========================================
// 存储: config_kv (scope=global)
//   buzz/{movie_id}       热度分 [0, 1]，缺省 0.5（中性）
//   holiday/{YYYY-MM-DD}  需求系数 [0.5, 3.0]，缺省 1.0（非节假日）
// ==========================================

use crate::config::config_manager::{config_keys, ConfigManager};
use crate::signals::error::SignalResult;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

pub const NEUTRAL_BUZZ: f64 = 0.5;
pub const NEUTRAL_HOLIDAY_BOOST: f64 = 1.0;

/// 影片热度信号
pub trait TrendSignalProvider: Send + Sync {
    /// 返回 [0, 1] 热度分
    fn buzz(&self, movie_id: &str) -> SignalResult<f64>;
}

/// 节假日日历
pub trait HolidayCalendar: Send + Sync {
    /// 返回日期的需求系数（1.0 = 普通日）
    fn boost(&self, date: NaiveDate) -> SignalResult<f64>;

    /// 批量查询；单日失败按中性处理
    fn boosts(&self, dates: &[NaiveDate]) -> HashMap<NaiveDate, f64> {
        dates
            .iter()
            .map(|d| {
                let boost = self.boost(*d).unwrap_or_else(|e| {
                    tracing::warn!(date = %d, error = %e, "节假日信号读取失败，按普通日处理");
                    NEUTRAL_HOLIDAY_BOOST
                });
                (*d, boost)
            })
            .collect()
    }
}

// ==========================================
// ConfigSignalStore - 基于 config_kv 的信号源
// ==========================================
pub struct ConfigSignalStore {
    config: Arc<ConfigManager>,
}

impl ConfigSignalStore {
    pub fn new(config: Arc<ConfigManager>) -> Self {
        Self { config }
    }

    fn read_f64(&self, key: &str) -> SignalResult<Option<f64>> {
        let raw = self.config.get_global_config_value(key)?;
        Ok(raw.and_then(|s| {
            let parsed = s.trim().parse::<f64>().ok().filter(|v| v.is_finite());
            if parsed.is_none() {
                tracing::warn!(config_key = key, raw_value = %s, "信号值格式错误，忽略");
            }
            parsed
        }))
    }
}

impl TrendSignalProvider for ConfigSignalStore {
    fn buzz(&self, movie_id: &str) -> SignalResult<f64> {
        let key = format!("{}{}", config_keys::BUZZ_PREFIX, movie_id);
        Ok(self
            .read_f64(&key)?
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(NEUTRAL_BUZZ))
    }
}

impl HolidayCalendar for ConfigSignalStore {
    fn boost(&self, date: NaiveDate) -> SignalResult<f64> {
        let key = format!("{}{}", config_keys::HOLIDAY_PREFIX, date.format("%Y-%m-%d"));
        Ok(self
            .read_f64(&key)?
            .map(|v| v.clamp(0.5, 3.0))
            .unwrap_or(NEUTRAL_HOLIDAY_BOOST))
    }
}
