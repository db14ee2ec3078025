// ==========================================
// 影院经营决策系统 - 配置管理 API
// ==========================================
// 职责: 参数覆写、热度/节假日信号维护、当前参数快照
// 存储: config_kv (scope=global)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::PipelinePolicy;

/// 可覆写的参数键
const POLICY_KEYS: &[&str] = &[
    config_keys::FORECAST_LOOKBACK_DAYS,
    config_keys::FORECAST_MIN_HISTORY,
    config_keys::FORECAST_MODEL_ENABLED,
    config_keys::FORECAST_MAX_MODEL_WEIGHT,
    config_keys::FORECAST_TRIM_RATIO,
    config_keys::FORECAST_DAY_FACTORS,
    config_keys::SLOT_MIN_SAMPLES,
    config_keys::SLOT_PRIME_MULTIPLIER,
    config_keys::SLOT_WEEKEND_MULTIPLIER,
    config_keys::SCHEDULER_OPEN_MINUTE,
    config_keys::SCHEDULER_CLOSE_MINUTE,
    config_keys::SCHEDULER_BLOCK_MINUTES,
    config_keys::SCHEDULER_BUFFER_MINUTES,
    config_keys::SCHEDULER_MAX_SHOWS_PER_FILM,
    config_keys::RESCHEDULE_DEAD_DEMAND,
    config_keys::RESCHEDULE_GRACE_HOURS,
    config_keys::RESCHEDULE_PROMOTE_FILL,
    config_keys::RESCHEDULE_DEMOTE_FILL,
    config_keys::PRICING_SMOOTHING,
    config_keys::PRICING_MIN_RATIO,
    config_keys::PRICING_MAX_RATIO,
    config_keys::PRICING_DENOMINATION,
    config_keys::APPROVAL_THRESHOLD,
];

/// 配置项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}

// ==========================================
// ConfigApi - 配置管理 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询配置（按前缀过滤，键有序）
    pub fn list_configs(&self, prefix: Option<&str>) -> ApiResult<Vec<ConfigItem>> {
        let prefix = prefix.unwrap_or("");
        let mut items: Vec<ConfigItem> = self
            .config_manager
            .list_by_prefix(prefix)?
            .into_iter()
            .map(|(key, value)| ConfigItem {
                key: format!("{}{}", prefix, key),
                value,
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    /// 查询单个配置
    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.config_manager.get_global_config_value(key.trim())?)
    }

    /// 更新参数覆写
    ///
    /// # 参数
    /// - key: 参数键（如 `pricing.denomination`）
    /// - value: 原始字符串值
    ///
    /// # 返回
    /// - Err(InvalidInput): 未知键或值无法解析
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(ApiError::InvalidInput("配置键不能为空".to_string()));
        }
        if !POLICY_KEYS.contains(&key) {
            return Err(ApiError::InvalidInput(format!("未知配置键: {}", key)));
        }
        validate_policy_value(key, value)?;

        self.config_manager.set_global_config_value(key, value)?;
        info!(config_key = key, value = value, "参数覆写已更新");
        Ok(())
    }

    /// 设置影片热度 [0, 1]
    pub fn set_buzz(&self, movie_id: &str, score: f64) -> ApiResult<()> {
        let movie_id = movie_id.trim();
        if movie_id.is_empty() {
            return Err(ApiError::InvalidInput("影片ID不能为空".to_string()));
        }
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ApiError::InvalidInput(format!(
                "热度分必须在 [0, 1] 之间: {}",
                score
            )));
        }

        let key = format!("{}{}", config_keys::BUZZ_PREFIX, movie_id);
        self.config_manager
            .set_global_config_value(&key, &score.to_string())?;
        info!(movie_id = movie_id, score = score, "影片热度已更新");
        Ok(())
    }

    /// 设置节假日需求系数 [0.5, 3.0]
    pub fn set_holiday(&self, date: &str, boost: f64) -> ApiResult<()> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| ApiError::InvalidInput(format!("日期格式错误(YYYY-MM-DD): {}", date)))?;
        if !boost.is_finite() || !(0.5..=3.0).contains(&boost) {
            return Err(ApiError::InvalidInput(format!(
                "节假日系数必须在 [0.5, 3.0] 之间: {}",
                boost
            )));
        }

        let key = format!("{}{}", config_keys::HOLIDAY_PREFIX, date.format("%Y-%m-%d"));
        self.config_manager
            .set_global_config_value(&key, &boost.to_string())?;
        info!(date = %date, boost = boost, "节假日系数已更新");
        Ok(())
    }

    /// 当前生效的全链路参数（默认值 + 覆写）
    pub fn current_policy(&self) -> ApiResult<PipelinePolicy> {
        Ok(self.config_manager.load_policy()?)
    }
}

fn validate_policy_value(key: &str, value: &str) -> ApiResult<()> {
    let invalid = || ApiError::InvalidInput(format!("配置值格式错误: {}={}", key, value));

    match key {
        config_keys::FORECAST_MODEL_ENABLED => {
            let v = value.to_lowercase();
            if matches!(v.as_str(), "1" | "0" | "true" | "false" | "yes" | "no" | "on" | "off") {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        config_keys::FORECAST_DAY_FACTORS => {
            let factors: Vec<f64> = value
                .split(',')
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?;
            if factors.len() == 7 && factors.iter().all(|f| f.is_finite() && *f > 0.0) {
                Ok(())
            } else {
                Err(invalid())
            }
        }
        config_keys::FORECAST_LOOKBACK_DAYS
        | config_keys::FORECAST_MIN_HISTORY
        | config_keys::SLOT_MIN_SAMPLES
        | config_keys::SCHEDULER_OPEN_MINUTE
        | config_keys::SCHEDULER_CLOSE_MINUTE
        | config_keys::SCHEDULER_BLOCK_MINUTES
        | config_keys::SCHEDULER_BUFFER_MINUTES
        | config_keys::SCHEDULER_MAX_SHOWS_PER_FILM => {
            value.parse::<u32>().map(|_| ()).map_err(|_| invalid())
        }
        _ => match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(()),
            _ => Err(invalid()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn api() -> ConfigApi {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        ConfigApi::new(Arc::new(ConfigManager::from_connection(Arc::new(
            Mutex::new(conn),
        ))))
    }

    #[test]
    fn test_update_config_flows_into_policy() {
        let api = api();
        api.update_config(config_keys::PRICING_DENOMINATION, "10").unwrap();
        api.update_config(config_keys::APPROVAL_THRESHOLD, "0.5").unwrap();

        let policy = api.current_policy().unwrap();
        assert_eq!(policy.pricing.denomination, 10.0);
        assert_eq!(policy.approval.threshold, 0.5);
    }

    #[test]
    fn test_update_config_rejects_bad_input() {
        let api = api();
        assert!(matches!(
            api.update_config("pricing.unknown", "1"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.update_config(config_keys::SCHEDULER_OPEN_MINUTE, "9:00"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.update_config(config_keys::FORECAST_DAY_FACTORS, "1,1,1"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(api.get_config(config_keys::SCHEDULER_OPEN_MINUTE).unwrap().is_none());
    }

    #[test]
    fn test_signals_are_validated_and_listed() {
        let api = api();
        api.set_buzz("M1", 0.9).unwrap();
        api.set_holiday("2026-10-01", 1.8).unwrap();
        assert!(api.set_buzz("M1", 1.2).is_err());
        assert!(api.set_holiday("10/01/2026", 1.2).is_err());
        assert!(api.set_holiday("2026-10-02", 5.0).is_err());

        let buzz = api.list_configs(Some(config_keys::BUZZ_PREFIX)).unwrap();
        assert_eq!(
            buzz,
            vec![ConfigItem {
                key: "buzz/M1".to_string(),
                value: "0.9".to_string(),
            }]
        );
        assert_eq!(api.list_configs(None).unwrap().len(), 2);
    }
}
