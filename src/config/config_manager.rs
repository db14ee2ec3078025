// ==========================================
// 影院经营决策系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::policy::PipelinePolicy;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 按前缀读取配置（如 `buzz/`、`holiday/`），返回去掉前缀后的键
    pub fn list_by_prefix(&self, prefix: &str) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE ?1 || '%'",
        )?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            if let Some(stripped) = key.strip_prefix(prefix) {
                map.insert(stripped.to_string(), value);
            }
        }
        Ok(map)
    }

    /// 加载全链路参数（缺失或格式错误的键回退默认值）
    pub fn load_policy(&self) -> RepositoryResult<PipelinePolicy> {
        let overrides = self.list_all()?;
        let mut policy = PipelinePolicy::default();

        let f64_of = |key: &str, default: f64| -> f64 {
            match overrides.get(key) {
                Some(raw) => match raw.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => {
                        tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                        default
                    }
                },
                None => default,
            }
        };
        let u32_of = |key: &str, default: u32| -> u32 {
            overrides
                .get(key)
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };
        let bool_of = |key: &str, default: bool| -> bool {
            match overrides.get(key).map(|s| s.trim().to_lowercase()) {
                Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
                Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
                _ => default,
            }
        };

        // ===== 需求预测 =====
        let fp = &mut policy.forecast;
        fp.lookback_days = u32_of(config_keys::FORECAST_LOOKBACK_DAYS, fp.lookback_days);
        fp.min_history_for_model =
            u32_of(config_keys::FORECAST_MIN_HISTORY, fp.min_history_for_model as u32) as usize;
        fp.statistical_model_enabled =
            bool_of(config_keys::FORECAST_MODEL_ENABLED, fp.statistical_model_enabled);
        fp.max_model_weight = f64_of(config_keys::FORECAST_MAX_MODEL_WEIGHT, fp.max_model_weight)
            .clamp(0.0, 1.0);
        fp.trim_ratio = f64_of(config_keys::FORECAST_TRIM_RATIO, fp.trim_ratio).clamp(0.0, 0.45);
        if let Some(raw) = overrides.get(config_keys::FORECAST_DAY_FACTORS) {
            match parse_day_factors(raw) {
                Some(factors) => fp.day_factors = factors,
                None => tracing::warn!(raw_value = %raw, "日系数配置格式错误，使用默认值"),
            }
        }

        // ===== 时段分布 =====
        let sp = &mut policy.slot;
        sp.min_samples = u32_of(config_keys::SLOT_MIN_SAMPLES, sp.min_samples);
        sp.prime_multiplier = f64_of(config_keys::SLOT_PRIME_MULTIPLIER, sp.prime_multiplier).max(1.5);
        sp.weekend_multiplier = f64_of(config_keys::SLOT_WEEKEND_MULTIPLIER, sp.weekend_multiplier);

        // ===== 排片 =====
        let sc = &mut policy.scheduler;
        sc.open_minute = u32_of(config_keys::SCHEDULER_OPEN_MINUTE, sc.open_minute);
        sc.close_minute = u32_of(config_keys::SCHEDULER_CLOSE_MINUTE, sc.close_minute);
        sc.block_minutes = u32_of(config_keys::SCHEDULER_BLOCK_MINUTES, sc.block_minutes).max(1);
        sc.cleaning_buffer_minutes =
            u32_of(config_keys::SCHEDULER_BUFFER_MINUTES, sc.cleaning_buffer_minutes);
        sc.max_shows_per_film_per_day =
            u32_of(config_keys::SCHEDULER_MAX_SHOWS_PER_FILM, sc.max_shows_per_film_per_day).max(1);

        // ===== 存量调度 =====
        let rp = &mut policy.reschedule;
        rp.dead_demand_threshold = f64_of(config_keys::RESCHEDULE_DEAD_DEMAND, rp.dead_demand_threshold);
        rp.cancel_min_lead_hours = f64_of(config_keys::RESCHEDULE_GRACE_HOURS, rp.cancel_min_lead_hours);
        rp.promote_fill_threshold = f64_of(config_keys::RESCHEDULE_PROMOTE_FILL, rp.promote_fill_threshold);
        rp.demote_fill_threshold = f64_of(config_keys::RESCHEDULE_DEMOTE_FILL, rp.demote_fill_threshold);

        // ===== 调价 =====
        let pp = &mut policy.pricing;
        pp.smoothing_weight = f64_of(config_keys::PRICING_SMOOTHING, pp.smoothing_weight).clamp(0.0, 1.0);
        pp.min_ratio = f64_of(config_keys::PRICING_MIN_RATIO, pp.min_ratio);
        pp.max_ratio = f64_of(config_keys::PRICING_MAX_RATIO, pp.max_ratio);
        pp.denomination = f64_of(config_keys::PRICING_DENOMINATION, pp.denomination);
        if pp.max_ratio < pp.min_ratio {
            tracing::warn!(min = pp.min_ratio, max = pp.max_ratio, "调价上下限倒置，恢复默认值");
            pp.min_ratio = 0.8;
            pp.max_ratio = 1.5;
        }

        // ===== 审批 =====
        policy.approval.threshold =
            f64_of(config_keys::APPROVAL_THRESHOLD, policy.approval.threshold).clamp(0.0, 1.0);

        Ok(policy)
    }

    fn list_all(&self) -> RepositoryResult<HashMap<String, String>> {
        self.list_by_prefix("")
    }
}

fn parse_day_factors(raw: &str) -> Option<[f64; 7]> {
    let values: Vec<f64> = raw
        .split(',')
        .filter_map(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    <[f64; 7]>::try_from(values).ok()
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 需求预测
    pub const FORECAST_LOOKBACK_DAYS: &str = "forecast.lookback_days";
    pub const FORECAST_MIN_HISTORY: &str = "forecast.min_history_for_model";
    pub const FORECAST_MODEL_ENABLED: &str = "forecast.statistical_model_enabled";
    pub const FORECAST_MAX_MODEL_WEIGHT: &str = "forecast.max_model_weight";
    pub const FORECAST_TRIM_RATIO: &str = "forecast.trim_ratio";
    pub const FORECAST_DAY_FACTORS: &str = "forecast.day_factors";

    // 时段分布
    pub const SLOT_MIN_SAMPLES: &str = "slot.min_samples";
    pub const SLOT_PRIME_MULTIPLIER: &str = "slot.prime_multiplier";
    pub const SLOT_WEEKEND_MULTIPLIER: &str = "slot.weekend_multiplier";

    // 排片
    pub const SCHEDULER_OPEN_MINUTE: &str = "scheduler.open_minute";
    pub const SCHEDULER_CLOSE_MINUTE: &str = "scheduler.close_minute";
    pub const SCHEDULER_BLOCK_MINUTES: &str = "scheduler.block_minutes";
    pub const SCHEDULER_BUFFER_MINUTES: &str = "scheduler.cleaning_buffer_minutes";
    pub const SCHEDULER_MAX_SHOWS_PER_FILM: &str = "scheduler.max_shows_per_film_per_day";

    // 存量调度
    pub const RESCHEDULE_DEAD_DEMAND: &str = "reschedule.dead_demand_threshold";
    pub const RESCHEDULE_GRACE_HOURS: &str = "reschedule.cancel_min_lead_hours";
    pub const RESCHEDULE_PROMOTE_FILL: &str = "reschedule.promote_fill_threshold";
    pub const RESCHEDULE_DEMOTE_FILL: &str = "reschedule.demote_fill_threshold";

    // 调价
    pub const PRICING_SMOOTHING: &str = "pricing.smoothing_weight";
    pub const PRICING_MIN_RATIO: &str = "pricing.min_ratio";
    pub const PRICING_MAX_RATIO: &str = "pricing.max_ratio";
    pub const PRICING_DENOMINATION: &str = "pricing.denomination";

    // 审批
    pub const APPROVAL_THRESHOLD: &str = "approval.threshold";

    // 外部信号（按前缀存储: buzz/{movie_id}、holiday/{YYYY-MM-DD}）
    pub const BUZZ_PREFIX: &str = "buzz/";
    pub const HOLIDAY_PREFIX: &str = "holiday/";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_factors() {
        assert_eq!(
            parse_day_factors("1,1,1,1,1.2,1.4,1.3"),
            Some([1.0, 1.0, 1.0, 1.0, 1.2, 1.4, 1.3])
        );
        assert_eq!(parse_day_factors("1,1,1"), None);
        assert_eq!(parse_day_factors("a,b"), None);
    }
}
