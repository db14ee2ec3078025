// ==========================================
// 影院经营决策系统 - 应用状态
// ==========================================
// 职责: 组装共享连接、仓储、信号源、编排器与 API 实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ConfigApi, OperationsApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{PipelineOrchestrator, PipelineRepositories};
use crate::signals::{adjustment_service_from_env, ConfigSignalStore};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CINEMA_OPS_DB_PATH";

/// 应用状态
///
/// 所有仓储与配置管理器共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 经营决策API
    pub operations_api: Arc<OperationsApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并幂等建表
    /// 2. 读取 config_kv 覆写得到全链路参数
    /// 3. 按环境变量选择需求修正服务（未配置时走降级阶梯）
    /// 4. 创建编排器与API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置与信号
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let policy = config_manager
            .load_policy()
            .map_err(|e| format!("无法加载参数配置: {}", e))?;
        let signals = Arc::new(ConfigSignalStore::new(config_manager.clone()));
        let adjustment = adjustment_service_from_env();

        // ==========================================
        // 编排器与API
        // ==========================================
        let repos = PipelineRepositories::from_connection(conn);
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            repos,
            policy,
            adjustment,
            signals.clone(),
            signals,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            operations_api: Arc::new(OperationsApi::new(orchestrator)),
            config_api: Arc::new(ConfigApi::new(config_manager)),
        })
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 CINEMA_OPS_DB_PATH 非空时直接使用
/// - 开发环境: 用户数据目录/cinema-ops-dev/cinema_ops.db
/// - 生产环境: 用户数据目录/cinema-ops/cinema_ops.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./cinema_ops.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("cinema-ops-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("cinema-ops");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("cinema_ops.db");
    }

    path.to_string_lossy().to_string()
}
