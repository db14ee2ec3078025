// ==========================================
// 影院经营决策系统 - 外部信号错误类型
// ==========================================
// 说明: 信号层错误一律可恢复，由预测引擎按降级阶梯处理，不向上抛出
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("调整服务未配置")]
    Unavailable,

    #[error("网络请求失败: {0}")]
    Network(String),

    #[error("服务返回错误: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("响应无法解析: {0}")]
    InvalidResponse(String),

    #[error("响应校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("信号读取失败: {0}")]
    Store(#[from] RepositoryError),
}

pub type SignalResult<T> = Result<T, SignalError>;
