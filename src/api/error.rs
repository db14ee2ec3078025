// ==========================================
// 影院经营决策系统 - API层错误类型
// ==========================================
// 职责: 把仓储/引擎层的技术错误转换为用户可读的错误消息
// 红线: 不向调用方泄露内部调用栈，只暴露出错阶段与原因
// ==========================================

use crate::domain::pipeline::SectionConflict;
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 运行缺少必要输入（本次运行失败）
    #[error("阶段 {stage} 缺少输入: {message}")]
    MissingInput { stage: String, message: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MissingInput { stage, message } => ApiError::MissingInput {
                stage: stage.to_string(),
                message,
            },
            EngineError::Constraint(msg) => ApiError::BusinessRuleViolation(msg),
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::Repository(e) => e.into(),
            EngineError::Conflict(SectionConflict(name)) => {
                ApiError::InternalError(format!("结果段重复写入: {}", name))
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "pipeline_checkpoint".to_string(),
            id: "T001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("pipeline_checkpoint"));
                assert!(msg.contains("T001"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let repo_err = RepositoryError::InvalidStateTransition {
            from: "completed".to_string(),
            to: "approved".to_string(),
        };
        assert!(matches!(
            ApiError::from(repo_err),
            ApiError::InvalidStateTransition { .. }
        ));
    }

    #[test]
    fn test_engine_error_conversion() {
        let api_err: ApiError = EngineError::missing("show_expansion", "没有待映场次").into();
        match api_err {
            ApiError::MissingInput { stage, message } => {
                assert_eq!(stage, "show_expansion");
                assert!(message.contains("待映场次"));
            }
            other => panic!("Expected MissingInput, got {:?}", other),
        }

        let nested = EngineError::Repository(RepositoryError::LockError("poisoned".to_string()));
        assert!(matches!(
            ApiError::from(nested),
            ApiError::DatabaseConnectionError(_)
        ));

        let conflict: ApiError = EngineError::Conflict(SectionConflict("pricing")).into();
        assert!(conflict.to_string().contains("pricing"));
    }
}
