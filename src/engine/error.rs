// ==========================================
// 影院经营决策系统 - 引擎层错误类型
// ==========================================
// 分类:
// - MissingInput: 本次运行无法继续（无预测/无场次可展开）
// - Constraint:   单个场次/时段被跳过，不中断批处理
// - Validation:   入参不合法
// ==========================================

use crate::domain::pipeline::SectionConflict;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("缺少输入 (stage={stage}): {message}")]
    MissingInput { stage: &'static str, message: String },

    #[error("约束冲突: {0}")]
    Constraint(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Conflict(#[from] SectionConflict),
}

impl EngineError {
    pub fn missing(stage: &'static str, message: impl Into<String>) -> Self {
        EngineError::MissingInput {
            stage,
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
