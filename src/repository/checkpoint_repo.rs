// ==========================================
// 影院经营决策系统 - 流水线断点仓储
// ==========================================
// 用途: 低置信度决策挂起时持久化上下文，审批后从断点恢复
// 状态机: pending → approved → completed
// 红线: 只有 pending 的断点可以被领取，领取与状态切换在同一条 UPDATE 内完成
// ==========================================

use crate::domain::pipeline::{OperateRequest, PipelineContext, PipelineStage};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub const CHECKPOINT_PENDING: &str = "pending";
pub const CHECKPOINT_APPROVED: &str = "approved";
pub const CHECKPOINT_COMPLETED: &str = "completed";

/// 已持久化的断点
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub token: String,
    pub run_id: String,
    pub request: OperateRequest,
    pub context: PipelineContext,
    pub next_stage: PipelineStage,
    pub status: String,
}

// ==========================================
// CheckpointRepository - 断点仓储
// ==========================================
pub struct CheckpointRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CheckpointRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存挂起断点
    pub fn save(
        &self,
        token: &str,
        request: &OperateRequest,
        context: &PipelineContext,
        next_stage: PipelineStage,
    ) -> RepositoryResult<()> {
        let request_json = serde_json::to_string(request)?;
        let context_json = serde_json::to_string(context)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO pipeline_checkpoint (
                token, run_id, request_json, context_json, next_stage, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                token,
                &context.run_id,
                request_json,
                context_json,
                next_stage.as_str(),
                CHECKPOINT_PENDING
            ],
        )?;
        Ok(())
    }

    pub fn find(&self, token: &str) -> RepositoryResult<Option<CheckpointRecord>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT token, run_id, request_json, context_json, next_stage, status
                FROM pipeline_checkpoint WHERE token = ?1
                "#,
                params![token],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((token, run_id, request_json, context_json, next_stage, status)) = row else {
            return Ok(None);
        };

        let next_stage =
            PipelineStage::parse(&next_stage).ok_or_else(|| RepositoryError::FieldValueError {
                field: "pipeline_checkpoint.next_stage".to_string(),
                message: format!("未知阶段: {}", next_stage),
            })?;

        Ok(Some(CheckpointRecord {
            token,
            run_id,
            request: serde_json::from_str(&request_json)?,
            context: serde_json::from_str(&context_json)?,
            next_stage,
            status,
        }))
    }

    /// 领取待审批断点（pending → approved）
    ///
    /// # 返回
    /// - Err(NotFound): token 不存在
    /// - Err(InvalidStateTransition): 断点已被领取或已完成
    pub fn claim_pending(&self, token: &str) -> RepositoryResult<CheckpointRecord> {
        let changed = {
            let conn = self.get_conn()?;
            conn.execute(
                "UPDATE pipeline_checkpoint SET status = ?1 WHERE token = ?2 AND status = ?3",
                params![CHECKPOINT_APPROVED, token, CHECKPOINT_PENDING],
            )?
        };

        let record = self.find(token)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "pipeline_checkpoint".to_string(),
            id: token.to_string(),
        })?;

        if changed == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                from: record.status,
                to: CHECKPOINT_APPROVED.to_string(),
            });
        }
        Ok(record)
    }

    /// 标记断点已执行完毕
    pub fn mark_completed(&self, token: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE pipeline_checkpoint SET status = ?1, resolved_at = datetime('now') WHERE token = ?2",
            params![CHECKPOINT_COMPLETED, token],
        )?;
        Ok(())
    }

    /// 恢复执行失败时退回 pending，允许再次审批
    pub fn release(&self, token: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE pipeline_checkpoint SET status = ?1 WHERE token = ?2 AND status = ?3",
            params![CHECKPOINT_PENDING, token, CHECKPOINT_APPROVED],
        )?;
        Ok(())
    }
}
