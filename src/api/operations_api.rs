// ==========================================
// 影院经营决策系统 - 经营决策 API
// ==========================================
// 职责: operate / approve / reflect 三个入口
// 红线: 入参校验在 API 层完成，引擎只接收合法请求
// ==========================================

use std::sync::Arc;

use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::pipeline::{OperateRequest, ReflectionSection, RunOutcome};
use crate::engine::PipelineOrchestrator;

/// 单次运行允许的最大预测天数
pub const MAX_FORECAST_DAYS: u32 = 14;

// ==========================================
// OperationsApi - 经营决策 API
// ==========================================
pub struct OperationsApi {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl OperationsApi {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// 发起一次经营决策运行
    ///
    /// # 参数
    /// - request: 意图/自由文本/影片过滤/预测天数
    ///
    /// # 返回
    /// - Ok(RunOutcome::Completed): 全部阶段完成
    /// - Ok(RunOutcome::PendingApproval): 置信度不足，等待 approve(token)
    /// - Err(ApiError): 入参非法或运行缺少必要输入
    pub async fn operate(&self, request: OperateRequest) -> ApiResult<RunOutcome> {
        if request.forecast_days == 0 || request.forecast_days > MAX_FORECAST_DAYS {
            return Err(ApiError::InvalidInput(format!(
                "forecast_days 必须在 1..={} 之间",
                MAX_FORECAST_DAYS
            )));
        }

        let request = normalize_request(request)?;
        let outcome = self.orchestrator.operate(request).await?;
        log_outcome(&outcome);
        Ok(outcome)
    }

    /// 审批挂起的运行并从断点继续
    ///
    /// # 参数
    /// - token: operate 返回的审批令牌
    pub async fn approve(&self, token: &str) -> ApiResult<RunOutcome> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::InvalidInput("审批令牌不能为空".to_string()));
        }

        let outcome = self.orchestrator.approve(token).await?;
        log_outcome(&outcome);
        Ok(outcome)
    }

    /// 回填实际值并汇总预测误差
    pub fn reflect(&self) -> ApiResult<ReflectionSection> {
        Ok(self.orchestrator.reflect()?)
    }
}

/// 去掉空白 query 与空影片过滤
fn normalize_request(mut request: OperateRequest) -> ApiResult<OperateRequest> {
    request.query = request
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    if let Some(movies) = request.movies.take() {
        let cleaned: Vec<String> = movies
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if cleaned.is_empty() {
            return Err(ApiError::InvalidInput("影片过滤列表不能为空".to_string()));
        }
        request.movies = Some(cleaned);
    }

    Ok(request)
}

fn log_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { run_id, .. } => {
            info!(run_id = %run_id, "运行完成");
        }
        RunOutcome::PendingApproval { run_id, token, .. } => {
            info!(run_id = %run_id, token = %token, "运行挂起，等待审批");
        }
    }
}
