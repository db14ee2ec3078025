// ==========================================
// 影院经营决策系统 - 人工审批门
// ==========================================
// 规则: 路由置信度 < 阈值 且 未审批 → 挂起
// 挂起是持久化断点，不在内存中阻塞
// ==========================================

use crate::config::ApprovalPolicy;
use crate::domain::pipeline::PipelineContext;
use crate::i18n::t_with_args;

pub struct ApprovalGate {
    policy: ApprovalPolicy,
}

impl ApprovalGate {
    pub fn new(policy: ApprovalPolicy) -> Self {
        Self { policy }
    }

    pub fn threshold(&self) -> f64 {
        self.policy.threshold
    }

    pub fn requires_approval(&self, context: &PipelineContext) -> bool {
        !context.approved && context.decision.confidence < self.threshold()
    }

    /// 挂起提示（本地化）
    pub fn pending_message(&self, context: &PipelineContext) -> String {
        let confidence = format!("{:.2}", context.decision.confidence);
        let threshold = format!("{:.2}", self.threshold());
        t_with_args(
            "approval.pending",
            &[("confidence", confidence.as_str()), ("threshold", threshold.as_str())],
        )
    }
}
