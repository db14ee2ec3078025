// ==========================================
// 影院经营决策系统 - 调整服务 HTTP 客户端
// ==========================================
// 协议: OpenAI 兼容 /chat/completions，JSON 模式输出
// 配置: 环境变量
//   CINEMA_OPS_LLM_URL          服务根地址（未设置 = 不启用，使用 Noop）
//   CINEMA_OPS_LLM_API_KEY      可选
//   CINEMA_OPS_LLM_MODEL        默认 gpt-4o-mini
//   CINEMA_OPS_LLM_TIMEOUT_SECS 默认 20
// ==========================================

use crate::signals::adjustment::{
    AdjustmentMultipliers, AdjustmentRequest, DemandAdjustmentService, NoopAdjustmentService,
};
use crate::signals::error::{SignalError, SignalResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a cinema demand analyst. \
You adjust a statistical ticket forecast with bounded multipliers only. \
Respond with a single JSON object and nothing else.";

/// HTTP 调整服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct HttpAdjustmentConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl HttpAdjustmentConfig {
    /// 从环境变量读取（未配置 URL 返回 None）
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CINEMA_OPS_LLM_URL").ok()?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return None;
        }
        Some(Self {
            base_url,
            api_key: std::env::var("CINEMA_OPS_LLM_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: std::env::var("CINEMA_OPS_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_secs: std::env::var("CINEMA_OPS_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(20),
        })
    }
}

// ==========================================
// HttpAdjustmentService
// ==========================================
pub struct HttpAdjustmentService {
    client: Client,
    config: HttpAdjustmentConfig,
}

impl HttpAdjustmentService {
    pub fn new(config: HttpAdjustmentConfig) -> SignalResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SignalError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DemandAdjustmentService for HttpAdjustmentService {
    async fn adjust(&self, request: &AdjustmentRequest) -> SignalResult<AdjustmentMultipliers> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": request.to_prompt()},
            ],
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SignalError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignalError::Api {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SignalError::InvalidResponse(e.to_string()))?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SignalError::InvalidResponse("缺少 choices[0].message.content".to_string()))?;

        AdjustmentMultipliers::parse(content)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// 按环境变量构建调整服务；未配置或客户端创建失败时退回 Noop
pub fn adjustment_service_from_env() -> Arc<dyn DemandAdjustmentService> {
    match HttpAdjustmentConfig::from_env() {
        Some(config) => {
            let base_url = config.base_url.clone();
            match HttpAdjustmentService::new(config) {
                Ok(service) => {
                    tracing::info!(base_url = %base_url, "启用 HTTP 需求调整服务");
                    Arc::new(service)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "HTTP 调整服务初始化失败，使用统计降级");
                    Arc::new(NoopAdjustmentService)
                }
            }
        }
        None => {
            tracing::info!("未配置需求调整服务，预测将使用统计模型");
            Arc::new(NoopAdjustmentService)
        }
    }
}
