//! HTTP 推理后端
//!
//! 向推理服务 POST `{base_url}/evaluate`，请求体为评估请求加模型名，
//! 响应体为 `{"value": f64, "priors": [f32; 64]?}`。

use serde::{Deserialize, Serialize};

#[cfg(feature = "inference")]
use std::time::Duration;

#[cfg(feature = "inference")]
use anyhow::{Context, Result};
#[cfg(feature = "inference")]
use protocol::{EvaluationRequest, EvaluationResponse};
#[cfg(feature = "inference")]
use tracing::{debug, info};

#[cfg(feature = "inference")]
use crate::error::EvaluatorError;
#[cfg(feature = "inference")]
use crate::inference::InferenceBackend;

/// HTTP 后端配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// 推理服务地址
    pub base_url: String,
    /// 模型名称
    pub model: String,
    /// 连接与请求的总超时（秒），单次评估还会受调用超时约束
    pub timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8501".to_string(),
            model: "reversi-value".to_string(),
            timeout_secs: 5,
        }
    }
}

/// 请求体
#[cfg(feature = "inference")]
#[derive(Serialize)]
struct EvaluateBody<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a EvaluationRequest,
}

/// HTTP 推理后端
#[cfg(feature = "inference")]
pub struct HttpBackend {
    config: HttpBackendConfig,
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[cfg(feature = "inference")]
impl HttpBackend {
    /// 创建新的 HTTP 后端
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        let endpoint = format!("{}/evaluate", config.base_url.trim_end_matches('/'));

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    /// 检查推理服务是否可用
    pub fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .with_context(|| format!("无法连接到推理服务 ({})", self.config.base_url))?;

        if resp.status().is_success() {
            info!("Inference backend health check passed ({})", self.config.base_url);
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "推理服务返回错误状态: {} ({})",
                resp.status(),
                self.config.base_url
            ))
        }
    }
}

#[cfg(feature = "inference")]
impl InferenceBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn infer(
        &self,
        request: &EvaluationRequest,
        timeout: Duration,
    ) -> std::result::Result<EvaluationResponse, EvaluatorError> {
        let body = EvaluateBody {
            model: &self.config.model,
            request,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    EvaluatorError::Timeout {
                        elapsed_ms: timeout.as_millis() as u64,
                        limit_ms: timeout.as_millis() as u64,
                    }
                } else {
                    EvaluatorError::unavailable(format!("request to {} failed: {}", self.endpoint, e))
                }
            })?;

        if !resp.status().is_success() {
            return Err(EvaluatorError::unavailable(format!(
                "{} returned {}",
                self.endpoint,
                resp.status()
            )));
        }

        let response: EvaluationResponse = resp
            .json()
            .map_err(|e| EvaluatorError::unavailable(format!("invalid response body: {}", e)))?;
        debug!("推理返回 value={:.4}", response.value);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: HttpBackendConfig =
            serde_json::from_str(r#"{"base_url": "http://10.0.0.2:9000"}"#).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:9000");
        assert_eq!(config.model, "reversi-value");
        assert_eq!(config.timeout_secs, 5);
    }

    #[cfg(feature = "inference")]
    #[test]
    fn test_endpoint_and_body() {
        let backend = HttpBackend::new(HttpBackendConfig {
            base_url: "http://localhost:8501/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.endpoint, "http://localhost:8501/evaluate");

        let request = EvaluationRequest::from_board(&protocol::Board::initial(), protocol::Side::Black);
        let body = serde_json::to_value(EvaluateBody {
            model: "m",
            request: &request,
        })
        .unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["side"], 1);
        assert_eq!(body["cells"].as_array().unwrap().len(), 64);
    }
}
