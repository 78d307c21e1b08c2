//! 评估器
//!
//! 搜索引擎只认识 [`Evaluator`]，具体策略在对局配置时选定并按值传入。

use std::sync::Arc;
use std::time::Instant;

use protocol::{Board, EvaluationResponse, Side};
use serde::{Deserialize, Serialize};

use crate::error::EvaluatorError;
use crate::evaluate::{Heuristic, RandomEvaluator};
use crate::http::HttpBackendConfig;
use crate::inference::{InferenceBackend, InferenceConfig, InferenceEvaluator};

/// 评估策略
#[derive(Debug, Clone)]
pub enum Evaluator {
    /// 静态启发式
    Static(Heuristic),
    /// 伪随机
    Random(RandomEvaluator),
    /// 外部推理
    Inference(Arc<InferenceEvaluator>),
}

impl Evaluator {
    /// 用推理后端创建
    pub fn inference(backend: Arc<dyn InferenceBackend>, config: InferenceConfig) -> Self {
        Evaluator::Inference(Arc::new(InferenceEvaluator::new(backend, config)))
    }

    /// 评估局面（`side` 视角），值位于 [-1, 1]
    ///
    /// `deadline` 只约束推理调用；静态评估总是立即返回
    pub fn evaluate(
        &self,
        board: &Board,
        side: Side,
        deadline: Option<Instant>,
    ) -> Result<EvaluationResponse, EvaluatorError> {
        match self {
            Evaluator::Static(heuristic) => Ok(EvaluationResponse::new(heuristic.evaluate(board, side))),
            Evaluator::Random(random) => Ok(EvaluationResponse::new(random.evaluate(board, side))),
            Evaluator::Inference(inference) => inference.evaluate(board, side, deadline),
        }
    }

    /// 是否可能返回走法先验
    pub fn provides_priors(&self) -> bool {
        matches!(self, Evaluator::Inference(_))
    }

    /// 搜索开始前调用
    pub fn begin_search(&self) {
        if let Evaluator::Inference(inference) = self {
            inference.begin_search();
        }
    }

    /// 名称（用于日志）
    pub fn name(&self) -> String {
        match self {
            Evaluator::Static(heuristic) => format!("static:{:?}", heuristic),
            Evaluator::Random(random) => format!("random:{}", random.seed),
            Evaluator::Inference(inference) => format!("inference:{}", inference.backend_name()),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::Static(Heuristic::Weighted)
    }
}

/// 评估器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluatorSpec {
    Static { heuristic: Heuristic },
    Random { seed: u64 },
    Http(HttpBackendConfig),
}

impl EvaluatorSpec {
    /// 按配置构建评估器
    pub fn build(&self, inference: &InferenceConfig) -> anyhow::Result<Evaluator> {
        match self {
            EvaluatorSpec::Static { heuristic } => Ok(Evaluator::Static(*heuristic)),
            EvaluatorSpec::Random { seed } => Ok(Evaluator::Random(RandomEvaluator::new(*seed))),
            EvaluatorSpec::Http(config) => build_http(config, inference),
        }
    }
}

impl Default for EvaluatorSpec {
    fn default() -> Self {
        EvaluatorSpec::Static {
            heuristic: Heuristic::Weighted,
        }
    }
}

#[cfg(feature = "inference")]
fn build_http(config: &HttpBackendConfig, inference: &InferenceConfig) -> anyhow::Result<Evaluator> {
    let backend = crate::http::HttpBackend::new(config.clone())?;
    Ok(Evaluator::inference(Arc::new(backend), inference.clone()))
}

#[cfg(not(feature = "inference"))]
fn build_http(config: &HttpBackendConfig, _: &InferenceConfig) -> anyhow::Result<Evaluator> {
    anyhow::bail!(
        "HTTP evaluator for {} requires the `inference` feature",
        config.base_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedBackend;

    #[test]
    fn test_static_evaluator() {
        let evaluator = Evaluator::default();
        let response = evaluator.evaluate(&Board::initial(), Side::Black, None).unwrap();
        assert_eq!(response.value, 0.0);
        assert!(response.priors.is_none());
        assert!(!evaluator.provides_priors());
    }

    #[test]
    fn test_inference_evaluator() {
        let evaluator = Evaluator::inference(Arc::new(FixedBackend::new(-0.5)), InferenceConfig::default());
        let response = evaluator.evaluate(&Board::initial(), Side::White, None).unwrap();
        assert_eq!(response.value, -0.5);
        assert!(evaluator.provides_priors());
        assert_eq!(evaluator.name(), "inference:fixed");
    }

    #[test]
    fn test_spec_json() {
        let spec: EvaluatorSpec =
            serde_json::from_str(r#"{"kind": "static", "heuristic": "disc_differential"}"#).unwrap();
        assert_eq!(
            spec,
            EvaluatorSpec::Static {
                heuristic: Heuristic::DiscDifferential
            }
        );

        let spec: EvaluatorSpec = serde_json::from_str(r#"{"kind": "random", "seed": 9}"#).unwrap();
        let evaluator = spec.build(&InferenceConfig::default()).unwrap();
        assert_eq!(evaluator.name(), "random:9");

        let spec: EvaluatorSpec =
            serde_json::from_str(r#"{"kind": "http", "base_url": "http://127.0.0.1:1"}"#).unwrap();
        assert!(matches!(spec, EvaluatorSpec::Http(ref c) if c.model == "reversi-value"));
    }
}
