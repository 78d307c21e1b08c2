//! 评估器错误类型

use thiserror::Error;

/// 评估器错误
///
/// 搜索引擎不会把它暴露给调用方，而是退回到静态评估
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluatorError {
    /// 单次调用超出时限
    #[error("Evaluator timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    /// 后端不可用、返回格式错误或熔断
    #[error("Evaluator unavailable: {reason}")]
    Unavailable { reason: String },
}

impl EvaluatorError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        EvaluatorError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EvaluatorError::Timeout { .. })
    }
}

impl From<protocol::ProtocolError> for EvaluatorError {
    fn from(err: protocol::ProtocolError) -> Self {
        EvaluatorError::unavailable(err.to_string())
    }
}
