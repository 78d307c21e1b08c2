//! 评估请求/响应
//!
//! 推理后端的逻辑契约：64 个格子（行优先，黑 1 / 白 -1 / 空 0）加走子方进，
//! [-1, 1] 的标量评估值和可选的逐格先验概率出。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cell::{Position, Side};
use crate::constants::{CELL_COUNT, MAX_EVALUATION, MIN_EVALUATION};
use crate::error::{ProtocolError, Result};

/// 评估请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// 行优先的 64 个格子编码
    pub cells: Vec<i8>,
    /// 走子方编码：黑 1，白 -1
    pub side: i8,
}

impl EvaluationRequest {
    /// 从棋盘快照构建
    pub fn from_board(board: &Board, side: Side) -> Self {
        Self {
            cells: board.cells().iter().map(|c| c.encode()).collect(),
            side: side.sign(),
        }
    }

    /// 请求中的走子方
    pub fn side(&self) -> Option<Side> {
        match self.side {
            1 => Some(Side::Black),
            -1 => Some(Side::White),
            _ => None,
        }
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 评估响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// 走子方视角的评估值，1 表示必胜
    pub value: f64,
    /// 逐格先验，索引为 row * 8 + col
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priors: Option<Vec<f32>>,
}

impl EvaluationResponse {
    /// 只有评估值的响应（自动截断到 [-1, 1]）
    pub fn new(value: f64) -> Self {
        Self {
            value: value.clamp(MIN_EVALUATION, MAX_EVALUATION),
            priors: None,
        }
    }

    /// 附带先验
    pub fn with_priors(value: f64, priors: Vec<f32>) -> Self {
        Self {
            value: value.clamp(MIN_EVALUATION, MAX_EVALUATION),
            priors: Some(priors),
        }
    }

    /// 指定格子的先验
    pub fn prior_at(&self, pos: Position) -> Option<f32> {
        self.priors
            .as_ref()
            .and_then(|priors| priors.get(pos.to_index()).copied())
    }

    /// 检查后端返回的数据是否可用，并把评估值截断到合法区间
    pub fn validated(mut self) -> Result<Self> {
        if !self.value.is_finite() {
            return Err(ProtocolError::MalformedPayload {
                reason: format!("non-finite value {}", self.value),
            });
        }
        self.value = self.value.clamp(MIN_EVALUATION, MAX_EVALUATION);

        if let Some(priors) = &self.priors {
            if priors.len() != CELL_COUNT {
                return Err(ProtocolError::MalformedPayload {
                    reason: format!("expected {} priors, got {}", CELL_COUNT, priors.len()),
                });
            }
            if priors.iter().any(|p| !p.is_finite()) {
                return Err(ProtocolError::MalformedPayload {
                    reason: "non-finite prior".to_string(),
                });
            }
        }

        Ok(self)
    }

    /// 从 JSON 解析并校验
    pub fn from_json(json: &str) -> Result<Self> {
        let response: EvaluationResponse = serde_json::from_str(json)?;
        response.validated()
    }
}
