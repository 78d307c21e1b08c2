//! 错误类型定义

use thiserror::Error;

/// 黑白棋规则错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReversiError {
    /// 坐标越界
    #[error("Invalid position: ({row}, {col})")]
    InvalidPosition { row: i8, col: i8 },

    /// 非法落子（不在合法走法集合中）
    #[error("Illegal move at ({row}, {col})")]
    IllegalMove { row: u8, col: u8 },

    /// 棋盘结构不变量被破坏，属于引擎内部错误
    #[error("Invalid board state: {reason}\n{dump}")]
    InvalidBoardState { reason: String, dump: String },

    /// 无效的棋盘文本
    #[error("Invalid layout string: {reason}")]
    InvalidLayout { reason: String },

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 评估请求/响应格式错误
    #[error("Malformed evaluation payload: {reason}")]
    MalformedPayload { reason: String },

    /// 规则错误
    #[error("Reversi error: {0}")]
    Reversi(#[from] ReversiError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
