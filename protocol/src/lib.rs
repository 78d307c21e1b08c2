//! 黑白棋共享协议库
//!
//! 包含:
//! - 格子、阵营、位置、棋盘等核心数据结构
//! - 走法生成、翻转计算和终局判定
//! - 棋盘文本格式 (Layout)
//! - 推理后端的评估请求/响应
//! - 对局事件与棋谱记录

mod board;
mod cell;
mod constants;
mod error;
mod evaluation;
mod layout;
mod moves;
mod outcome;
mod record;

pub use board::Board;
pub use cell::{Cell, Position, Side};
pub use constants::*;
pub use error::{ProtocolError, Result, ReversiError};
pub use evaluation::{EvaluationRequest, EvaluationResponse};
pub use layout::{Layout, INITIAL_LAYOUT};
pub use moves::{FlipSet, Move, MoveGenerator};
pub use outcome::GameOutcome;
pub use record::{MatchEvent, MatchId, MatchRecord, MoveRecord};
