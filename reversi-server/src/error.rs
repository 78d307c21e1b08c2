//! 对局错误类型

use protocol::{GameOutcome, MatchId, ReversiError, Side};
use thiserror::Error;

/// 对局错误
#[derive(Error, Debug)]
pub enum MatchError {
    /// 对局不存在
    #[error("Match {0} not found")]
    NotFound(MatchId),

    /// 规则错误（非法落子、坐标越界、棋盘状态损坏）
    #[error(transparent)]
    Rule(#[from] ReversiError),

    /// 走子方有合法走法时不能停一手
    #[error("{side} cannot pass while a legal move exists")]
    IllegalPass { side: Side },

    /// 当前走子方不是 AI
    #[error("{side} is not controlled by the AI")]
    NotAiTurn { side: Side },

    /// 当前走子方由 AI 控制，不接受外部落子
    #[error("{side} is controlled by the AI")]
    NotHumanTurn { side: Side },

    /// 已有搜索在进行
    #[error("A search is already running for match {0}")]
    SearchInProgress(MatchId),

    /// 搜索被取消
    #[error("Search for match {0} was cancelled")]
    SearchCancelled(MatchId),

    /// 搜索期间对局状态已改变
    #[error("Match {0} changed while the AI was thinking")]
    StateChanged(MatchId),

    /// 走法来源失败
    #[error("Move source for {side} failed: {reason}")]
    MoveSourceFailed { side: Side, reason: String },

    /// 搜索线程异常
    #[error("Search worker failed: {0}")]
    Worker(String),

    /// 对局配置无效
    #[error("Invalid match configuration: {reason}")]
    InvalidConfig { reason: String },

    /// 对局已结束
    #[error("Match is already finished: {0}")]
    Finished(GameOutcome),
}

/// 对局操作结果类型
pub type Result<T> = std::result::Result<T, MatchError>;
