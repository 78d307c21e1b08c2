//! 黑白棋对局服务
//!
//! 包含:
//! - 对局控制（落子校验、停一手、终局判定）
//! - 对局管理（人机对局、AI 搜索调度与取消）
//! - 事件发送
//! - 自我对弈
//! - 配置

pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod manager;
pub mod selfplay;

pub use config::{MatchConfig, PlayerKind, ServerConfig};
pub use error::{MatchError, Result};
pub use events::{ChannelSink, EventSink, JsonLinesSink, NullSink};
pub use game::{MatchController, MatchState, MoveSource, RandomSource, SearchSource};
pub use manager::{AiMove, MatchManager};
pub use selfplay::{BotSpec, GameSummary, SelfPlay, SelfPlayConfig, SelfPlayReport};
