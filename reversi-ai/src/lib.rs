//! 黑白棋 AI 引擎
//!
//! 包含:
//! - 静态评估函数与伪随机评估
//! - 推理后端适配器（超时、熔断、缓存）
//! - Negamax + Alpha-Beta 搜索
//! - 迭代加深与根节点并行
//! - Zobrist 哈希
//! - 置换表

mod error;
mod evaluate;
mod evaluator;
mod http;
mod inference;
mod search;
mod transposition;
mod zobrist;

#[cfg(test)]
mod testing;

pub use error::EvaluatorError;
pub use evaluate::{disc_differential, weighted_raw, Heuristic, RandomEvaluator};
pub use evaluator::{Evaluator, EvaluatorSpec};
pub use http::HttpBackendConfig;
#[cfg(feature = "inference")]
pub use http::HttpBackend;
pub use inference::{InferenceBackend, InferenceConfig, InferenceEvaluator};
pub use search::{
    Budget, CancelToken, Difficulty, SearchConfig, SearchEngine, SearchResult, SearchStats,
};
pub use transposition::{EntryType, TTEntry, TranspositionTable};
pub use zobrist::ZobristTable;
