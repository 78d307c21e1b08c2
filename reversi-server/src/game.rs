//! 对局控制
//!
//! [`MatchController`] 持有唯一的权威棋盘：校验并执行落子、合成停一手、
//! 判定终局并向事件接收方发送事件。搜索只拿到棋盘副本。

use std::sync::Arc;

use chrono::Utc;
use protocol::{
    Board, GameOutcome, MatchEvent, MatchId, MatchRecord, Move, MoveGenerator, MoveRecord,
    Position, ReversiError, Side,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reversi_ai::{Budget, CancelToken, SearchEngine, ZobristTable};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{MatchError, Result};
use crate::events::EventSink;

/// 走法来源
pub trait MoveSource: Send {
    fn name(&self) -> &str;

    /// 为当前走子方选择走法
    fn choose(&mut self, board: &Board, budget: &Budget, cancel: &CancelToken) -> anyhow::Result<Move>;
}

/// 由搜索引擎选择走法
pub struct SearchSource {
    engine: Arc<SearchEngine>,
    name: String,
}

impl SearchSource {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        let name = format!("search:{}", engine.evaluator().name());
        Self { engine, name }
    }
}

impl MoveSource for SearchSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose(&mut self, board: &Board, budget: &Budget, cancel: &CancelToken) -> anyhow::Result<Move> {
        let result = self.engine.search_with(board, budget, cancel);
        if result.stats.cancelled {
            anyhow::bail!("search cancelled at depth {}", result.stats.depth_reached);
        }
        Ok(result.mv)
    }
}

/// 随机选择合法走法
pub struct RandomSource {
    rng: ChaCha8Rng,
    name: String,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            name: format!("random:{}", seed),
        }
    }
}

impl MoveSource for RandomSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn choose(&mut self, board: &Board, _: &Budget, _: &CancelToken) -> anyhow::Result<Move> {
        let moves = MoveGenerator::legal_moves(board, board.side_to_move());
        Ok(moves.choose(&mut self.rng).copied().unwrap_or(Move::PASS))
    }
}

/// 对局状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchState {
    pub match_id: MatchId,
    pub board: Board,
    pub side_to_move: Side,
    /// 当前走子方的合法落子，终局时为空
    pub legal_moves: Vec<Position>,
    pub black_count: u8,
    pub white_count: u8,
    /// 已记录的走法数（包括停一手）
    pub move_count: usize,
    pub version: u64,
    pub outcome: Option<GameOutcome>,
    /// AI 是否正在思考
    pub thinking: bool,
}

/// 单局控制器
pub struct MatchController {
    id: MatchId,
    board: Board,
    record: MatchRecord,
    seq: u32,
    /// 每次棋盘变化加一
    version: u64,
    outcome: Option<GameOutcome>,
    sink: Arc<dyn EventSink>,
}

impl MatchController {
    /// 从给定局面开始对局
    ///
    /// 走子方无子可下时立即合成停一手；局面已是终局时直接结束。
    pub fn new(id: MatchId, board: Board, sink: Arc<dyn EventSink>) -> Result<Self> {
        board.validate()?;

        let mut controller = Self {
            id,
            board,
            record: MatchRecord::new(id, &board),
            seq: 0,
            version: 0,
            outcome: None,
            sink,
        };

        if let Some(outcome) = board.outcome() {
            controller.finish(outcome);
        } else if !board.legal_move_exists(board.side_to_move()) {
            let side = board.side_to_move();
            controller.board = board.pass();
            controller.version += 1;
            info!("对局 {}: {} 开局无子可下，停一手", id, side);
            controller.emit_move(MoveRecord::pass(side), controller.board);
        }

        Ok(controller)
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// 最后一个事件的序号
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    /// 当前走子方的合法落子
    pub fn legal_moves(&self) -> Vec<Position> {
        if self.is_finished() {
            return Vec::new();
        }
        MoveGenerator::legal_moves(&self.board, self.board.side_to_move())
            .into_iter()
            .filter_map(|mv| mv.target)
            .collect()
    }

    /// 执行当前走子方的走法，返回解析后的走法
    ///
    /// 非法走法返回错误，棋盘不变。对方因此无子可下时记录对方停一手。
    pub fn apply_move(&mut self, mv: Move) -> Result<Move> {
        if let Some(outcome) = self.outcome {
            return Err(MatchError::Finished(outcome));
        }

        let mover = self.board.side_to_move();
        let Some(pos) = mv.target else {
            warn!("对局 {}: 拒绝 {} 停一手，仍有合法走法", self.id, mover);
            return Err(MatchError::IllegalPass { side: mover });
        };
        if !pos.is_valid() {
            warn!("对局 {}: 拒绝越界落子 {:?}", self.id, pos);
            return Err(ReversiError::InvalidPosition {
                row: pos.row as i8,
                col: pos.col as i8,
            }
            .into());
        }

        let resolved = MoveGenerator::resolve(&self.board, mv);
        if !resolved.is_resolved() {
            warn!("对局 {}: 拒绝 {} 的非法落子 {}", self.id, mover, pos);
            return Err(ReversiError::IllegalMove {
                row: pos.row,
                col: pos.col,
            }
            .into());
        }

        let next = MoveGenerator::apply(&self.board, &resolved);
        next.validate()?;

        self.board = next;
        self.version += 1;
        debug!(
            "对局 {}: {} 落子 {}，翻转 {} 子",
            self.id,
            mover,
            pos,
            resolved.flips.len()
        );
        self.emit_move(
            MoveRecord::new(mover, &resolved),
            next.with_side_to_move(mover.opponent()),
        );

        if let Some(outcome) = next.outcome() {
            self.finish(outcome);
        } else if next.side_to_move() == mover {
            let passer = mover.opponent();
            info!("对局 {}: {} 无子可下，停一手", self.id, passer);
            self.emit_move(MoveRecord::pass(passer), next);
        }

        Ok(resolved)
    }

    /// 外部提交的落子
    pub fn submit(&mut self, pos: Position) -> Result<Move> {
        self.apply_move(Move::place(pos))
    }

    /// 让走法来源为当前走子方走一步
    pub fn play_turn(
        &mut self,
        source: &mut dyn MoveSource,
        budget: &Budget,
        cancel: &CancelToken,
    ) -> Result<Move> {
        if let Some(outcome) = self.outcome {
            return Err(MatchError::Finished(outcome));
        }

        let side = self.board.side_to_move();
        let chosen = source.choose(&self.board, budget, cancel);
        // 取消期间选出的走法一律丢弃
        if cancel.is_cancelled() {
            debug!("对局 {} 的 {} 走子被取消", self.id, side);
            return Err(MatchError::SearchCancelled(self.id));
        }
        let mv = chosen.map_err(|e| MatchError::MoveSourceFailed {
            side,
            reason: format!("{}: {:#}", source.name(), e),
        })?;
        self.apply_move(mv)
    }

    /// 双方轮流走到终局
    pub fn run(
        &mut self,
        black: &mut dyn MoveSource,
        white: &mut dyn MoveSource,
        budget: &Budget,
        cancel: &CancelToken,
    ) -> Result<GameOutcome> {
        loop {
            if let Some(outcome) = self.outcome {
                return Ok(outcome);
            }
            if cancel.is_cancelled() {
                return Err(MatchError::SearchCancelled(self.id));
            }

            let source: &mut dyn MoveSource = match self.board.side_to_move() {
                Side::Black => &mut *black,
                Side::White => &mut *white,
            };
            self.play_turn(source, budget, cancel)?;
        }
    }

    /// 当前状态快照
    pub fn snapshot(&self, thinking: bool) -> MatchState {
        MatchState {
            match_id: self.id,
            board: self.board,
            side_to_move: self.board.side_to_move(),
            legal_moves: self.legal_moves(),
            black_count: self.board.black_count(),
            white_count: self.board.white_count(),
            move_count: self.record.moves.len(),
            version: self.version,
            outcome: self.outcome,
            thinking,
        }
    }

    /// 记录走法并发送事件，`after` 为该走法执行后的棋盘
    fn emit_move(&mut self, mv: MoveRecord, after: Board) {
        self.seq += 1;
        self.record.add_move(mv.clone());
        self.sink.emit(&MatchEvent::MoveApplied {
            match_id: self.id,
            seq: self.seq,
            mv,
            board_hash: ZobristTable::global().hash(&after),
            at: Utc::now(),
        });
    }

    fn finish(&mut self, outcome: GameOutcome) {
        self.outcome = Some(outcome);
        self.record.set_outcome(outcome);
        info!(
            "对局 {} 结束: {} (黑 {} : 白 {})",
            self.id,
            outcome,
            self.board.black_count(),
            self.board.white_count()
        );
        self.sink.emit(&MatchEvent::Finished {
            match_id: self.id,
            outcome,
            black: self.board.black_count(),
            white: self.board.white_count(),
            at: Utc::now(),
        });
    }
}
