//! 对局事件与棋谱记录
//!
//! 事件以追加方式发送给外部持久化层；棋谱记录用 JSON 保存整局走法，可重放校验。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cell::{Position, Side};
use crate::constants::EVENT_VERSION;
use crate::error::{ReversiError, Result};
use crate::layout::Layout;
use crate::moves::{Move, MoveGenerator};
use crate::outcome::GameOutcome;

/// 对局 ID
pub type MatchId = u64;

/// 走法记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// 走子方
    pub side: Side,
    /// 落子位置 [row, col]，停一手为 None
    pub at: Option<[u8; 2]>,
    /// 翻转的棋子数
    pub flipped: u8,
}

impl MoveRecord {
    /// 从已解析的走法创建
    pub fn new(side: Side, mv: &Move) -> Self {
        Self {
            side,
            at: mv.target.map(|p| [p.row, p.col]),
            flipped: mv.flips.len() as u8,
        }
    }

    /// 停一手
    pub fn pass(side: Side) -> Self {
        Self {
            side,
            at: None,
            flipped: 0,
        }
    }

    /// 获取落子位置
    pub fn position(&self) -> Option<Position> {
        self.at.and_then(|[row, col]| Position::new(row, col))
    }
}

/// 发送给持久化层的对局事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// 一步棋已执行
    MoveApplied {
        match_id: MatchId,
        /// 从 1 开始的走法序号
        seq: u32,
        mv: MoveRecord,
        /// 落子后棋盘的 Zobrist 哈希
        board_hash: u64,
        at: DateTime<Utc>,
    },
    /// 对局结束
    Finished {
        match_id: MatchId,
        outcome: GameOutcome,
        black: u8,
        white: u8,
        at: DateTime<Utc>,
    },
}

impl MatchEvent {
    pub fn match_id(&self) -> MatchId {
        match self {
            MatchEvent::MoveApplied { match_id, .. } | MatchEvent::Finished { match_id, .. } => {
                *match_id
            }
        }
    }

    /// 序列化为单行 JSON
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 完整的对局记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 版本号
    pub version: String,
    pub match_id: MatchId,
    /// 开始时间
    pub started_at: DateTime<Utc>,
    /// 初始局面
    pub initial_layout: String,
    /// 走法列表（包括停一手）
    pub moves: Vec<MoveRecord>,
    /// 终局结果
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl MatchRecord {
    /// 创建新的对局记录
    pub fn new(match_id: MatchId, initial: &Board) -> Self {
        Self {
            version: EVENT_VERSION.to_string(),
            match_id,
            started_at: Utc::now(),
            initial_layout: Layout::to_string(initial),
            moves: Vec::new(),
            outcome: None,
        }
    }

    /// 添加走法
    pub fn add_move(&mut self, record: MoveRecord) {
        self.moves.push(record);
    }

    /// 设置结果
    pub fn set_outcome(&mut self, outcome: GameOutcome) {
        self.outcome = Some(outcome);
    }

    /// 从初始局面逐步重放，任何一步非法都返回错误
    pub fn replay(&self) -> Result<Board> {
        let mut board = Layout::parse(&self.initial_layout)?;

        for record in &self.moves {
            if record.side != board.side_to_move() {
                // 记录里的显式停一手
                if record.at.is_none() {
                    continue;
                }
                return Err(ReversiError::InvalidBoardState {
                    reason: format!(
                        "record says {} moved but {} was to move",
                        record.side,
                        board.side_to_move()
                    ),
                    dump: board.to_string(),
                }
                .into());
            }
            board = match record.position() {
                Some(pos) => MoveGenerator::play(&board, pos)?,
                None => board.pass(),
            };
        }

        Ok(board)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从 JSON 解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: u8, col: u8) -> Position {
        Position::new_unchecked(row, col)
    }

    #[test]
    fn test_move_record() {
        let board = Board::initial();
        let mv = MoveGenerator::resolve(&board, Move::place(pos(2, 3)));
        let record = MoveRecord::new(Side::Black, &mv);

        assert_eq!(record.at, Some([2, 3]));
        assert_eq!(record.flipped, 1);
        assert_eq!(record.position(), Some(pos(2, 3)));
        assert_eq!(MoveRecord::pass(Side::White).position(), None);
    }

    #[test]
    fn test_event_json_line() {
        let event = MatchEvent::MoveApplied {
            match_id: 7,
            seq: 1,
            mv: MoveRecord::new(Side::Black, &Move::with_flips(pos(2, 3), Default::default())),
            board_hash: 42,
            at: Utc::now(),
        };
        let line = event.to_json_line().unwrap();
        assert!(line.contains("\"type\":\"move_applied\""));
        assert!(!line.contains('\n'));

        let parsed: MatchEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.match_id(), 7);
    }

    #[test]
    fn test_record_replay() {
        let initial = Board::initial();
        let mut record = MatchRecord::new(1, &initial);

        let mut board = initial;
        for target in [pos(2, 3), pos(2, 2), pos(3, 2)] {
            let side = board.side_to_move();
            let mv = MoveGenerator::resolve(&board, Move::place(target));
            assert!(mv.is_resolved());
            record.add_move(MoveRecord::new(side, &mv));
            board = MoveGenerator::apply(&board, &mv);
        }

        let json = record.to_json().unwrap();
        let restored = MatchRecord::from_json(&json).unwrap();
        assert_eq!(restored.replay().unwrap(), board);
    }

    #[test]
    fn test_record_replay_rejects_illegal() {
        let mut record = MatchRecord::new(1, &Board::initial());
        record.add_move(MoveRecord {
            side: Side::Black,
            at: Some([0, 0]),
            flipped: 0,
        });
        assert!(record.replay().is_err());
    }
}
