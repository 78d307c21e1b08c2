//! 走法生成、翻转计算与落子

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::cell::{Position, Side};
use crate::constants::DIRECTIONS;
use crate::error::ReversiError;

/// 翻转集合，按格子索引编码为 64 位掩码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlipSet(u64);

impl FlipSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn insert(&mut self, pos: Position) {
        self.0 |= 1u64 << pos.to_index();
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.is_valid() && self.0 & (1u64 << pos.to_index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn union(&mut self, other: FlipSet) {
        self.0 |= other.0;
    }

    /// 按索引升序遍历
    pub fn iter(&self) -> impl Iterator<Item = Position> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Position::from_index(index)
        })
    }
}

/// 走法
///
/// `target` 为 None 表示停一手。`flips` 在 [`MoveGenerator::resolve`] 之后才有内容，
/// 走法只对生成它的棋盘有效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 落子位置
    pub target: Option<Position>,
    /// 被翻转的对方棋子
    pub flips: FlipSet,
}

impl Move {
    /// 停一手
    pub const PASS: Move = Move {
        target: None,
        flips: FlipSet::empty(),
    };

    /// 创建未解析翻转的落子
    pub fn place(pos: Position) -> Self {
        Self {
            target: Some(pos),
            flips: FlipSet::empty(),
        }
    }

    /// 创建带翻转集合的落子
    pub fn with_flips(pos: Position, flips: FlipSet) -> Self {
        Self {
            target: Some(pos),
            flips,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.target.is_none()
    }

    /// 是否已解析出翻转集合
    pub fn is_resolved(&self) -> bool {
        !self.flips.is_empty()
    }

    /// 格子索引，停一手返回 None
    pub fn index(&self) -> Option<usize> {
        self.target.map(|pos| pos.to_index())
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target {
            Some(pos) => write!(f, "{}", pos),
            None => write!(f, "pass"),
        }
    }
}

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成指定阵营的全部合法走法（不含翻转集合），按格子索引升序
    pub fn legal_moves(board: &Board, side: Side) -> Vec<Move> {
        Self::legal_moves_resolved(board, side)
            .into_iter()
            .map(|mv| Move {
                target: mv.target,
                flips: FlipSet::empty(),
            })
            .collect()
    }

    /// 生成合法走法并附带翻转集合，避免搜索时重复扫描
    pub fn legal_moves_resolved(board: &Board, side: Side) -> Vec<Move> {
        let mut moves = Vec::with_capacity(16);

        for pos in Position::all() {
            let flips = Self::flips(board, side, pos);
            if !flips.is_empty() {
                moves.push(Move::with_flips(pos, flips));
            }
        }

        moves
    }

    /// 指定阵营是否至少有一个合法走法
    pub fn has_legal_move(board: &Board, side: Side) -> bool {
        Position::all().any(|pos| Self::is_legal(board, side, pos))
    }

    /// 合法走法数量（行动力）
    pub fn mobility(board: &Board, side: Side) -> usize {
        Position::all()
            .filter(|pos| Self::is_legal(board, side, *pos))
            .count()
    }

    /// 检查指定位置对该阵营是否合法
    pub fn is_legal(board: &Board, side: Side, pos: Position) -> bool {
        if !pos.is_valid() || !board.get(pos).is_empty() {
            return false;
        }
        let own = side.to_cell();
        let opp = side.opponent().to_cell();

        DIRECTIONS.iter().any(|&(dr, dc)| {
            let mut current = pos.offset(dr, dc);
            let mut seen_opponent = false;
            while let Some(p) = current {
                let cell = board.get(p);
                if cell == opp {
                    seen_opponent = true;
                    current = p.offset(dr, dc);
                } else {
                    return cell == own && seen_opponent;
                }
            }
            false
        })
    }

    /// 计算在 `pos` 落子时被翻转的棋子
    ///
    /// 每个方向上连续的一个或多个对方棋子，必须以己方棋子结尾（中间不能有空格或出界）。
    /// 目标格非空时返回空集合。
    pub fn flips(board: &Board, side: Side, pos: Position) -> FlipSet {
        let mut result = FlipSet::empty();
        if !pos.is_valid() || !board.get(pos).is_empty() {
            return result;
        }
        let own = side.to_cell();
        let opp = side.opponent().to_cell();

        for (dr, dc) in DIRECTIONS {
            let mut run = FlipSet::empty();
            let mut current = pos.offset(dr, dc);
            while let Some(p) = current {
                let cell = board.get(p);
                if cell == opp {
                    run.insert(p);
                    current = p.offset(dr, dc);
                } else {
                    if cell == own {
                        result.union(run);
                    }
                    break;
                }
            }
        }

        result
    }

    /// 为当前走子方解析走法的翻转集合
    ///
    /// 非法落子得到空翻转集合；停一手原样返回。
    pub fn resolve(board: &Board, mv: Move) -> Move {
        match mv.target {
            Some(pos) => Move::with_flips(pos, Self::flips(board, board.side_to_move(), pos)),
            None => Move::PASS,
        }
    }

    /// 执行已解析的走法，返回新棋盘
    ///
    /// 对方无子可下时走子方不变（对方停一手）；双方都无子可下时棋盘即为终局。
    pub fn apply(board: &Board, mv: &Move) -> Board {
        let Some(pos) = mv.target else {
            return board.pass();
        };
        debug_assert!(mv.is_resolved(), "apply called with unresolved move {}", mv);

        let mover = board.side_to_move();
        let mut next = *board;
        next.set(pos, mover.to_cell());
        for flipped in mv.flips.iter() {
            next.set(flipped, mover.to_cell());
        }

        let opponent = mover.opponent();
        let next_side = if Self::has_legal_move(&next, opponent) || !Self::has_legal_move(&next, mover) {
            opponent
        } else {
            mover
        };
        next.with_side_to_move(next_side)
    }

    /// 校验并执行落子，非法时返回 IllegalMove，原棋盘不变
    pub fn play(board: &Board, pos: Position) -> Result<Board, ReversiError> {
        if !pos.is_valid() {
            return Err(ReversiError::InvalidPosition {
                row: pos.row as i8,
                col: pos.col as i8,
            });
        }
        let mv = Self::resolve(board, Move::place(pos));
        if !mv.is_resolved() {
            return Err(ReversiError::IllegalMove {
                row: pos.row,
                col: pos.col,
            });
        }
        Ok(Self::apply(board, &mv))
    }
}
