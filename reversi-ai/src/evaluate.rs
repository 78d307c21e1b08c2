//! 静态评估函数
//!
//! 不依赖外部推理的廉价评估，返回走子方视角、位于 [-1, 1] 的值。
//! `DiscDifferential` 同时是推理失败时的兜底评估。

use protocol::{Board, MoveGenerator, Side, CELL_COUNT};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::zobrist::ZobristTable;

/// 位置分值表，索引为 row * 8 + col
///
/// 角最高，紧邻角的 X 位和 C 位为负
#[rustfmt::skip]
const POSITION_WEIGHTS: [i32; CELL_COUNT] = [
    100, -10, 10, 10, 10, 10, -10, 100,
    -10, -20,  1,  1,  1,  1, -20, -10,
     10,   1,  5,  5,  5,  5,   1,  10,
     10,   1,  5,  5,  5,  5,   1,  10,
     10,   1,  5,  5,  5,  5,   1,  10,
     10,   1,  5,  5,  5,  5,   1,  10,
    -10, -20,  1,  1,  1,  1, -20, -10,
    100, -10, 10, 10, 10, 10, -10, 100,
];

/// 加权评估的原始分压缩到 [-1, 1] 的尺度
const WEIGHTED_SCALE: f64 = 200.0;

/// 静态启发式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// 子数差 (own - opp) / (own + opp)
    #[default]
    DiscDifferential,
    /// 位置分 + 10 × 子数差 + 5 × 行动力差
    Weighted,
}

impl Heuristic {
    /// 评估棋局（`side` 视角）
    ///
    /// 终局直接返回胜负值
    pub fn evaluate(&self, board: &Board, side: Side) -> f64 {
        if let Some(outcome) = board.outcome() {
            return outcome.score_for(side);
        }
        match self {
            Heuristic::DiscDifferential => disc_differential(board, side),
            Heuristic::Weighted => (weighted_raw(board, side) as f64 / WEIGHTED_SCALE).tanh(),
        }
    }
}

/// 子数差，棋盘为空时为 0
pub fn disc_differential(board: &Board, side: Side) -> f64 {
    let own = board.count(side) as f64;
    let opp = board.count(side.opponent()) as f64;
    if own + opp == 0.0 {
        return 0.0;
    }
    (own - opp) / (own + opp)
}

/// 加权评估的原始分
pub fn weighted_raw(board: &Board, side: Side) -> i32 {
    let own = side.to_cell();
    let opp = side.opponent().to_cell();

    let mut positional = 0;
    for (index, cell) in board.cells().iter().enumerate() {
        if *cell == own {
            positional += POSITION_WEIGHTS[index];
        } else if *cell == opp {
            positional -= POSITION_WEIGHTS[index];
        }
    }

    let discs = board.disc_difference(side);
    let mobility = MoveGenerator::mobility(board, side) as i32
        - MoveGenerator::mobility(board, side.opponent()) as i32;

    positional + 10 * discs + 5 * mobility
}

/// 伪随机评估器
///
/// 同一局面和种子总是给出同一个值，可作为弱对手或基准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RandomEvaluator {
    pub seed: u64,
}

impl RandomEvaluator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn evaluate(&self, board: &Board, side: Side) -> f64 {
        if let Some(outcome) = board.outcome() {
            return outcome.score_for(side);
        }
        let hash = ZobristTable::global().hash(&board.with_side_to_move(side));
        let mut rng = ChaCha8Rng::seed_from_u64(hash ^ self.seed);
        rng.gen_range(-1.0..=1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Cell, Layout, Position};

    #[test]
    fn test_initial_position_balanced() {
        let board = Board::initial();
        assert_eq!(Heuristic::DiscDifferential.evaluate(&board, Side::Black), 0.0);
        // 开局完全对称
        assert_eq!(weighted_raw(&board, Side::Black), 0);
        assert_eq!(Heuristic::Weighted.evaluate(&board, Side::White), 0.0);
    }

    #[test]
    fn test_disc_differential() {
        let board = Layout::parse("BBB5/W7/8/8/8/8/8/8 w").unwrap();
        assert!((disc_differential(&board, Side::Black) - 0.5).abs() < 1e-12);
        assert!((disc_differential(&board, Side::White) + 0.5).abs() < 1e-12);
        assert_eq!(disc_differential(&Board::empty(), Side::Black), 0.0);
    }

    #[test]
    fn test_weighted_prefers_corner() {
        let mut corner = Board::initial();
        corner.set(Position::new_unchecked(0, 0), Cell::Black);
        let mut x_square = Board::initial();
        x_square.set(Position::new_unchecked(1, 1), Cell::Black);

        assert!(weighted_raw(&corner, Side::Black) > weighted_raw(&x_square, Side::Black));
        let value = Heuristic::Weighted.evaluate(&corner, Side::Black);
        assert!(value > 0.0 && value <= 1.0);
    }

    #[test]
    fn test_terminal_scores() {
        let board = Layout::parse("B6W/8/8/8/8/8/8/B7 b").unwrap();
        assert!(board.is_terminal());
        assert_eq!(Heuristic::Weighted.evaluate(&board, Side::Black), 1.0);
        assert_eq!(Heuristic::DiscDifferential.evaluate(&board, Side::White), -1.0);
        assert_eq!(RandomEvaluator::new(3).evaluate(&board, Side::White), -1.0);
    }

    #[test]
    fn test_random_evaluator_deterministic() {
        let board = Board::initial();
        let a = RandomEvaluator::new(11);
        let b = RandomEvaluator::new(11);

        let value = a.evaluate(&board, Side::Black);
        assert_eq!(value, b.evaluate(&board, Side::Black));
        assert!((-1.0..=1.0).contains(&value));
    }
}
