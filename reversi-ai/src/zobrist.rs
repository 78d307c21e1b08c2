//! Zobrist 哈希
//!
//! 置换表、推理缓存和事件中的棋盘哈希都使用同一张表

use std::sync::OnceLock;

use protocol::{Board, Position, Side, CELL_COUNT};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Zobrist 哈希表
///
/// 使用随机数为每个格子的每种颜色生成唯一的哈希值
pub struct ZobristTable {
    /// 棋子哈希值 [side][index]
    /// side: 0=Black, 1=White
    discs: [[u64; CELL_COUNT]; 2],
    /// 白方走子时异或的哈希值
    side_to_move: u64,
}

static GLOBAL: OnceLock<ZobristTable> = OnceLock::new();

impl ZobristTable {
    /// 创建新的 Zobrist 表（使用固定种子保证确定性）
    pub fn new() -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(0xDEADBEEF_CAFE_1234);

        let mut discs = [[0u64; CELL_COUNT]; 2];
        for side in discs.iter_mut() {
            for value in side.iter_mut() {
                *value = rng.gen();
            }
        }

        Self {
            discs,
            side_to_move: rng.gen(),
        }
    }

    /// 进程内共享的表
    pub fn global() -> &'static ZobristTable {
        GLOBAL.get_or_init(ZobristTable::new)
    }

    /// 计算棋盘的完整哈希值（包含走子方）
    pub fn hash(&self, board: &Board) -> u64 {
        let mut hash = 0u64;

        for (index, cell) in board.cells().iter().enumerate() {
            if let Some(side) = cell.side() {
                hash ^= self.discs[side_index(side)][index];
            }
        }

        if board.side_to_move() == Side::White {
            hash ^= self.side_to_move;
        }

        hash
    }

    /// 获取棋子的哈希值
    #[inline]
    pub fn disc_hash(&self, side: Side, pos: Position) -> u64 {
        self.discs[side_index(side)][pos.to_index()]
    }

    /// 获取走子方切换的哈希值
    #[inline]
    pub fn side_hash(&self) -> u64 {
        self.side_to_move
    }
}

impl Default for ZobristTable {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn side_index(side: Side) -> usize {
    match side {
        Side::Black => 0,
        Side::White => 1,
    }
}
