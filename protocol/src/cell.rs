//! 格子、阵营与坐标定义

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, CELL_COUNT};

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 黑方（先手）
    Black,
    /// 白方（后手）
    White,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Black => Side::White,
            Side::White => Side::Black,
        }
    }

    /// 该阵营棋子对应的格子状态
    pub fn to_cell(&self) -> Cell {
        match self {
            Side::Black => Cell::Black,
            Side::White => Cell::White,
        }
    }

    /// 获取文本表示中的走子方字符
    pub fn to_layout_char(&self) -> char {
        match self {
            Side::Black => 'b',
            Side::White => 'w',
        }
    }

    /// 从走子方字符解析
    pub fn from_layout_char(c: char) -> Option<Side> {
        match c {
            'b' | 'B' => Some(Side::Black),
            'w' | 'W' => Some(Side::White),
            _ => None,
        }
    }

    /// 推理请求中的阵营编码：黑 1，白 -1
    pub fn sign(&self) -> i8 {
        match self {
            Side::Black => 1,
            Side::White => -1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Black => write!(f, "Black"),
            Side::White => write!(f, "White"),
        }
    }
}

/// 格子状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Black,
    White,
}

impl Cell {
    /// 格子上棋子所属阵营
    pub fn side(&self) -> Option<Side> {
        match self {
            Cell::Empty => None,
            Cell::Black => Some(Side::Black),
            Cell::White => Some(Side::White),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// 文本表示字符
    pub fn to_layout_char(&self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Black => 'B',
            Cell::White => 'W',
        }
    }

    /// 从文本字符解析
    pub fn from_layout_char(c: char) -> Option<Cell> {
        match c {
            '.' | '-' => Some(Cell::Empty),
            'B' | 'X' => Some(Cell::Black),
            'W' | 'O' => Some(Cell::White),
            _ => None,
        }
    }

    /// 推理请求编码：黑 1，白 -1，空 0
    pub fn encode(&self) -> i8 {
        match self {
            Cell::Empty => 0,
            Cell::Black => 1,
            Cell::White => -1,
        }
    }
}

/// 棋盘坐标，(row, col) 均在 [0, 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 行 (0-7)
    pub row: u8,
    /// 列 (0-7)
    pub col: u8,
}

impl Position {
    /// 创建新位置
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if (row as usize) < BOARD_SIZE && (col as usize) < BOARD_SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    /// 创建新位置（不检查边界，内部使用）
    pub const fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 检查位置是否在棋盘内
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// 获取偏移后的位置
    pub fn offset(&self, dr: i8, dc: i8) -> Option<Position> {
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if row >= 0 && (row as usize) < BOARD_SIZE && col >= 0 && (col as usize) < BOARD_SIZE {
            Some(Position {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// 转换为数组索引（行优先）
    pub fn to_index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }

    /// 从数组索引转换
    pub fn from_index(index: usize) -> Option<Self> {
        if index < CELL_COUNT {
            Some(Position {
                row: (index / BOARD_SIZE) as u8,
                col: (index % BOARD_SIZE) as u8,
            })
        } else {
            None
        }
    }

    /// 按索引顺序遍历全部 64 个位置
    pub fn all() -> impl Iterator<Item = Position> {
        (0..CELL_COUNT).map(|i| Position {
            row: (i / BOARD_SIZE) as u8,
            col: (i % BOARD_SIZE) as u8,
        })
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Black.opponent(), Side::White);
        assert_eq!(Side::White.opponent(), Side::Black);
    }

    #[test]
    fn test_cell_side() {
        assert_eq!(Cell::Black.side(), Some(Side::Black));
        assert_eq!(Cell::White.side(), Some(Side::White));
        assert_eq!(Cell::Empty.side(), None);
        assert_eq!(Side::White.to_cell(), Cell::White);
    }

    #[test]
    fn test_layout_chars() {
        assert_eq!(Cell::from_layout_char('B'), Some(Cell::Black));
        assert_eq!(Cell::from_layout_char('.'), Some(Cell::Empty));
        assert_eq!(Cell::from_layout_char('z'), None);
        assert_eq!(Side::from_layout_char('w'), Some(Side::White));
    }

    #[test]
    fn test_position_valid() {
        assert!(Position::new(0, 0).is_some());
        assert!(Position::new(7, 7).is_some());
        assert!(Position::new(8, 0).is_none());
        assert!(Position::new(0, 8).is_none());
    }

    #[test]
    fn test_position_index_roundtrip() {
        let pos = Position::new_unchecked(5, 4);
        assert_eq!(pos.to_index(), 44);
        assert_eq!(Position::from_index(44), Some(pos));
        assert_eq!(Position::from_index(64), None);
    }

    #[test]
    fn test_position_offset_edges() {
        let corner = Position::new_unchecked(0, 0);
        assert_eq!(corner.offset(-1, 0), None);
        assert_eq!(corner.offset(1, 1), Some(Position::new_unchecked(1, 1)));
        assert_eq!(Position::new_unchecked(7, 7).offset(0, 1), None);
    }

    #[test]
    fn test_all_positions_in_index_order() {
        let all: Vec<_> = Position::all().collect();
        assert_eq!(all.len(), 64);
        assert_eq!(all[0], Position::new_unchecked(0, 0));
        assert_eq!(all[9], Position::new_unchecked(1, 1));
        assert!(all.windows(2).all(|w| w[0].to_index() + 1 == w[1].to_index()));
    }
}
