//! 棋盘状态

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Position, Side};
use crate::constants::{BOARD_SIZE, CELL_COUNT};
use crate::error::ReversiError;
use crate::layout::Layout;
use crate::moves::MoveGenerator;
use crate::outcome::GameOutcome;

/// 棋盘
///
/// 64 个格子、当前走子方以及缓存的双方棋子数。整个结构是 `Copy` 的，
/// 搜索分支直接复制快照，不共享可变状态。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "BoardSnapshot", try_from = "BoardSnapshot")]
pub struct Board {
    /// 行优先，索引为 row * 8 + col
    cells: [Cell; CELL_COUNT],
    side_to_move: Side,
    black_count: u8,
    white_count: u8,
}

impl Board {
    /// 创建空棋盘（黑方走）
    pub fn empty() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
            side_to_move: Side::Black,
            black_count: 0,
            white_count: 0,
        }
    }

    /// 标准开局：中心四子，黑方先走
    pub fn initial() -> Self {
        let mut board = Self::empty();
        board.set(Position::new_unchecked(3, 3), Cell::White);
        board.set(Position::new_unchecked(3, 4), Cell::Black);
        board.set(Position::new_unchecked(4, 3), Cell::Black);
        board.set(Position::new_unchecked(4, 4), Cell::White);
        board
    }

    /// 从格子数组创建，棋子数重新统计
    pub fn from_cells(cells: [Cell; CELL_COUNT], side_to_move: Side) -> Self {
        let black_count = cells.iter().filter(|c| **c == Cell::Black).count() as u8;
        let white_count = cells.iter().filter(|c| **c == Cell::White).count() as u8;
        Self {
            cells,
            side_to_move,
            black_count,
            white_count,
        }
    }

    /// 获取指定位置的格子
    pub fn get(&self, pos: Position) -> Cell {
        if pos.is_valid() {
            self.cells[pos.to_index()]
        } else {
            Cell::Empty
        }
    }

    /// 设置指定位置的格子（不检查规则），同步更新棋子数
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if !pos.is_valid() {
            return;
        }
        let index = pos.to_index();
        match self.cells[index] {
            Cell::Black => self.black_count -= 1,
            Cell::White => self.white_count -= 1,
            Cell::Empty => {}
        }
        match cell {
            Cell::Black => self.black_count += 1,
            Cell::White => self.white_count += 1,
            Cell::Empty => {}
        }
        self.cells[index] = cell;
    }

    /// 全部格子（行优先）
    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// 当前走子方
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// 返回走子方被替换后的棋盘
    pub fn with_side_to_move(mut self, side: Side) -> Self {
        self.side_to_move = side;
        self
    }

    /// 停一手：只切换走子方
    pub fn pass(self) -> Self {
        let side = self.side_to_move.opponent();
        self.with_side_to_move(side)
    }

    pub fn black_count(&self) -> u8 {
        self.black_count
    }

    pub fn white_count(&self) -> u8 {
        self.white_count
    }

    /// 指定阵营的棋子数
    pub fn count(&self, side: Side) -> u8 {
        match side {
            Side::Black => self.black_count,
            Side::White => self.white_count,
        }
    }

    /// 已占用格子数
    pub fn occupied(&self) -> u8 {
        self.black_count + self.white_count
    }

    /// 棋盘是否已下满
    pub fn is_full(&self) -> bool {
        self.occupied() as usize == CELL_COUNT
    }

    /// 子数差（指定阵营视角）
    pub fn disc_difference(&self, side: Side) -> i32 {
        self.count(side) as i32 - self.count(side.opponent()) as i32
    }

    /// 指定阵营是否有合法走法
    pub fn legal_move_exists(&self, side: Side) -> bool {
        MoveGenerator::has_legal_move(self, side)
    }

    /// 终局：棋盘已满，或双方都无子可下
    pub fn is_terminal(&self) -> bool {
        self.is_full()
            || (!self.legal_move_exists(Side::Black) && !self.legal_move_exists(Side::White))
    }

    /// 终局结果，按子数多少判定；非终局返回 None
    pub fn outcome(&self) -> Option<GameOutcome> {
        if !self.is_terminal() {
            return None;
        }
        Some(GameOutcome::from_counts(self.black_count, self.white_count))
    }

    /// 检查结构不变量：缓存的棋子数必须与格子一致
    pub fn validate(&self) -> Result<(), ReversiError> {
        let black = self.cells.iter().filter(|c| **c == Cell::Black).count();
        let white = self.cells.iter().filter(|c| **c == Cell::White).count();
        if black != self.black_count as usize || white != self.white_count as usize {
            return Err(ReversiError::InvalidBoardState {
                reason: format!(
                    "cached counts black={} white={} but cells hold black={} white={}",
                    self.black_count, self.white_count, black, white
                ),
                dump: self.to_string(),
            });
        }
        if black + white > CELL_COUNT {
            return Err(ReversiError::InvalidBoardState {
                reason: format!("{} discs on a {}-cell board", black + white, CELL_COUNT),
                dump: self.to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  0 1 2 3 4 5 6 7")?;
        for row in 0..BOARD_SIZE {
            write!(f, "{}", row)?;
            for col in 0..BOARD_SIZE {
                let cell = self.cells[row * BOARD_SIZE + col];
                write!(f, " {}", cell.to_layout_char())?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "to move: {}  black: {}  white: {}",
            self.side_to_move, self.black_count, self.white_count
        )
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", Layout::to_string(self))
    }
}

/// 序列化用的棋盘快照（文本格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoardSnapshot {
    layout: String,
}

impl From<Board> for BoardSnapshot {
    fn from(board: Board) -> Self {
        Self {
            layout: Layout::to_string(&board),
        }
    }
}

impl TryFrom<BoardSnapshot> for Board {
    type Error = ReversiError;

    fn try_from(snapshot: BoardSnapshot) -> Result<Self, Self::Error> {
        Layout::parse(&snapshot.layout)
    }
}
