//! 棋盘文本格式解析和生成
//!
//! 格式：`<8 行棋盘> <走子方>`，行之间用 `/` 分隔，自上而下为 row 0 到 row 7。
//! 格子用 `B` / `W` / `.` 表示，数字 1-8 表示连续空格。
//!
//! 示例：
//! `8/8/8/3WB3/3BW3/8/8/8 b`

use crate::board::Board;
use crate::cell::{Cell, Position, Side};
use crate::constants::BOARD_SIZE;
use crate::error::ReversiError;

/// 标准开局
pub const INITIAL_LAYOUT: &str = "8/8/8/3WB3/3BW3/8/8/8 b";

/// 棋盘文本格式处理
pub struct Layout;

impl Layout {
    /// 解析文本为棋盘
    pub fn parse(text: &str) -> Result<Board, ReversiError> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.is_empty() {
            return Err(ReversiError::InvalidLayout {
                reason: "Empty layout string".to_string(),
            });
        }

        let mut board = Self::parse_cells(parts[0])?;

        // 走子方（默认黑方）
        if let Some(side_part) = parts.get(1) {
            let c = side_part.chars().next().unwrap_or('b');
            let side = Side::from_layout_char(c).ok_or_else(|| ReversiError::InvalidLayout {
                reason: format!("Invalid side character: {}", c),
            })?;
            board = board.with_side_to_move(side);
        }

        Ok(board)
    }

    /// 解析棋盘部分
    fn parse_cells(cells: &str) -> Result<Board, ReversiError> {
        let mut board = Board::empty();
        let rows: Vec<&str> = cells.split('/').collect();

        if rows.len() != BOARD_SIZE {
            return Err(ReversiError::InvalidLayout {
                reason: format!("Expected {} rows, got {}", BOARD_SIZE, rows.len()),
            });
        }

        for (row_idx, row) in rows.iter().enumerate() {
            let mut col = 0usize;

            for c in row.chars() {
                if col >= BOARD_SIZE {
                    return Err(ReversiError::InvalidLayout {
                        reason: format!("Row {} has too many columns", row_idx),
                    });
                }

                if let Some(run) = c.to_digit(10) {
                    if run == 0 {
                        return Err(ReversiError::InvalidLayout {
                            reason: format!("Zero-length run in row {}", row_idx),
                        });
                    }
                    col += run as usize;
                } else if let Some(cell) = Cell::from_layout_char(c) {
                    board.set(Position::new_unchecked(row_idx as u8, col as u8), cell);
                    col += 1;
                } else {
                    return Err(ReversiError::InvalidLayout {
                        reason: format!("Invalid cell character: {}", c),
                    });
                }
            }

            if col != BOARD_SIZE {
                return Err(ReversiError::InvalidLayout {
                    reason: format!("Row {} has {} columns, expected {}", row_idx, col, BOARD_SIZE),
                });
            }
        }

        Ok(board)
    }

    /// 将棋盘转换为文本（空格压缩为数字）
    pub fn to_string(board: &Board) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE);

        for row in 0..BOARD_SIZE {
            let mut text = String::new();
            let mut empty_run = 0;

            for col in 0..BOARD_SIZE {
                let cell = board.get(Position::new_unchecked(row as u8, col as u8));
                if cell.is_empty() {
                    empty_run += 1;
                } else {
                    if empty_run > 0 {
                        text.push_str(&empty_run.to_string());
                        empty_run = 0;
                    }
                    text.push(cell.to_layout_char());
                }
            }
            if empty_run > 0 {
                text.push_str(&empty_run.to_string());
            }
            rows.push(text);
        }

        format!("{} {}", rows.join("/"), board.side_to_move().to_layout_char())
    }
}
