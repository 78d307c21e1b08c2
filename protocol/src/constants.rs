//! 协议常量定义

/// 棋盘边长
pub const BOARD_SIZE: usize = 8;

/// 格子总数
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// 八个扫描方向 (行偏移, 列偏移)
pub const DIRECTIONS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// 评估值上界（必胜）
pub const MAX_EVALUATION: f64 = 1.0;

/// 评估值下界（必败）
pub const MIN_EVALUATION: f64 = -1.0;

/// 事件记录格式版本
pub const EVENT_VERSION: &str = "1.0";
