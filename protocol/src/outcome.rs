//! 终局结果

use serde::{Deserialize, Serialize};

use crate::cell::Side;

/// 终局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    /// 一方胜
    Win(Side),
    /// 和棋（子数相同）
    Draw,
}

impl GameOutcome {
    /// 按子数判定
    pub fn from_counts(black: u8, white: u8) -> Self {
        match black.cmp(&white) {
            std::cmp::Ordering::Greater => GameOutcome::Win(Side::Black),
            std::cmp::Ordering::Less => GameOutcome::Win(Side::White),
            std::cmp::Ordering::Equal => GameOutcome::Draw,
        }
    }

    /// 胜方
    pub fn winner(&self) -> Option<Side> {
        match self {
            GameOutcome::Win(side) => Some(*side),
            GameOutcome::Draw => None,
        }
    }

    /// 指定阵营视角的分值：胜 1，和 0，负 -1
    pub fn score_for(&self, side: Side) -> f64 {
        match self {
            GameOutcome::Win(winner) if *winner == side => 1.0,
            GameOutcome::Win(_) => -1.0,
            GameOutcome::Draw => 0.0,
        }
    }
}

impl std::fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOutcome::Win(side) => write!(f, "{} wins", side),
            GameOutcome::Draw => write!(f, "draw"),
        }
    }
}
