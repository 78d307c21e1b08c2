//! 自我对弈
//!
//! 两个走法来源交替执黑下 N 局，各局并行运行。走法来源出错、走出非法走法
//! 或单步超时的一方判负。

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use protocol::{Board, GameOutcome, MatchId, Side};
use rayon::prelude::*;
use reversi_ai::{Budget, CancelToken, EvaluatorSpec, InferenceConfig, SearchConfig, SearchEngine};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::NullSink;
use crate::game::{MatchController, MoveSource, RandomSource, SearchSource};

/// 参赛方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BotSpec {
    /// 搜索引擎
    Search {
        #[serde(default)]
        search: SearchConfig,
        #[serde(default)]
        evaluator: EvaluatorSpec,
    },
    /// 随机走子，每局种子为 `seed + 局号`
    Random { seed: u64 },
}

impl BotSpec {
    /// 为第 `game` 局创建新的走法来源
    fn build(&self, inference: &InferenceConfig, game: u32) -> Result<Box<dyn MoveSource>> {
        match self {
            BotSpec::Search { search, evaluator } => {
                let evaluator = evaluator.build(inference)?;
                let engine = Arc::new(SearchEngine::new(search.clone(), evaluator));
                Ok(Box::new(SearchSource::new(engine)))
            }
            BotSpec::Random { seed } => Ok(Box::new(RandomSource::new(seed.wrapping_add(game as u64)))),
        }
    }

    /// 名称（用于报告）
    pub fn label(&self) -> String {
        match self {
            BotSpec::Search { search, evaluator } => {
                let evaluator = match evaluator {
                    EvaluatorSpec::Static { heuristic } => format!("static:{:?}", heuristic),
                    EvaluatorSpec::Random { seed } => format!("random:{}", seed),
                    EvaluatorSpec::Http(config) => format!("http:{}", config.model),
                };
                format!("search(depth={}, {})", search.max_depth, evaluator)
            }
            BotSpec::Random { seed } => format!("random({})", seed),
        }
    }
}

impl Default for BotSpec {
    fn default() -> Self {
        BotSpec::Search {
            search: SearchConfig::default(),
            evaluator: EvaluatorSpec::default(),
        }
    }
}

/// 自我对弈配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayConfig {
    pub first: BotSpec,
    pub second: BotSpec,
    pub games: u32,
    /// 每步的搜索时间（毫秒）
    pub move_time_ms: u64,
    /// 单步超过该时间判负（毫秒）
    pub forfeit_after_ms: u64,
    pub inference: InferenceConfig,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            first: BotSpec::default(),
            second: BotSpec::Random { seed: 0 },
            games: 10,
            move_time_ms: 1000,
            forfeit_after_ms: 10_000,
            inference: InferenceConfig::default(),
        }
    }
}

/// 单局结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game: u32,
    /// 先手方（`first`）执的颜色
    pub first_side: Side,
    pub outcome: GameOutcome,
    pub black: u8,
    pub white: u8,
    /// 走法数（包括停一手）
    pub moves: usize,
    /// 判负的一方
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forfeit: Option<Side>,
    pub duration_ms: u64,
}

impl GameSummary {
    /// 先手方是否获胜
    pub fn first_won(&self) -> bool {
        self.outcome.winner() == Some(self.first_side)
    }

    pub fn second_won(&self) -> bool {
        self.outcome.winner() == Some(self.first_side.opponent())
    }
}

/// 自我对弈报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfPlayReport {
    pub first: String,
    pub second: String,
    pub games: u32,
    pub first_wins: u32,
    pub second_wins: u32,
    pub draws: u32,
    pub forfeits: u32,
    pub total_moves: usize,
    pub duration_ms: u64,
    pub results: Vec<GameSummary>,
}

impl SelfPlayReport {
    fn from_results(config: &SelfPlayConfig, results: Vec<GameSummary>, duration_ms: u64) -> Self {
        Self {
            first: config.first.label(),
            second: config.second.label(),
            games: results.len() as u32,
            first_wins: results.iter().filter(|r| r.first_won()).count() as u32,
            second_wins: results.iter().filter(|r| r.second_won()).count() as u32,
            draws: results
                .iter()
                .filter(|r| r.outcome == GameOutcome::Draw)
                .count() as u32,
            forfeits: results.iter().filter(|r| r.forfeit.is_some()).count() as u32,
            total_moves: results.iter().map(|r| r.moves).sum(),
            duration_ms,
            results,
        }
    }

    /// 先手方得分率（和棋记半分）
    pub fn first_score(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        (self.first_wins as f64 + self.draws as f64 * 0.5) / self.games as f64
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("序列化对弈报告失败")
    }

    /// 保存报告
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建报告目录: {:?}", parent))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("写入对弈报告失败: {:?}", path))?;
        info!("对弈报告已保存: {:?}", path);
        Ok(())
    }
}

/// 自我对弈
pub struct SelfPlay {
    config: SelfPlayConfig,
}

impl SelfPlay {
    pub fn new(config: SelfPlayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    /// 运行全部对局
    pub fn run(&self) -> Result<SelfPlayReport> {
        let started = Instant::now();
        info!(
            "开始自我对弈: {} 对 {}，共 {} 局",
            self.config.first.label(),
            self.config.second.label(),
            self.config.games
        );

        let results = (0..self.config.games)
            .into_par_iter()
            .map(|game| self.play(game))
            .collect::<Result<Vec<_>>>()?;

        let report = SelfPlayReport::from_results(&self.config, results, started.elapsed().as_millis() as u64);
        info!(
            "自我对弈结束: 先手 {} 胜，后手 {} 胜，和 {}，判负 {}，耗时 {}ms",
            report.first_wins, report.second_wins, report.draws, report.forfeits, report.duration_ms
        );
        Ok(report)
    }

    /// 下第 `game` 局，偶数局先手方执黑
    fn play(&self, game: u32) -> Result<GameSummary> {
        let mut first = self
            .config
            .first
            .build(&self.config.inference, game)
            .with_context(|| format!("第 {} 局无法创建先手方", game))?;
        let mut second = self
            .config
            .second
            .build(&self.config.inference, game)
            .with_context(|| format!("第 {} 局无法创建后手方", game))?;
        self.play_game(game, first.as_mut(), second.as_mut())
    }

    fn play_game(
        &self,
        game: u32,
        first: &mut dyn MoveSource,
        second: &mut dyn MoveSource,
    ) -> Result<GameSummary> {
        let started = Instant::now();
        let first_side = if game % 2 == 0 { Side::Black } else { Side::White };
        let mut controller = MatchController::new(game as MatchId, Board::initial(), Arc::new(NullSink))?;
        let budget = Budget::time(self.config.move_time_ms);
        let cancel = CancelToken::new();
        let mut forfeit = None;

        while !controller.is_finished() {
            let side = controller.board().side_to_move();
            let source: &mut dyn MoveSource = if side == first_side { &mut *first } else { &mut *second };

            let turn_started = Instant::now();
            let played = controller.play_turn(source, &budget, &cancel);
            let elapsed_ms = turn_started.elapsed().as_millis() as u64;

            match played {
                Ok(_) if elapsed_ms > self.config.forfeit_after_ms => {
                    warn!("第 {} 局: {} 单步耗时 {}ms，判负", game, side, elapsed_ms);
                    forfeit = Some(side);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("第 {} 局: {} 判负: {}", game, side, e);
                    forfeit = Some(side);
                    break;
                }
            }
        }

        let outcome = match (forfeit, controller.outcome()) {
            (Some(side), _) => GameOutcome::Win(side.opponent()),
            (None, Some(outcome)) => outcome,
            (None, None) => anyhow::bail!("第 {} 局未结束", game),
        };
        let board = controller.board();

        Ok(GameSummary {
            game,
            first_side,
            outcome,
            black: board.black_count(),
            white: board.white_count(),
            moves: controller.record().moves.len(),
            forfeit,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}
