//! 搜索引擎
//!
//! 实现 Negamax + Alpha-Beta 剪枝 + 迭代加深 + 置换表，根节点可在 rayon 线程池上并行。
//!
//! 每一层深度要么完整搜完，要么整体作废：预算（时间、节点数）耗尽或被取消时，
//! 返回最后一个完整深度的最佳走法。深度 1 不受预算限制，保证总有结果。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use protocol::{Board, Move, MoveGenerator, Side};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EvaluatorError;
use crate::evaluate::Heuristic;
use crate::evaluator::Evaluator;
use crate::transposition::{EntryType, TranspositionTable};
use crate::zobrist::ZobristTable;

/// 搜索窗口边界，超出评估值域
const WINDOW: f64 = 2.0;

/// 平局容差之外再放宽的余量，保证容差内的走法都得到精确值
const TIE_MARGIN: f64 = 1e-9;

/// 静态评估时每隔多少节点检查一次时间
const NODE_CHECK_INTERVAL: u64 = 1024;

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// 搜索配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 迭代加深的最大深度
    pub max_depth: u8,
    /// 时间预算（毫秒）
    pub time_limit_ms: u64,
    /// 节点预算
    pub max_nodes: Option<u64>,
    /// 视为同分的容差
    pub tie_epsilon: f64,
    /// 根节点并行线程数，1 为单线程
    pub threads: usize,
    /// 是否用评估器的先验排序走法
    pub use_priors: bool,
    /// 置换表大小（MB）
    pub tt_size_mb: usize,
}

impl SearchConfig {
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self {
                max_depth: 2,
                time_limit_ms: 500,
                max_nodes: None,
                tie_epsilon: 1e-6,
                threads: 1,
                use_priors: false,
                tt_size_mb: 4,
            },
            Difficulty::Medium => Self {
                max_depth: 4,
                time_limit_ms: 2000,
                max_nodes: None,
                tie_epsilon: 1e-6,
                threads: 1,
                use_priors: true,
                tt_size_mb: 16,
            },
            Difficulty::Hard => Self {
                max_depth: 8,
                time_limit_ms: 5000,
                max_nodes: None,
                tie_epsilon: 1e-6,
                threads: 4,
                use_priors: true,
                tt_size_mb: 64,
            },
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_difficulty(Difficulty::Medium)
    }
}

/// 单次搜索的预算，未设置的字段使用引擎配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    pub max_depth: Option<u8>,
    pub time_limit_ms: Option<u64>,
    pub max_nodes: Option<u64>,
}

impl Budget {
    pub fn depth(max_depth: u8) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Default::default()
        }
    }

    pub fn time(time_limit_ms: u64) -> Self {
        Self {
            time_limit_ms: Some(time_limit_ms),
            ..Default::default()
        }
    }

    pub fn nodes(max_nodes: u64) -> Self {
        Self {
            max_nodes: Some(max_nodes),
            ..Default::default()
        }
    }
}

/// 取消令牌，克隆后共享同一个标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 搜索统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// 访问的节点数
    pub nodes: u64,
    /// 深度截断处由评估器打分的节点
    pub leaf_nodes: u64,
    /// 终局节点
    pub terminal_nodes: u64,
    /// 最后一个完整搜索的深度
    pub depth_reached: u8,
    pub evaluator_calls: u64,
    pub evaluator_failures: u64,
    pub tt_hits: u64,
    pub elapsed_ms: u64,
    /// 预算是否在搜索中途耗尽
    pub budget_exhausted: bool,
    pub cancelled: bool,
}

impl SearchStats {
    /// 有效分支因子：(节点数 - 1) / 内部节点数
    pub fn branching_factor(&self) -> f64 {
        let interior = self
            .nodes
            .saturating_sub(self.leaf_nodes)
            .saturating_sub(self.terminal_nodes);
        if interior == 0 {
            0.0
        } else {
            self.nodes.saturating_sub(1) as f64 / interior as f64
        }
    }
}

/// 搜索结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// 已解析的走法，根节点无子可下时为停一手
    pub mv: Move,
    /// 走子方视角的估值
    pub value: f64,
    pub stats: SearchStats,
}

/// 中止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aborted {
    Cancelled,
    Budget,
}

/// 单次搜索的共享状态
struct SearchContext<'a> {
    deadline: Instant,
    max_nodes: Option<u64>,
    cancel: &'a CancelToken,
    check_interval: u64,
    enforce_budget: AtomicBool,
    budget_hit: AtomicBool,
    warned: AtomicBool,
    nodes: AtomicU64,
    leaf_nodes: AtomicU64,
    terminal_nodes: AtomicU64,
    evaluator_calls: AtomicU64,
    evaluator_failures: AtomicU64,
    tt_hits: AtomicU64,
}

impl<'a> SearchContext<'a> {
    fn new(deadline: Instant, max_nodes: Option<u64>, cancel: &'a CancelToken, check_interval: u64) -> Self {
        Self {
            deadline,
            max_nodes,
            cancel,
            check_interval,
            enforce_budget: AtomicBool::new(false),
            budget_hit: AtomicBool::new(false),
            warned: AtomicBool::new(false),
            nodes: AtomicU64::new(0),
            leaf_nodes: AtomicU64::new(0),
            terminal_nodes: AtomicU64::new(0),
            evaluator_calls: AtomicU64::new(0),
            evaluator_failures: AtomicU64::new(0),
            tt_hits: AtomicU64::new(0),
        }
    }

    /// 记录一个节点并检查取消和预算
    fn visit(&self) -> Result<(), Aborted> {
        let visited = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;

        if self.cancel.is_cancelled() {
            return Err(Aborted::Cancelled);
        }
        if !self.enforce_budget.load(Ordering::Relaxed) {
            return Ok(());
        }
        if self.budget_hit.load(Ordering::Relaxed) {
            return Err(Aborted::Budget);
        }

        let over_nodes = self.max_nodes.is_some_and(|max| visited > max);
        let over_time = visited % self.check_interval == 0 && Instant::now() >= self.deadline;
        if over_nodes || over_time {
            self.budget_hit.store(true, Ordering::Relaxed);
            return Err(Aborted::Budget);
        }
        Ok(())
    }

    /// 开始下一层之前的检查
    fn exhausted(&self) -> bool {
        self.cancel.is_cancelled()
            || Instant::now() >= self.deadline
            || self
                .max_nodes
                .is_some_and(|max| self.nodes.load(Ordering::Relaxed) >= max)
    }

    fn record_failure(&self, evaluator: &Evaluator, err: &EvaluatorError) {
        self.evaluator_failures.fetch_add(1, Ordering::Relaxed);
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("评估器 {} 失败，退回子数差评估: {}", evaluator.name(), err);
        } else {
            debug!("评估器 {} 再次失败: {}", evaluator.name(), err);
        }
    }

    fn stats(&self, depth_reached: u8, started: Instant) -> SearchStats {
        SearchStats {
            nodes: self.nodes.load(Ordering::Relaxed),
            leaf_nodes: self.leaf_nodes.load(Ordering::Relaxed),
            terminal_nodes: self.terminal_nodes.load(Ordering::Relaxed),
            depth_reached,
            evaluator_calls: self.evaluator_calls.load(Ordering::Relaxed),
            evaluator_failures: self.evaluator_failures.load(Ordering::Relaxed),
            tt_hits: self.tt_hits.load(Ordering::Relaxed),
            elapsed_ms: started.elapsed().as_millis() as u64,
            budget_exhausted: self.budget_hit.load(Ordering::Relaxed),
            cancelled: self.cancel.is_cancelled(),
        }
    }
}

/// 搜索引擎
///
/// 不持有棋盘，每次搜索只读取调用方传入的快照。
/// 置换表和线程池属于引擎，随引擎（即随对局）释放。
pub struct SearchEngine {
    config: SearchConfig,
    evaluator: Evaluator,
    tt: TranspositionTable,
    pool: Option<rayon::ThreadPool>,
}

impl SearchEngine {
    /// 创建新的搜索引擎
    pub fn new(config: SearchConfig, evaluator: Evaluator) -> Self {
        let pool = if config.threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("reversi-search-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!("无法创建搜索线程池，退回单线程: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            tt: TranspositionTable::new(config.tt_size_mb),
            config,
            evaluator,
            pool,
        }
    }

    /// 从难度创建（加权静态评估）
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        Self::new(SearchConfig::from_difficulty(difficulty), Evaluator::default())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// 使用配置的预算搜索
    pub fn search(&self, board: &Board) -> SearchResult {
        self.search_with(board, &Budget::default(), &CancelToken::new())
    }

    /// 在给定预算内搜索当前走子方的最佳走法
    pub fn search_with(&self, board: &Board, budget: &Budget, cancel: &CancelToken) -> SearchResult {
        let started = Instant::now();
        let max_depth = budget.max_depth.unwrap_or(self.config.max_depth).max(1);
        let time_limit = budget.time_limit_ms.unwrap_or(self.config.time_limit_ms);
        let deadline = started + Duration::from_millis(time_limit);
        let max_nodes = budget.max_nodes.or(self.config.max_nodes);
        let check_interval = match self.evaluator {
            Evaluator::Inference(_) => 1,
            _ => NODE_CHECK_INTERVAL,
        };

        self.evaluator.begin_search();
        self.tt.new_search();
        let ctx = SearchContext::new(deadline, max_nodes, cancel, check_interval);
        let side = board.side_to_move();

        let moves = MoveGenerator::legal_moves_resolved(board, side);
        if moves.is_empty() {
            let value = self.pass_value(&ctx, board);
            let stats = ctx.stats(1, started);
            info!("{} 无子可下，停一手 (值 {:.4})", side, value);
            return SearchResult {
                mv: Move::PASS,
                value,
                stats,
            };
        }

        let priors = if self.config.use_priors && self.evaluator.provides_priors() {
            self.priors(&ctx, board)
        } else {
            None
        };
        let order = order_moves(moves, priors.as_deref(), None);

        // 兜底：稳定顺序的第一个走法
        let fallback = MoveGenerator::apply(board, &order[0]);
        let mut best_index = 0;
        let mut best_value = Heuristic::DiscDifferential.evaluate(&fallback, side);
        let mut depth_reached = 0;
        let mut search_order: Vec<usize> = (0..order.len()).collect();

        for depth in 1..=max_depth {
            if depth > 1 && ctx.exhausted() {
                break;
            }
            ctx.enforce_budget.store(depth > 1, Ordering::Relaxed);
            let leaves_before = ctx.leaf_nodes.load(Ordering::Relaxed);

            match self.search_root(&ctx, board, &order, &search_order, depth) {
                Ok(values) => {
                    let (index, value) = pick_best(&values, self.config.tie_epsilon);
                    best_index = index;
                    best_value = value;
                    depth_reached = depth;
                    debug!(
                        "深度 {} 完成: 最佳 {} 值 {:.4} 节点 {}",
                        depth,
                        order[index],
                        value,
                        ctx.nodes.load(Ordering::Relaxed)
                    );

                    search_order.retain(|&i| i != index);
                    search_order.insert(0, index);

                    // 没有任何深度截断，整棵树已搜到终局
                    let resolved = ctx.leaf_nodes.load(Ordering::Relaxed) == leaves_before;
                    if order.len() == 1 || resolved {
                        break;
                    }
                }
                Err(reason) => {
                    debug!(
                        "深度 {} 中止 ({:?})，沿用深度 {} 的结果",
                        depth, reason, depth_reached
                    );
                    break;
                }
            }
        }

        let stats = ctx.stats(depth_reached, started);
        let mv = order[best_index];
        info!(
            "AI 选择 {} (值 {:.4}, 深度 {}, 节点 {}, 用时 {}ms)",
            mv, best_value, stats.depth_reached, stats.nodes, stats.elapsed_ms
        );

        SearchResult {
            mv,
            value: best_value,
            stats,
        }
    }

    /// 搜索根节点的一层，返回按稳定顺序排列的 (走法序号, 值)
    fn search_root(
        &self,
        ctx: &SearchContext,
        board: &Board,
        order: &[Move],
        search_order: &[usize],
        depth: u8,
    ) -> Result<Vec<(usize, f64)>, Aborted> {
        let first = search_order[0];
        let first_value = self.child_value(ctx, board, &order[first], depth, -WINDOW, WINDOW)?;
        let mut results = vec![(first, first_value)];
        let rest = &search_order[1..];

        match &self.pool {
            Some(pool) if rest.len() > 1 => {
                let shared_best = AtomicU64::new(first_value.to_bits());
                let parallel: Vec<Result<(usize, f64), Aborted>> = pool.install(|| {
                    rest.par_iter()
                        .map(|&i| {
                            let best = f64::from_bits(shared_best.load(Ordering::Relaxed));
                            let value =
                                self.child_value(ctx, board, &order[i], depth, self.tie_floor(best), WINDOW)?;
                            raise(&shared_best, value);
                            Ok((i, value))
                        })
                        .collect()
                });
                for result in parallel {
                    results.push(result?);
                }
            }
            _ => {
                let mut best = first_value;
                for &i in rest {
                    let value = self.child_value(ctx, board, &order[i], depth, self.tie_floor(best), WINDOW)?;
                    if value > best {
                        best = value;
                    }
                    results.push((i, value));
                }
            }
        }

        results.sort_by_key(|(i, _)| *i);
        Ok(results)
    }

    /// 低于此值的走法不可能进入平局容差
    fn tie_floor(&self, best: f64) -> f64 {
        best - self.config.tie_epsilon - TIE_MARGIN
    }

    /// 执行走法并从 `board` 走子方视角返回子局面的值
    fn child_value(
        &self,
        ctx: &SearchContext,
        board: &Board,
        mv: &Move,
        depth: u8,
        alpha: f64,
        beta: f64,
    ) -> Result<f64, Aborted> {
        let child = MoveGenerator::apply(board, mv);
        if child.side_to_move() == board.side_to_move() {
            // 对方停一手，仍由自己走
            self.negamax(ctx, &child, depth - 1, alpha, beta)
        } else {
            Ok(-self.negamax(ctx, &child, depth - 1, -beta, -alpha)?)
        }
    }

    /// Negamax + Alpha-Beta（fail-soft）
    fn negamax(
        &self,
        ctx: &SearchContext,
        board: &Board,
        depth: u8,
        mut alpha: f64,
        beta: f64,
    ) -> Result<f64, Aborted> {
        ctx.visit()?;
        let side = board.side_to_move();

        if let Some(outcome) = board.outcome() {
            ctx.terminal_nodes.fetch_add(1, Ordering::Relaxed);
            return Ok(outcome.score_for(side));
        }

        if depth == 0 {
            return Ok(self.evaluate_leaf(ctx, board));
        }

        let hash = ZobristTable::global().hash(board);
        let mut tt_move = None;
        if let Some(entry) = self.tt.probe(hash) {
            tt_move = entry.best_move;
            if entry.depth == depth {
                let usable = match entry.entry_type {
                    EntryType::Exact => true,
                    EntryType::LowerBound => entry.value >= beta,
                    EntryType::UpperBound => entry.value <= alpha,
                };
                if usable {
                    ctx.tt_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.value);
                }
            }
        }

        let moves = MoveGenerator::legal_moves_resolved(board, side);
        if moves.is_empty() {
            // 非终局时对方一定有子可下
            let passed = board.pass();
            return Ok(-self.negamax(ctx, &passed, depth - 1, -beta, -alpha)?);
        }

        let priors = self.node_priors(ctx, board, depth);
        let moves = order_moves(moves, priors.as_deref(), tt_move);

        let original_alpha = alpha;
        let mut best = f64::NEG_INFINITY;
        let mut best_move = None;

        for mv in &moves {
            let value = self.child_value(ctx, board, mv, depth, alpha, beta)?;
            if value > best {
                best = value;
                best_move = mv.index().map(|i| i as u8);
            }
            if value > alpha {
                alpha = value;
            }
            if alpha >= beta {
                break;
            }
        }

        let entry_type = if best <= original_alpha {
            EntryType::UpperBound
        } else if best >= beta {
            EntryType::LowerBound
        } else {
            EntryType::Exact
        };
        self.tt.store(hash, best, depth, entry_type, best_move);

        Ok(best)
    }

    /// 深度截断处的评估，失败时退回子数差
    fn evaluate_leaf(&self, ctx: &SearchContext, board: &Board) -> f64 {
        let side = board.side_to_move();
        ctx.leaf_nodes.fetch_add(1, Ordering::Relaxed);
        ctx.evaluator_calls.fetch_add(1, Ordering::Relaxed);

        match self.evaluator.evaluate(board, side, Some(ctx.deadline)) {
            Ok(response) => response.value,
            Err(err) => {
                ctx.record_failure(&self.evaluator, &err);
                Heuristic::DiscDifferential.evaluate(board, side)
            }
        }
    }

    /// 内部节点的先验，只在剩余深度足够时请求
    fn node_priors(&self, ctx: &SearchContext, board: &Board, depth: u8) -> Option<Vec<f32>> {
        if depth < 2 || !self.config.use_priors || !self.evaluator.provides_priors() {
            return None;
        }
        self.priors(ctx, board)
    }

    fn priors(&self, ctx: &SearchContext, board: &Board) -> Option<Vec<f32>> {
        ctx.evaluator_calls.fetch_add(1, Ordering::Relaxed);
        match self
            .evaluator
            .evaluate(board, board.side_to_move(), Some(ctx.deadline))
        {
            Ok(response) => response.priors,
            Err(err) => {
                ctx.record_failure(&self.evaluator, &err);
                None
            }
        }
    }

    /// 根节点无子可下：停一手后的局面再评估一层
    fn pass_value(&self, ctx: &SearchContext, board: &Board) -> f64 {
        ctx.nodes.fetch_add(1, Ordering::Relaxed);
        let side = board.side_to_move();
        let passed = board.pass();

        if let Some(outcome) = passed.outcome() {
            ctx.terminal_nodes.fetch_add(1, Ordering::Relaxed);
            return outcome.score_for(side);
        }
        -self.evaluate_leaf(ctx, &passed)
    }
}

/// 走法排序：置换表走法优先，然后按先验降序，同先验保持格子索引顺序
fn order_moves(mut moves: Vec<Move>, priors: Option<&[f32]>, first: Option<u8>) -> Vec<Move> {
    if let Some(priors) = priors {
        let prior = |mv: &Move| {
            mv.index()
                .and_then(|i| priors.get(i).copied())
                .unwrap_or(f32::MIN)
        };
        moves.sort_by(|a, b| prior(b).total_cmp(&prior(a)));
    }

    if let Some(first) = first {
        if let Some(pos) = moves.iter().position(|m| m.index() == Some(first as usize)) {
            let mv = moves.remove(pos);
            moves.insert(0, mv);
        }
    }

    moves
}

/// 取最大值；容差内的多个走法取稳定顺序中最靠前的
fn pick_best(values: &[(usize, f64)], epsilon: f64) -> (usize, f64) {
    let max = values
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);

    values
        .iter()
        .find(|(_, v)| *v >= max - epsilon)
        .copied()
        .unwrap_or((0, max))
}

/// 原子地提升共享下界
fn raise(shared: &AtomicU64, value: f64) {
    let mut current = shared.load(Ordering::Relaxed);
    while value > f64::from_bits(current) {
        match shared.compare_exchange_weak(current, value.to_bits(), Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}
