//! 对局管理
//!
//! 按对局 ID 保存控制器、配置和搜索引擎。AI 搜索在阻塞线程池中运行，
//! 搜索期间不持有对局锁，结果只在对局版本未变时执行。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use protocol::{MatchId, MatchRecord, Move, Position};
use reversi_ai::{Budget, CancelToken, Evaluator, SearchEngine, SearchStats};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::{MatchConfig, PlayerKind, ServerConfig};
use crate::error::{MatchError, Result};
use crate::events::{EventSink, JsonLinesSink, NullSink};
use crate::game::{MatchController, MatchState};

/// AI 走法结果
#[derive(Debug, Clone, Serialize)]
pub struct AiMove {
    pub mv: Move,
    /// 走子方视角的估值
    pub value: f64,
    pub stats: SearchStats,
    /// 落子后的状态
    pub state: MatchState,
}

/// 单个对局
struct MatchSlot {
    controller: MatchController,
    config: MatchConfig,
    /// 对局结束后释放
    engine: Option<Arc<SearchEngine>>,
    /// 正在进行的搜索
    search: Option<ActiveSearch>,
    /// 下一次搜索的代号
    next_search: u64,
}

struct ActiveSearch {
    generation: u64,
    cancel: CancelToken,
}

impl MatchSlot {
    fn is_thinking(&self) -> bool {
        self.search.is_some()
    }

    /// 只释放指定代号的搜索，较晚结束的旧搜索不会清掉新搜索
    fn release_search(&mut self, generation: u64) {
        if self.search.as_ref().is_some_and(|s| s.generation == generation) {
            self.search = None;
        }
    }
}

/// 请求在搜索完成前被丢弃（任务中止、超时）时取消搜索并释放对局
struct SearchGuard {
    slot: Arc<Mutex<MatchSlot>>,
    generation: u64,
    cancel: CancelToken,
    armed: bool,
}

impl SearchGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SearchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();

        let generation = self.generation;
        if let Ok(mut slot) = self.slot.try_lock() {
            slot.release_search(generation);
            return;
        }
        // 锁被占用时交给运行时稍后释放
        let slot = Arc::clone(&self.slot);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    slot.lock().await.release_search(generation);
                });
            }
            Err(_) => warn!("无法释放被丢弃的 AI 搜索 (代号 {})", generation),
        }
    }
}

/// 对局管理器
pub struct MatchManager {
    matches: RwLock<HashMap<MatchId, Arc<Mutex<MatchSlot>>>>,
    next_id: AtomicU64,
    sink: Arc<dyn EventSink>,
    defaults: MatchConfig,
}

impl MatchManager {
    pub fn new(sink: Arc<dyn EventSink>, defaults: MatchConfig) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sink,
            defaults,
        }
    }

    /// 按服务配置创建，配置了事件日志时写入 JSON Lines 文件
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let sink: Arc<dyn EventSink> = match &config.event_log {
            Some(path) => Arc::new(JsonLinesSink::open(path)?),
            None => Arc::new(NullSink),
        };
        Ok(Self::new(sink, config.default_match.clone()))
    }

    /// 创建对局，评估器按配置构建
    pub async fn create_match(&self, config: MatchConfig) -> Result<MatchId> {
        let evaluator = config
            .evaluator
            .build(&config.inference)
            .map_err(|e| MatchError::InvalidConfig {
                reason: format!("{:#}", e),
            })?;
        self.create_match_with(config, evaluator).await
    }

    /// 使用默认配置创建对局
    pub async fn create_default_match(&self) -> Result<MatchId> {
        self.create_match(self.defaults.clone()).await
    }

    /// 使用外部构建的评估器创建对局（忽略 `config.evaluator`）
    pub async fn create_match_with(&self, config: MatchConfig, evaluator: Evaluator) -> Result<MatchId> {
        let board = config
            .initial_board()
            .map_err(|e| MatchError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let controller = MatchController::new(id, board, self.sink.clone())?;
        let engine = if config.has_ai() && !controller.is_finished() {
            Some(Arc::new(SearchEngine::new(config.search.clone(), evaluator)))
        } else {
            None
        };

        info!(
            "创建对局 {}: 黑方 {:?}，白方 {:?}",
            id, config.black, config.white
        );
        let slot = MatchSlot {
            controller,
            config,
            engine,
            search: None,
            next_search: 0,
        };
        self.matches.write().await.insert(id, Arc::new(Mutex::new(slot)));
        Ok(id)
    }

    async fn slot(&self, id: MatchId) -> Result<Arc<Mutex<MatchSlot>>> {
        self.matches
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(MatchError::NotFound(id))
    }

    /// 人类玩家落子
    pub async fn submit_move(&self, id: MatchId, pos: Position) -> Result<MatchState> {
        let slot = self.slot(id).await?;
        let mut slot = slot.lock().await;

        if let Some(outcome) = slot.controller.outcome() {
            return Err(MatchError::Finished(outcome));
        }
        let side = slot.controller.board().side_to_move();
        if slot.config.player(side) == PlayerKind::Ai {
            return Err(MatchError::NotHumanTurn { side });
        }

        slot.controller.submit(pos)?;
        if slot.controller.is_finished() {
            slot.engine = None;
        }
        let thinking = slot.is_thinking();
        Ok(slot.controller.snapshot(thinking))
    }

    /// 让 AI 为当前走子方走一步
    ///
    /// `budget` 为 None 时使用对局的搜索配置。
    pub async fn request_ai_move(&self, id: MatchId, budget: Option<Budget>) -> Result<AiMove> {
        let slot = self.slot(id).await?;

        let (engine, board, version_before, mut guard) = {
            let mut locked = slot.lock().await;
            let slot_ref = &mut *locked;

            if let Some(outcome) = slot_ref.controller.outcome() {
                return Err(MatchError::Finished(outcome));
            }
            let side = slot_ref.controller.board().side_to_move();
            if slot_ref.config.player(side) != PlayerKind::Ai {
                return Err(MatchError::NotAiTurn { side });
            }
            if slot_ref.is_thinking() {
                return Err(MatchError::SearchInProgress(id));
            }
            let engine = slot_ref.engine.clone().ok_or(MatchError::NotAiTurn { side })?;

            let generation = slot_ref.next_search;
            slot_ref.next_search += 1;
            let cancel = CancelToken::new();
            slot_ref.search = Some(ActiveSearch {
                generation,
                cancel: cancel.clone(),
            });
            let guard = SearchGuard {
                slot: Arc::clone(&slot),
                generation,
                cancel,
                armed: true,
            };
            (
                engine,
                *slot_ref.controller.board(),
                slot_ref.controller.version(),
                guard,
            )
        };

        let budget = budget.unwrap_or_default();
        let worker_cancel = guard.cancel.clone();
        let joined =
            tokio::task::spawn_blocking(move || engine.search_with(&board, &budget, &worker_cancel)).await;

        let mut slot = slot.lock().await;
        slot.release_search(guard.generation);
        guard.disarm();

        let result = joined.map_err(|e| MatchError::Worker(e.to_string()))?;
        if guard.cancel.is_cancelled() {
            info!("对局 {}: AI 搜索已取消，丢弃结果", id);
            return Err(MatchError::SearchCancelled(id));
        }
        if slot.controller.version() != version_before {
            warn!("对局 {}: AI 计算期间对局状态已改变，丢弃 AI 走法", id);
            return Err(MatchError::StateChanged(id));
        }

        let mv = slot.controller.apply_move(result.mv)?;
        if slot.controller.is_finished() {
            slot.engine = None;
        }

        Ok(AiMove {
            mv,
            value: result.value,
            stats: result.stats,
            state: slot.controller.snapshot(false),
        })
    }

    /// 获取对局状态
    pub async fn get_state(&self, id: MatchId) -> Result<MatchState> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(slot.controller.snapshot(slot.is_thinking()))
    }

    /// 获取棋谱
    pub async fn record(&self, id: MatchId) -> Result<MatchRecord> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(slot.controller.record().clone())
    }

    /// 取消正在进行的搜索，返回是否有搜索被取消
    pub async fn cancel_search(&self, id: MatchId) -> Result<bool> {
        let slot = self.slot(id).await?;
        let slot = slot.lock().await;
        Ok(match &slot.search {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        })
    }

    /// 关闭对局并释放资源，返回棋谱
    pub async fn close_match(&self, id: MatchId) -> Result<MatchRecord> {
        let slot = self
            .matches
            .write()
            .await
            .remove(&id)
            .ok_or(MatchError::NotFound(id))?;

        let mut slot = slot.lock().await;
        if let Some(active) = slot.search.take() {
            active.cancel.cancel();
        }
        slot.engine = None;
        info!("关闭对局 {}", id);
        Ok(slot.controller.record().clone())
    }

    /// 当前对局数
    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }
}
