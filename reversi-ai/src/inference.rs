//! 推理评估适配器
//!
//! 把外部推理后端（神经网络服务、本地运行时等）包装成搜索可用的评估器：
//! - 每次调用有硬超时，取 `call_timeout_ms` 与搜索剩余时间的较小值
//! - 连续失败达到阈值后熔断，本次搜索内不再调用后端
//! - 按 Zobrist 哈希缓存响应
//! - 后端调用在固定数量的工作线程上执行，超时的调用不会堆积新线程

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use protocol::{Board, EvaluationRequest, EvaluationResponse, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EvaluatorError;
use crate::zobrist::ZobristTable;

/// 推理后端
///
/// 实现方应尽量在 `timeout` 内返回；适配器在工作线程上调用并强制超时，
/// 超时后的结果被丢弃。
pub trait InferenceBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 执行一次推理
    fn infer(
        &self,
        request: &EvaluationRequest,
        timeout: Duration,
    ) -> Result<EvaluationResponse, EvaluatorError>;
}

/// 推理适配器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// 单次调用的超时（毫秒）
    pub call_timeout_ms: u64,
    /// 连续失败多少次后熔断，0 表示不熔断
    pub failure_threshold: u32,
    /// 响应缓存容量，0 表示不缓存
    pub cache_capacity: usize,
    /// 调用后端的工作线程数，同时进行的调用不超过该值
    pub workers: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 200,
            failure_threshold: 3,
            cache_capacity: 65536,
            workers: 2,
        }
    }
}

type Reply = Result<EvaluationResponse, EvaluatorError>;

/// 一次排队中的后端调用
struct Job {
    request: EvaluationRequest,
    timeout: Duration,
    /// 调用方放弃等待的时刻，出队时已过期则不再调用后端
    expires: Instant,
    reply: mpsc::SyncSender<Reply>,
}

/// 固定大小的后端调用线程池
///
/// 释放时关闭队列并等待正在进行的调用结束。
struct WorkerPool {
    jobs: Option<mpsc::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(backend: &Arc<dyn InferenceBackend>, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let backend = Arc::clone(backend);
            let rx = Arc::clone(&rx);
            let spawned = std::thread::Builder::new()
                .name(format!("reversi-inference-{}", i))
                .spawn(move || worker_loop(backend, rx));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!("推理工作线程启动失败: {}", e),
            }
        }

        Self {
            jobs: if handles.is_empty() { None } else { Some(tx) },
            handles,
        }
    }

    fn submit(&self, job: Job) -> bool {
        match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(backend: Arc<dyn InferenceBackend>, jobs: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(rx) = jobs.lock() else { return };
            match rx.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };
        if Instant::now() >= job.expires {
            continue;
        }

        // 调用方可能已经超时离开
        let _ = job.reply.send(backend.infer(&job.request, job.timeout));
    }
}

/// 推理评估器
pub struct InferenceEvaluator {
    backend: Arc<dyn InferenceBackend>,
    config: InferenceConfig,
    cache: Mutex<HashMap<u64, EvaluationResponse>>,
    consecutive_failures: AtomicU32,
    calls: AtomicU64,
    failures: AtomicU64,
    pool: WorkerPool,
}

impl InferenceEvaluator {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: InferenceConfig) -> Self {
        let pool = WorkerPool::new(&backend, config.workers);
        Self {
            backend,
            config,
            cache: Mutex::new(HashMap::new()),
            consecutive_failures: AtomicU32::new(0),
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            pool,
        }
    }

    /// 后端名称
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// 新一次搜索开始时重置熔断状态
    pub fn begin_search(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// 是否已熔断
    pub fn is_tripped(&self) -> bool {
        self.config.failure_threshold > 0
            && self.consecutive_failures.load(Ordering::Relaxed) >= self.config.failure_threshold
    }

    /// 实际调用后端的次数
    pub fn backend_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// 后端失败次数（含超时）
    pub fn backend_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// 清空缓存
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// 评估局面（`side` 视角）
    pub fn evaluate(
        &self,
        board: &Board,
        side: Side,
        deadline: Option<Instant>,
    ) -> Result<EvaluationResponse, EvaluatorError> {
        let key = ZobristTable::global().hash(&board.with_side_to_move(side));
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }

        if self.is_tripped() {
            return Err(EvaluatorError::unavailable(format!(
                "circuit open after {} consecutive failures of {}",
                self.config.failure_threshold,
                self.backend.name()
            )));
        }

        let mut timeout = Duration::from_millis(self.config.call_timeout_ms);
        if let Some(deadline) = deadline {
            timeout = timeout.min(deadline.saturating_duration_since(Instant::now()));
        }
        if timeout.is_zero() {
            return Err(EvaluatorError::Timeout {
                elapsed_ms: 0,
                limit_ms: 0,
            });
        }

        let request = EvaluationRequest::from_board(board, side);
        let result = self
            .call_backend(request, timeout)
            .and_then(|response| response.validated().map_err(EvaluatorError::from));

        match result {
            Ok(response) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.remember(key, &response);
                Ok(response)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("推理失败 ({}, 连续 {} 次): {}", self.backend.name(), failures, err);
                Err(err)
            }
        }
    }

    /// 交给工作线程调用后端，超时即返回（排队时间也计入超时）
    fn call_backend(&self, request: EvaluationRequest, timeout: Duration) -> Reply {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = mpsc::sync_channel(1);
        let started = Instant::now();
        let job = Job {
            request,
            timeout,
            expires: started + timeout,
            reply: tx,
        };
        if !self.pool.submit(job) {
            return Err(EvaluatorError::unavailable(format!(
                "no inference worker available for {}",
                self.backend.name()
            )));
        }

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EvaluatorError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
                limit_ms: timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(EvaluatorError::unavailable(format!(
                "{} dropped the call without a response",
                self.backend.name()
            ))),
        }
    }

    fn cached(&self, key: u64) -> Option<EvaluationResponse> {
        if self.config.cache_capacity == 0 {
            return None;
        }
        self.cache.lock().ok()?.get(&key).cloned()
    }

    fn remember(&self, key: u64, response: &EvaluationResponse) {
        if self.config.cache_capacity == 0 {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= self.config.cache_capacity {
                cache.clear();
            }
            cache.insert(key, response.clone());
        }
    }
}

impl std::fmt::Debug for InferenceEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEvaluator")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("workers", &self.pool.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingBackend, FailingBackend, FixedBackend, SlowBackend};

    fn evaluator(backend: impl InferenceBackend + 'static, config: InferenceConfig) -> InferenceEvaluator {
        InferenceEvaluator::new(Arc::new(backend), config)
    }

    #[test]
    fn test_successful_call_and_cache() {
        let backend = FixedBackend::new(0.25);
        let calls = backend.calls();
        let eval = evaluator(backend, InferenceConfig::default());

        let board = Board::initial();
        let first = eval.evaluate(&board, Side::Black, None).unwrap();
        let second = eval.evaluate(&board, Side::Black, None).unwrap();

        assert_eq!(first.value, 0.25);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "第二次应命中缓存");
        assert_eq!(eval.backend_calls(), 1);

        // 走子方不同，缓存键不同
        eval.evaluate(&board, Side::White, None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_value_is_clamped() {
        let eval = evaluator(FixedBackend::new(4.0), InferenceConfig::default());
        let response = eval.evaluate(&Board::initial(), Side::Black, None).unwrap();
        assert_eq!(response.value, 1.0);
    }

    #[test]
    fn test_malformed_priors_are_unavailable() {
        let eval = evaluator(
            FixedBackend::with_priors(0.0, vec![0.5; 3]),
            InferenceConfig::default(),
        );
        let err = eval.evaluate(&Board::initial(), Side::Black, None).unwrap_err();
        assert!(matches!(err, EvaluatorError::Unavailable { .. }));
    }

    #[test]
    fn test_slow_backend_times_out() {
        let config = InferenceConfig {
            call_timeout_ms: 20,
            ..Default::default()
        };
        let eval = evaluator(SlowBackend::new(Duration::from_millis(500)), config);

        let started = Instant::now();
        let err = eval.evaluate(&Board::initial(), Side::Black, None).unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn test_expired_deadline_skips_backend() {
        let backend = FixedBackend::new(0.1);
        let calls = backend.calls();
        let eval = evaluator(backend, InferenceConfig::default());

        let deadline = Instant::now() - Duration::from_millis(1);
        let err = eval.evaluate(&Board::initial(), Side::Black, Some(deadline)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_circuit_breaker() {
        let backend = FailingBackend::new();
        let calls = backend.calls();
        let config = InferenceConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        let eval = evaluator(backend, config);
        let board = Board::initial();

        for _ in 0..5 {
            assert!(eval.evaluate(&board, Side::Black, None).is_err());
        }
        assert!(eval.is_tripped());
        assert_eq!(calls.load(Ordering::SeqCst), 2, "熔断后不再调用后端");
        assert_eq!(eval.backend_failures(), 2);

        eval.begin_search();
        assert!(!eval.is_tripped());
        assert!(eval.evaluate(&board, Side::Black, None).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_timed_out_calls_are_bounded_and_joined_on_drop() {
        let backend = CountingBackend::new(Duration::from_millis(150));
        let (live, peak) = (backend.live(), backend.peak());
        let config = InferenceConfig {
            call_timeout_ms: 10,
            workers: 2,
            ..Default::default()
        };
        let eval = evaluator(backend, config);

        let board = Board::initial();
        for _ in 0..6 {
            let err = eval.evaluate(&board, Side::Black, None).unwrap_err();
            assert!(err.is_timeout());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2, "同时进行的调用不超过工作线程数");

        drop(eval);
        assert_eq!(live.load(Ordering::SeqCst), 0, "释放后不再有进行中的调用");
    }
}
