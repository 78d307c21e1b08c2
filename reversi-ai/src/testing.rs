//! 测试用的推理后端替身

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use protocol::{EvaluationRequest, EvaluationResponse, Layout};

use crate::error::EvaluatorError;
use crate::evaluate::Heuristic;
use crate::inference::InferenceBackend;

/// 总是返回固定值（和固定先验）
pub struct FixedBackend {
    value: f64,
    priors: Option<Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl FixedBackend {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            priors: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_priors(value: f64, priors: Vec<f32>) -> Self {
        Self {
            value,
            priors: Some(priors),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn infer(&self, _: &EvaluationRequest, _: Duration) -> Result<EvaluationResponse, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EvaluationResponse {
            value: self.value,
            priors: self.priors.clone(),
        })
    }
}

/// 总是失败
pub struct FailingBackend {
    calls: Arc<AtomicUsize>,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn infer(&self, _: &EvaluationRequest, _: Duration) -> Result<EvaluationResponse, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(EvaluatorError::unavailable("backend offline"))
    }
}

/// 忽略超时参数，睡眠后才返回
pub struct SlowBackend {
    delay: Duration,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl InferenceBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    fn infer(&self, _: &EvaluationRequest, _: Duration) -> Result<EvaluationResponse, EvaluatorError> {
        std::thread::sleep(self.delay);
        Ok(EvaluationResponse::new(0.0))
    }
}

/// 睡眠后返回，并记录同时进行的调用数及其峰值
pub struct CountingBackend {
    delay: Duration,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl CountingBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            live: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn live(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    pub fn peak(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.peak)
    }
}

impl InferenceBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn infer(&self, _: &EvaluationRequest, _: Duration) -> Result<EvaluationResponse, EvaluatorError> {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(EvaluationResponse::new(0.0))
    }
}

/// 把请求还原成棋盘后用加权启发式评估，结果确定
pub struct HeuristicBackend;

impl InferenceBackend for HeuristicBackend {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn infer(
        &self,
        request: &EvaluationRequest,
        _: Duration,
    ) -> Result<EvaluationResponse, EvaluatorError> {
        let side = request
            .side()
            .ok_or_else(|| EvaluatorError::unavailable("bad side"))?;
        let rows: Vec<String> = request
            .cells
            .chunks(8)
            .map(|row| {
                row.iter()
                    .map(|c| match c {
                        1 => 'B',
                        -1 => 'W',
                        _ => '.',
                    })
                    .collect()
            })
            .collect();
        let layout = format!("{} {}", rows.join("/"), side.to_layout_char());
        let board = Layout::parse(&layout).map_err(|e| EvaluatorError::unavailable(e.to_string()))?;
        Ok(EvaluationResponse::new(Heuristic::Weighted.evaluate(&board, side)))
    }
}
