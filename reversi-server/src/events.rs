//! 事件发送
//!
//! 对局把事件交给外部持久化层后继续进行，发送失败只记录日志。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use protocol::MatchEvent;
use tokio::sync::mpsc;
use tracing::warn;

/// 事件接收方
pub trait EventSink: Send + Sync {
    /// 发送事件，不能阻塞对局
    fn emit(&self, event: &MatchEvent);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _: &MatchEvent) {}
}

/// 通过 tokio 通道转发事件，通道满或已关闭时丢弃
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<MatchEvent>,
}

impl ChannelSink {
    /// 创建通道和对应的接收端
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MatchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &MatchEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            warn!("事件通道不可用，丢弃对局 {} 的事件: {}", event.match_id(), e);
        }
    }
}

/// 追加写入 JSON Lines 文件
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// 打开（或创建）事件日志
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("无法创建事件日志目录: {:?}", parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("无法打开事件日志: {:?}", path))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, event: &MatchEvent) -> Result<()> {
        let line = event.to_json_line().context("序列化事件失败")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("事件日志锁已损坏"))?;
        writeln!(file, "{}", line).context("写入事件日志失败")?;
        Ok(())
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &MatchEvent) {
        if let Err(e) = self.write_line(event) {
            warn!("事件写入 {:?} 失败: {:#}", self.path, e);
        }
    }
}

/// 把事件保存在内存里，供测试检查
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<MatchEvent>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<MatchEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: &MatchEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use protocol::{GameOutcome, MoveRecord, Side};
    use tempfile::TempDir;

    fn finished(match_id: u64) -> MatchEvent {
        MatchEvent::Finished {
            match_id,
            outcome: GameOutcome::Draw,
            black: 32,
            white: 32,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");

        let sink = JsonLinesSink::open(&path).unwrap();
        sink.emit(&MatchEvent::MoveApplied {
            match_id: 1,
            seq: 1,
            mv: MoveRecord::pass(Side::White),
            board_hash: 5,
            at: Utc::now(),
        });
        sink.emit(&finished(1));
        drop(sink);

        // 重新打开后继续追加
        JsonLinesSink::open(&path).unwrap().emit(&finished(2));

        let content = std::fs::read_to_string(&path).unwrap();
        let events: Vec<MatchEvent> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].match_id(), 1);
        assert!(matches!(events[1], MatchEvent::Finished { .. }));
        assert_eq!(events[2].match_id(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelSink::channel(1);
        sink.emit(&finished(3));
        // 通道已满，第二个事件被丢弃而不是阻塞
        sink.emit(&finished(4));

        assert_eq!(rx.recv().await.unwrap().match_id(), 3);
        assert!(rx.try_recv().is_err());

        drop(rx);
        sink.emit(&finished(5));
    }
}
