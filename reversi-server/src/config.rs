//! 服务配置
//!
//! 配置以 JSON 保存，缺失字段使用默认值；文件不存在或格式错误时退回默认配置。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protocol::{Board, Layout, Side};
use reversi_ai::{EvaluatorSpec, InferenceConfig, SearchConfig};
use serde::{Deserialize, Serialize};

/// 玩家类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    /// 通过 `submit_move` 落子
    #[default]
    Human,
    /// 通过 `request_ai_move` 由搜索引擎落子
    Ai,
}

/// 单局配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub black: PlayerKind,
    pub white: PlayerKind,
    pub search: SearchConfig,
    pub evaluator: EvaluatorSpec,
    pub inference: InferenceConfig,
    /// 自定义开局（棋盘文本格式），缺省为标准开局
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_layout: Option<String>,
}

impl MatchConfig {
    /// 人类执黑对 AI
    pub fn human_vs_ai() -> Self {
        Self {
            black: PlayerKind::Human,
            white: PlayerKind::Ai,
            ..Default::default()
        }
    }

    /// 指定阵营的玩家类型
    pub fn player(&self, side: Side) -> PlayerKind {
        match side {
            Side::Black => self.black,
            Side::White => self.white,
        }
    }

    /// 是否有 AI 参与
    pub fn has_ai(&self) -> bool {
        self.black == PlayerKind::Ai || self.white == PlayerKind::Ai
    }

    /// 开局棋盘
    pub fn initial_board(&self) -> std::result::Result<Board, protocol::ReversiError> {
        match &self.initial_layout {
            Some(layout) => Layout::parse(layout),
            None => Ok(Board::initial()),
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            black: PlayerKind::Human,
            white: PlayerKind::Ai,
            search: SearchConfig::default(),
            evaluator: EvaluatorSpec::default(),
            inference: InferenceConfig::default(),
            initial_layout: None,
        }
    }
}

/// 服务配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `create_match` 未指定配置时使用
    pub default_match: MatchConfig,
    /// 事件日志文件（JSON Lines），None 表示不记录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
}

impl ServerConfig {
    /// 从文件加载配置，失败时使用默认配置
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("已加载配置: {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("配置文件格式无效: {}，使用默认配置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取配置文件 {:?}: {}，使用默认配置", path, e);
                Self::default()
            }
        }
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self).context("序列化配置失败")?;
        std::fs::write(path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;

        tracing::info!("配置已保存: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reversi_ai::Heuristic;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.player(Side::Black), PlayerKind::Human);
        assert_eq!(config.player(Side::White), PlayerKind::Ai);
        assert!(config.has_ai());
        assert_eq!(config.initial_board().unwrap(), Board::initial());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "default_match": {
                "black": "ai",
                "search": { "max_depth": 2 },
                "evaluator": { "kind": "static", "heuristic": "disc_differential" }
            }
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.default_match.black, PlayerKind::Ai);
        assert_eq!(config.default_match.white, PlayerKind::Ai);
        assert_eq!(config.default_match.search.max_depth, 2);
        assert_eq!(
            config.default_match.evaluator,
            EvaluatorSpec::Static {
                heuristic: Heuristic::DiscDifferential
            }
        );
        assert!(config.event_log.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("server.json");

        let mut config = ServerConfig::default();
        config.default_match.initial_layout = Some("8/8/8/3WB3/3BW3/8/8/8 w".to_string());
        config.event_log = Some(dir.path().join("events.jsonl"));
        config.save(&path).unwrap();

        assert_eq!(ServerConfig::load(&path), config);
    }

    #[test]
    fn test_load_falls_back() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ServerConfig::load(&dir.path().join("missing.json")), ServerConfig::default());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert_eq!(ServerConfig::load(&bad), ServerConfig::default());
    }

    #[test]
    fn test_invalid_layout() {
        let config = MatchConfig {
            initial_layout: Some("8/8 b".to_string()),
            ..Default::default()
        };
        assert!(config.initial_board().is_err());
    }
}
