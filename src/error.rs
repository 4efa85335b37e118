//! 配置错误
//!
//! 仿真开始运行之前就能发现的用户可见错误（场景参数、拓扑引用等）。

use thiserror::Error;

use crate::net::{IfIndex, NodeId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "unknown split horizon strategy `{0}` (expected NoSplitHorizon, SplitHorizon or PoisonReverse)"
    )]
    UnknownSplitHorizon(String),
    #[error("unknown interface state `{0}` (expected up or down)")]
    UnknownIfState(String),
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("no node named `{0}`")]
    UnknownNodeName(String),
    #[error("node {node:?} has no interface {ifindex:?}")]
    UnknownInterface { node: NodeId, ifindex: IfIndex },
    #[error("interface {ifindex:?} of node {node:?} is the loopback and cannot change state")]
    LoopbackInterface { node: NodeId, ifindex: IfIndex },
    #[error("link needs at least two endpoints, got {0}")]
    TooFewEndpoints(usize),
    #[error("unknown topology `{0}` (expected chain, ring or square)")]
    UnknownTopology(String),
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    #[error("failed to parse scenario json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
}
