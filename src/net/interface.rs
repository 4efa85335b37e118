//! 接口类型
//!
//! 接口属于唯一的节点，最多挂在一条链路上（loopback 不挂链路）。

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use super::id::{IfIndex, LinkId, NodeId};
use crate::error::ConfigError;

/// 接口运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfState {
    Up,
    Down,
}

impl IfState {
    pub fn is_up(self) -> bool {
        self == IfState::Up
    }
}

impl fmt::Display for IfState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IfState::Up => f.write_str("up"),
            IfState::Down => f.write_str("down"),
        }
    }
}

impl FromStr for IfState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(IfState::Up),
            "down" => Ok(IfState::Down),
            _ => Err(ConfigError::UnknownIfState(s.to_string())),
        }
    }
}

/// 网络接口
#[derive(Debug, Clone)]
pub struct Interface {
    pub node: NodeId,
    pub index: IfIndex,
    /// 所连接的链路；loopback 为 None
    pub link: Option<LinkId>,
    pub addr: Ipv4Addr,
    /// 接口所在网段（已做 trunc）
    pub prefix: Ipv4Net,
    pub state: IfState,
    /// 不参与距离向量协议的报文交换（例如路由器朝向主机的接口）。
    /// 该接口的直连网段仍会被通告。
    pub dv_excluded: bool,
}

impl Interface {
    pub fn new(node: NodeId, index: IfIndex, link: Option<LinkId>, addr: Ipv4Net) -> Self {
        Self {
            node,
            index,
            link,
            addr: addr.addr(),
            prefix: addr.trunc(),
            state: IfState::Up,
            dv_excluded: false,
        }
    }

    pub fn is_up(&self) -> bool {
        self.state.is_up()
    }

    pub fn is_loopback(&self) -> bool {
        self.index == IfIndex::LOOPBACK
    }
}
