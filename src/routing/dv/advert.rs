//! 距离向量通告报文

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;

use crate::net::{IfIndex, LinkId, NodeId};
use crate::sim::SimTime;

/// 单个报文最多携带的路由条目数，超出的表会被拆成多个报文
pub const MAX_ENTRIES_PER_MESSAGE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvCommand {
    /// 请求对端立即回送完整路由表（接口恢复时发送）
    Request,
    Response,
}

/// (目的网段, 度量)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertEntry {
    pub dest: Ipv4Net,
    pub metric: u32,
}

/// 在距离向量邻居之间交换的通告
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub command: DvCommand,
    pub sender: NodeId,
    pub sender_if: IfIndex,
    pub sender_addr: Ipv4Addr,
    pub entries: Vec<AdvertEntry>,
    pub sent_at: SimTime,
}

impl Advertisement {
    /// 报文长度：IP/UDP 头 28 字节 + 4 字节头 + 每条目 20 字节
    pub fn size_bytes(&self) -> u32 {
        28 + 4 + 20 * self.entries.len() as u32
    }
}

/// 收到的通告与拓扑不符。记录后丢弃，协议继续运行。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedAdvertisement {
    #[error("receiver {node:?} has no interface {ifindex:?}")]
    UnknownInterface { node: NodeId, ifindex: IfIndex },
    #[error("interface {ifindex:?} of {node:?} is not attached to link {link:?}")]
    WrongLink {
        node: NodeId,
        ifindex: IfIndex,
        link: LinkId,
    },
    #[error("sender {sender:?}/{sender_if:?} is not attached to link {link:?}")]
    UnknownSender {
        sender: NodeId,
        sender_if: IfIndex,
        link: LinkId,
    },
    #[error("entry for {dest} carries metric {metric} above infinity")]
    MetricOutOfRange { dest: Ipv4Net, metric: u32 },
}
