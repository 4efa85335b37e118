//! 节点类型
//!
//! 节点持有有序的接口列表、一张转发表，以及（可选的）距离向量协议实例。
//! 未运行距离向量协议的节点由全局路由（链路状态）统一写表。

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::fib::ForwardingTable;
use super::id::{IfIndex, NodeId};
use super::interface::Interface;
use crate::routing::dv::DistanceVector;

/// 节点类型（主机只是不转发路由协议报文的节点，数据面行为相同）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Router,
    Host,
}

/// 网络节点
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub interfaces: Vec<Interface>,
    pub fib: ForwardingTable,
    pub(crate) dv: Option<DistanceVector>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>, kind: NodeKind, loopback: Interface) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            interfaces: vec![loopback],
            fib: ForwardingTable::new(),
            dv: None,
        }
    }

    pub fn interface(&self, ifindex: IfIndex) -> Option<&Interface> {
        self.interfaces.get(ifindex.0)
    }

    /// loopback 地址，同时作为节点的路由器标识
    pub fn router_addr(&self) -> Ipv4Addr {
        self.interfaces[IfIndex::LOOPBACK.0].addr
    }

    /// 地址是否属于本节点某个处于 Up 状态的接口
    pub fn owns_addr(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|i| i.is_up() && i.addr == addr)
    }

    pub fn distance_vector(&self) -> Option<&DistanceVector> {
        self.dv.as_ref()
    }
}
