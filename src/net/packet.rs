//! 数据包类型
//!
//! 只为观察路由可达性而存在的极简数据报：逐跳按转发表查下一跳。

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::sim::SimTime;

pub const DEFAULT_TTL: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    EchoRequest,
    EchoReply,
}

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow_id: u64,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub size_bytes: u32,
    pub ttl: u8,
    pub kind: PacketKind,
    /// 请求发出的时间；应答沿用该值以计算 RTT
    pub sent_at: SimTime,
    pub hops_taken: u32,
}
