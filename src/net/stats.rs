//! 统计信息
//!
//! 定义网络仿真统计数据结构。

/// 网络统计信息
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    pub dropped_no_route: u64,
    pub dropped_link_down: u64,
    pub dropped_ttl: u64,
    pub echo_requests: u64,
    pub echo_replies: u64,
    /// 发出的距离向量报文数
    pub dv_messages: u64,
    /// 被丢弃的畸形通告
    pub dv_malformed: u64,
}

impl Stats {
    pub fn dropped_pkts(&self) -> u64 {
        self.dropped_no_route + self.dropped_link_down + self.dropped_ttl
    }
}
