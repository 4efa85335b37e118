//! 网络模拟模块
//!
//! 此模块包含网络模拟的核心组件：节点、接口、链路、转发表、拓扑变更注入，
//! 以及用于观察连通性的极简数据面。

// 子模块声明
mod deliver_packet;
mod echo;
mod fib;
mod id;
mod inject;
mod interface;
mod link;
mod net_world;
mod network;
mod node;
mod packet;
mod stats;

// 重新导出公共接口
pub use deliver_packet::DeliverPacket;
pub use echo::EchoClient;
pub use fib::{FibChange, ForwardingTable, INFINITY_METRIC, NoRoute, Route, RouteSource};
pub use id::{IfIndex, LinkId, NodeId};
pub use inject::{LinkStateChange, schedule_link_state_change};
pub use interface::{IfState, Interface};
pub use link::{Link, LinkKind};
pub use net_world::NetWorld;
pub use network::{Network, TopologyChange};
pub use node::{Node, NodeKind};
pub use packet::{DEFAULT_TTL, Packet, PacketKind};
pub use stats::Stats;
