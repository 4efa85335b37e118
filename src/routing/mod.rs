//! 路由引擎
//!
//! - [`dv`]：分布式距离向量协议（类 RIP），每个路由器一个实例；
//! - [`global`]：集中式链路状态 oracle，拓扑一变就全量重算所有最短路径。
//!
//! 两者都只通过节点的转发表对外生效，上层看到的转发语义一致。

pub mod dv;
pub mod global;
