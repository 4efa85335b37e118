//! 方形拓扑
//!
//! ```text
//!        A ---- B
//!      / |    / | \
//!     T  |  /   |  R
//!      \ |/     | /
//!        C ---- D
//! ```
//!
//! 路由器 A-B-D-C 构成一个环，另有对角线 A-D、C-B；主机 T 双归属到 A、C，R 双归属到 B、D。

use crate::error::ConfigError;
use crate::net::{LinkId, NetWorld, NodeId};

use super::{LinkOpts, attach_host, link};

#[derive(Debug, Clone)]
pub struct Square {
    pub t: NodeId,
    pub r: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub c: NodeId,
    pub d: NodeId,
    /// 按创建顺序：T-A、A-B、B-R、T-C、C-D、D-R、A-D、C-B
    pub links: Vec<LinkId>,
}

/// 构建方形拓扑
///
/// 各路由器的接口编号由链路创建顺序决定：A 的 if1 朝向 T、B 的 if1 连 A、
/// C 的 if1 朝向 T、D 的 if1 连 C。主机只在第一条链路上配默认路由。
pub fn build_square(world: &mut NetWorld, opts: &LinkOpts) -> Result<Square, ConfigError> {
    let net = &mut world.net;
    let t = net.add_host("T");
    let r = net.add_host("R");
    let a = net.add_router("A");
    let b = net.add_router("B");
    let c = net.add_router("C");
    let d = net.add_router("D");

    let mut links = Vec::with_capacity(8);
    for (x, y) in [(t, a), (a, b), (b, r), (t, c), (c, d), (d, r), (a, d), (c, b)] {
        links.push(link(net, x, y, opts)?);
    }

    attach_host(net, t, links[0])?;
    attach_host(net, r, links[2])?;
    // 第二归属链路同样不交换路由报文
    for (host, l) in [(t, links[3]), (r, links[5])] {
        let router_end = net
            .link(l)
            .and_then(|l| l.peers_of(host).next())
            .ok_or_else(|| ConfigError::InvalidScenario(format!("link {l:?} has no peer")))?;
        net.exclude_interface(router_end.0, router_end.1)?;
    }

    Ok(Square {
        t,
        r,
        a,
        b,
        c,
        d,
        links,
    })
}
