//! 链式拓扑：src - R0 - R1 - ... - Rn-1 - dst

use crate::error::ConfigError;
use crate::net::{NetWorld, NodeId};

use super::{LinkOpts, attach_host, link, router_name};

#[derive(Debug, Clone)]
pub struct Chain {
    pub src: NodeId,
    pub dst: NodeId,
    pub routers: Vec<NodeId>,
}

/// 构建链式拓扑
///
/// 节点创建顺序：src、dst、路由器 A、B、C……；两端主机各有一条指向相邻路由器的默认路由。
pub fn build_chain(
    world: &mut NetWorld,
    routers: usize,
    opts: &LinkOpts,
) -> Result<Chain, ConfigError> {
    if routers == 0 {
        return Err(ConfigError::InvalidScenario(
            "chain needs at least one router".to_string(),
        ));
    }
    let net = &mut world.net;
    let src = net.add_host("src");
    let dst = net.add_host("dst");
    let rs: Vec<NodeId> = (0..routers).map(|i| net.add_router(router_name(i))).collect();

    let first = link(net, src, rs[0], opts)?;
    for pair in rs.windows(2) {
        link(net, pair[0], pair[1], opts)?;
    }
    let last = link(net, rs[routers - 1], dst, opts)?;

    attach_host(net, src, first)?;
    attach_host(net, dst, last)?;

    Ok(Chain {
        src,
        dst,
        routers: rs,
    })
}
