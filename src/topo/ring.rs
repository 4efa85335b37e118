//! 环形拓扑：n 个路由器首尾相连

use crate::error::ConfigError;
use crate::net::{LinkId, NetWorld, NodeId};

use super::{LinkOpts, link, router_name};

#[derive(Debug, Clone)]
pub struct Ring {
    pub routers: Vec<NodeId>,
    /// links[i] 连接 routers[i] 与 routers[(i + 1) % n]
    pub links: Vec<LinkId>,
}

/// 构建环形拓扑（至少 3 个路由器）
pub fn build_ring(world: &mut NetWorld, n: usize, opts: &LinkOpts) -> Result<Ring, ConfigError> {
    if n < 3 {
        return Err(ConfigError::InvalidScenario(format!(
            "ring needs at least 3 routers, got {n}"
        )));
    }
    let net = &mut world.net;
    let routers: Vec<NodeId> = (0..n).map(|i| net.add_router(router_name(i))).collect();
    let links = (0..n)
        .map(|i| link(net, routers[i], routers[(i + 1) % n], opts))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Ring { routers, links })
}
