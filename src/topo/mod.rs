//! 拓扑构建
//!
//! 三种常用拓扑：路由器链（两端各挂一台主机）、路由器环、以及带两台主机的四路由器方形网。
//! 每条链路一个 /24 网段，按创建顺序依次为 10.0.0.0/24、10.0.1.0/24 ……

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::ConfigError;
use crate::net::{IfIndex, LinkId, Network, NodeId};
use crate::sim::SimTime;

mod chain;
mod ring;
mod square;

pub use chain::{Chain, build_chain};
pub use ring::{Ring, build_ring};
pub use square::{Square, build_square};

/// 链路参数
#[derive(Debug, Clone, Copy)]
pub struct LinkOpts {
    pub latency: SimTime,
    pub bandwidth_bps: u64,
}

impl Default for LinkOpts {
    fn default() -> Self {
        Self {
            latency: SimTime::from_millis(2),
            bandwidth_bps: 5_000_000,
        }
    }
}

/// 第 k 条链路的网段
pub(crate) fn link_prefix(k: usize) -> Result<Ipv4Net, ConfigError> {
    let third = u8::try_from(k)
        .map_err(|_| ConfigError::InvalidScenario(format!("too many links ({k})")))?;
    Ipv4Net::new(Ipv4Addr::new(10, 0, third, 0), 24)
        .map_err(|e| ConfigError::InvalidScenario(e.to_string()))
}

/// 路由器按 A、B、C…… 命名，超过 26 个时退化为 r{i}
pub(crate) fn router_name(i: usize) -> String {
    match u8::try_from(i) {
        Ok(b) if b < 26 => char::from(b'A' + b).to_string(),
        _ => format!("r{i}"),
    }
}

/// 连一条点到点链路，网段按已有链路数分配
pub(crate) fn link(
    net: &mut Network,
    a: NodeId,
    b: NodeId,
    opts: &LinkOpts,
) -> Result<LinkId, ConfigError> {
    let prefix = link_prefix(net.links().len())?;
    net.connect(a, b, prefix, opts.latency, opts.bandwidth_bps)
}

/// 给主机配置一条经由 `link` 的默认路由，网关为链路对端地址；
/// 同时把路由器一侧的接口排除在距离向量报文交换之外。
pub(crate) fn attach_host(net: &mut Network, host: NodeId, link: LinkId) -> Result<(), ConfigError> {
    let ends = net
        .link(link)
        .map(|l| l.ends.clone())
        .ok_or_else(|| ConfigError::InvalidScenario(format!("link {link:?} does not exist")))?;
    let (host_if, (router, router_if)) = match ends.as_slice() {
        [(h, hi), r] if *h == host => (*hi, *r),
        [r, (h, hi)] if *h == host => (*hi, *r),
        _ => {
            return Err(ConfigError::InvalidScenario(format!(
                "host {host:?} is not an endpoint of point-to-point link {link:?}"
            )));
        }
    };
    let gateway = net
        .interface(router, router_if)
        .map(|i| i.addr)
        .ok_or(ConfigError::UnknownInterface {
            node: router,
            ifindex: router_if,
        })?;
    net.add_static_route(host, Ipv4Net::default(), gateway, host_if)?;
    net.exclude_interface(router, router_if)
}

/// 节点在链路 `link` 上的接口
pub fn interface_on(net: &Network, node: NodeId, link: LinkId) -> Option<IfIndex> {
    net.link(link)?
        .ends
        .iter()
        .find(|&&(n, _)| n == node)
        .map(|&(_, i)| i)
}
