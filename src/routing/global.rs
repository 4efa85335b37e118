//! 全局路由（链路状态 oracle）
//!
//! 不交换任何报文：直接读取当前拓扑（只计入可用链路），
//! 对每个目的节点在图上做 Dijkstra，得到所有节点到它的最短代价，
//! 再为每个 (源, 目的网段) 选出一个确定的下一跳写入转发表。
//!
//! 等价路径的下一跳按 (邻居节点 id, 出接口) 取最小，因此同一拓扑总得到同一张表。
//! 只写入未运行距离向量协议的节点。

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info};

use crate::net::{IfIndex, Network, NodeId, Route, RouteSource};
use crate::sim::SimTime;

/// 一条有向边：从某节点的 `out_if` 出发，经过代价 `cost` 到达 `to`（对端地址 `gateway`）
#[derive(Debug, Clone, Copy)]
struct Edge {
    to: NodeId,
    out_if: IfIndex,
    gateway: Ipv4Addr,
    cost: u32,
}

#[derive(Debug, Default)]
pub struct GlobalRouting {
    recomputations: u64,
}

impl GlobalRouting {
    /// 已完成的全量计算次数
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// 基于当前拓扑重新计算所有非距离向量节点的全局路由，返回转发表变更条数。
    ///
    /// 拓扑不变时重复调用不会产生任何变更。
    #[tracing::instrument(skip(self, net), fields(now = ?now))]
    pub fn recompute(&mut self, net: &mut Network, now: SimTime) -> usize {
        self.recomputations += 1;
        let n = net.nodes().len();
        let adj = build_adjacency(net);

        // dist[dst][v]：v 到 dst 的最短代价（链路双向对称，从 dst 出发即可）
        let dist: Vec<Vec<Option<u64>>> = (0..n).map(|dst| dijkstra(&adj, NodeId(dst))).collect();

        // 网段 -> 拥有它（接口可用）的节点
        let mut owners: BTreeMap<Ipv4Net, Vec<NodeId>> = BTreeMap::new();
        for node in net.nodes() {
            for iface in &node.interfaces {
                if net.interface_operational(node.id, iface.index) {
                    owners.entry(iface.prefix).or_default().push(node.id);
                }
            }
        }

        let targets: Vec<NodeId> = net
            .nodes()
            .iter()
            .filter(|n| n.distance_vector().is_none())
            .map(|n| n.id)
            .collect();

        let mut total = 0;
        for src in targets {
            let routes = routes_for(net, &adj, &dist, &owners, src);
            let changes = net.replace_routes(src, RouteSource::Global, routes, now);
            if changes > 0 {
                debug!(node = ?src, changes, "全局路由更新转发表");
            }
            total += changes;
        }
        info!(
            round = self.recomputations,
            changes = total,
            "🧭 全局路由重算完成"
        );
        total
    }
}

/// 只计入可用链路；共享介质链路在任意两端点之间都有边
fn build_adjacency(net: &Network) -> Vec<Vec<Edge>> {
    let mut adj = vec![Vec::new(); net.nodes().len()];
    for link in net.links() {
        if !net.is_link_up(link.id) {
            continue;
        }
        for &(u, ui) in &link.ends {
            for &(v, vi) in &link.ends {
                if u == v {
                    continue;
                }
                let gateway = net.nodes()[v.0].interfaces[vi.0].addr;
                adj[u.0].push(Edge {
                    to: v,
                    out_if: ui,
                    gateway,
                    cost: link.cost,
                });
            }
        }
    }
    adj
}

fn dijkstra(adj: &[Vec<Edge>], from: NodeId) -> Vec<Option<u64>> {
    let mut dist: Vec<Option<u64>> = vec![None; adj.len()];
    let mut heap = BinaryHeap::new();
    dist[from.0] = Some(0);
    heap.push(Reverse((0u64, from.0)));

    while let Some(Reverse((d, v))) = heap.pop() {
        if dist[v].is_some_and(|best| d > best) {
            continue;
        }
        for e in &adj[v] {
            let nd = d + e.cost as u64;
            if dist[e.to.0].is_none_or(|old| nd < old) {
                dist[e.to.0] = Some(nd);
                heap.push(Reverse((nd, e.to.0)));
            }
        }
    }
    dist
}

/// 从 `src` 去往 `dst` 的下一跳：所有位于最短路径上的出边中 (邻居 id, 出接口) 最小者
fn next_hop(adj: &[Vec<Edge>], dist_to_dst: &[Option<u64>], src: NodeId) -> Option<Edge> {
    let here = dist_to_dst[src.0]?;
    adj[src.0]
        .iter()
        .filter(|e| dist_to_dst[e.to.0].is_some_and(|d| d + e.cost as u64 == here))
        .min_by_key(|e| (e.to, e.out_if))
        .copied()
}

fn routes_for(
    net: &Network,
    adj: &[Vec<Edge>],
    dist: &[Vec<Option<u64>>],
    owners: &BTreeMap<Ipv4Net, Vec<NodeId>>,
    src: NodeId,
) -> Vec<Route> {
    let own: Vec<Ipv4Net> = net.nodes()[src.0]
        .interfaces
        .iter()
        .filter(|i| i.is_up())
        .map(|i| i.prefix)
        .collect();

    let mut routes = Vec::new();
    for (prefix, holders) in owners {
        if own.contains(prefix) {
            continue;
        }
        // 最近的拥有者；距离相同时取 id 较小者
        let nearest = holders
            .iter()
            .filter_map(|&o| dist[o.0][src.0].map(|d| (d, o)))
            .min();
        let Some((d, owner)) = nearest else {
            continue;
        };
        let Some(hop) = next_hop(adj, &dist[owner.0], src) else {
            continue;
        };
        let metric = u32::try_from(d).unwrap_or(u32::MAX);
        routes.push(Route::via(*prefix, hop.gateway, hop.out_if, metric, RouteSource::Global));
    }
    routes
}
