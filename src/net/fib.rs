//! 转发表（FIB）
//!
//! 每个节点一张表：目的网段 -> (下一跳网关, 出接口, 度量, 来源)。
//! 同一目的网段最多一条表项，由各路由引擎写入；数据包转发时按最长前缀匹配查询。

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::IfIndex;

/// 距离向量协议的"无穷大"度量（最大跳数 15）。
pub const INFINITY_METRIC: u32 = 16;

/// 路由来源。优先级：直连 > 静态 > 全局（链路状态） > 学习（距离向量）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Direct,
    Static,
    Global,
    Learned,
}

impl RouteSource {
    fn priority(self) -> u8 {
        match self {
            RouteSource::Direct => 3,
            RouteSource::Static => 2,
            RouteSource::Global => 1,
            RouteSource::Learned => 0,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            RouteSource::Direct => "C",
            RouteSource::Static => "S",
            RouteSource::Global => "G",
            RouteSource::Learned => "R",
        }
    }
}

/// 一条路由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub dest: Ipv4Net,
    /// 下一跳地址；直连网段为 None
    pub gateway: Option<Ipv4Addr>,
    pub iface: IfIndex,
    pub metric: u32,
    pub source: RouteSource,
}

impl Route {
    pub fn direct(dest: Ipv4Net, iface: IfIndex) -> Self {
        Self {
            dest: dest.trunc(),
            gateway: None,
            iface,
            metric: 0,
            source: RouteSource::Direct,
        }
    }

    pub fn via(
        dest: Ipv4Net,
        gateway: Ipv4Addr,
        iface: IfIndex,
        metric: u32,
        source: RouteSource,
    ) -> Self {
        Self {
            dest: dest.trunc(),
            gateway: Some(gateway),
            iface,
            metric,
            source,
        }
    }

    /// 是否与另一条路由走同一个下一跳
    pub fn same_next_hop(&self, other: &Route) -> bool {
        self.iface == other.iface && self.gateway == other.gateway
    }

    /// 失效的距离向量路由（度量为无穷大）在垃圾回收前仍留在表中，但不可用于转发。
    pub fn is_reachable(&self) -> bool {
        !(self.source == RouteSource::Learned && self.metric >= INFINITY_METRIC)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gw = self
            .gateway
            .map(|g| g.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        write!(
            f,
            "{:<18} {:<15} {:<5} {:<3} {}",
            self.dest.to_string(),
            gw,
            self.iface.0,
            self.metric,
            self.source.tag()
        )
    }
}

/// 查询结果：目的网段当前不可达。这是正常结果而非故障。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no route to {dest}")]
pub struct NoRoute {
    pub dest: Ipv4Net,
}

/// 一次实际发生的表项变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FibChange {
    Installed(Route),
    Removed(Route),
}

/// 转发表
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardingTable {
    entries: BTreeMap<Ipv4Net, Route>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有表项（按目的网段排序）
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.values()
    }

    /// 按目的网段精确查询
    pub fn lookup(&self, dest: &Ipv4Net) -> Result<&Route, NoRoute> {
        let dest = dest.trunc();
        self.entries
            .get(&dest)
            .filter(|r| r.is_reachable())
            .ok_or(NoRoute { dest })
    }

    /// 按目的地址做最长前缀匹配
    pub fn resolve(&self, addr: Ipv4Addr) -> Result<&Route, NoRoute> {
        self.entries
            .values()
            .filter(|r| r.is_reachable() && r.dest.contains(&addr))
            .max_by_key(|r| r.dest.prefix_len())
            .ok_or(NoRoute {
                dest: Ipv4Net::from(addr),
            })
    }

    /// 原始表项（包含不可达的失效路由）
    pub fn get(&self, dest: &Ipv4Net) -> Option<&Route> {
        self.entries.get(&dest.trunc())
    }

    /// 写入一条路由，返回表是否发生变化。
    ///
    /// 满足以下任一条件时替换已有表项：
    /// - 来源优先级更高；
    /// - 同优先级且度量严格更小；
    /// - 同优先级且下一跳相同（当前提供者的刷新/更新/撤销）。
    pub fn install(&mut self, route: Route) -> bool {
        let Some(existing) = self.entries.get(&route.dest) else {
            self.entries.insert(route.dest, route);
            return true;
        };
        if *existing == route {
            return false;
        }
        let (new_p, old_p) = (route.source.priority(), existing.source.priority());
        let accept = new_p > old_p
            || (new_p == old_p
                && (route.metric < existing.metric || route.same_next_hop(existing)));
        if accept {
            self.entries.insert(route.dest, route);
        }
        accept
    }

    /// 删除一条表项
    pub fn remove(&mut self, dest: &Ipv4Net) -> Option<Route> {
        self.entries.remove(&dest.trunc())
    }

    /// 用 `routes` 整体替换某个来源的全部表项，返回实际发生的变更。
    ///
    /// 内容相同的表项不会产生变更，因此重复替换同一组路由是幂等的。
    pub fn replace_source(&mut self, source: RouteSource, routes: Vec<Route>) -> Vec<FibChange> {
        let mut changes = Vec::new();
        let incoming: BTreeMap<Ipv4Net, Route> =
            routes.into_iter().map(|r| (r.dest, r)).collect();

        let stale: Vec<Ipv4Net> = self
            .entries
            .values()
            .filter(|r| r.source == source && !incoming.contains_key(&r.dest))
            .map(|r| r.dest)
            .collect();
        for dest in stale {
            if let Some(old) = self.entries.remove(&dest) {
                changes.push(FibChange::Removed(old));
            }
        }

        for (dest, route) in incoming {
            match self.entries.get(&dest) {
                Some(old) if *old == route => {}
                Some(old) if old.source == source => {
                    self.entries.insert(dest, route.clone());
                    changes.push(FibChange::Installed(route));
                }
                _ => {
                    if self.install(route.clone()) {
                        changes.push(FibChange::Installed(route));
                    }
                }
            }
        }
        changes
    }
}

impl fmt::Display for ForwardingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<18} {:<15} {:<5} {:<3} {}",
            "Destination", "Gateway", "If", "Met", "Src"
        )?;
        for r in self.entries.values() {
            if r.is_reachable() {
                writeln!(f, "{r}")?;
            } else {
                writeln!(f, "{r} (invalid)")?;
            }
        }
        Ok(())
    }
}
