//! 距离向量协议引擎
//!
//! 每个路由器一个实例，维护自己的路由信息库（RIB），并把可用路由同步到节点的转发表。
//!
//! - 周期通告：向每个参与协议的接口发送完整路由表（按水平分割策略变换）；
//! - 收到通告：候选度量 = 通告度量 + 链路代价，按"新目的 / 当前提供者 / 更优路径"更新；
//! - 超时：置为不可达并开始垃圾回收，回收前仍以无穷大度量通告；
//! - 触发更新：路由变化后只发送变化的条目，冷却期内最多一次。

use std::collections::BTreeMap;

use ipnet::Ipv4Net;
use tracing::{debug, info, trace, warn};

use super::advert::{
    AdvertEntry, Advertisement, DvCommand, MAX_ENTRIES_PER_MESSAGE, MalformedAdvertisement,
};
use super::config::{DvConfig, SplitHorizon};
use super::events::{
    DeliverAdvertisement, DvGarbageCollect, DvPeriodicUpdate, DvRouteTimeout, DvTriggeredUpdate,
};
use crate::net::{IfIndex, INFINITY_METRIC, Interface, LinkId, Network, NodeId, Route, RouteSource};
use crate::sim::{EventId, SimTime, Simulator};

/// RIB 中的一条路由
#[derive(Debug, Clone)]
pub struct RibEntry {
    route: Route,
    /// 学到该路由的邻居；直连路由为 None
    neighbor: Option<NodeId>,
    /// 自上次通告以来是否变化（触发更新只发送这些条目）
    changed: bool,
    refreshed_at: SimTime,
    timeout: Option<EventId>,
    gc: Option<EventId>,
}

impl RibEntry {
    fn new(route: Route, neighbor: Option<NodeId>, now: SimTime) -> Self {
        Self {
            route,
            neighbor,
            changed: true,
            refreshed_at: now,
            timeout: None,
            gc: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn neighbor(&self) -> Option<NodeId> {
        self.neighbor
    }

    pub fn is_valid(&self) -> bool {
        self.route.metric < INFINITY_METRIC
    }

    /// 距上次刷新经过的时间
    pub fn age(&self, now: SimTime) -> SimTime {
        now.saturating_sub(self.refreshed_at)
    }

    /// 是否处于垃圾回收等待期
    pub fn is_garbage_collecting(&self) -> bool {
        self.gc.is_some()
    }

    fn cancel_timers(&mut self, sim: &mut Simulator) {
        if let Some(t) = self.timeout.take() {
            sim.cancel(t);
        }
        if let Some(g) = self.gc.take() {
            sim.cancel(g);
        }
    }
}

/// 一个路由器上的距离向量协议实例
#[derive(Debug)]
pub struct DistanceVector {
    node: NodeId,
    cfg: DvConfig,
    rib: BTreeMap<Ipv4Net, RibEntry>,
    triggered_pending: bool,
}

/// 把路由置为不可达：度量改为无穷大、停止超时计时、开始垃圾回收。
/// 学到的路由同时在转发表中失效（同一下一跳的更新总会被接受）。
fn invalidate(
    entry: &mut RibEntry,
    node: NodeId,
    cfg: &DvConfig,
    sim: &mut Simulator,
    net: &mut Network,
) {
    let dest = entry.route.dest;
    entry.route.metric = INFINITY_METRIC;
    entry.changed = true;
    if let Some(t) = entry.timeout.take() {
        sim.cancel(t);
    }
    if entry.gc.is_none() {
        entry.gc = Some(sim.schedule_in(cfg.gc_delay, DvGarbageCollect { node, dest }));
    }
    if entry.route.source == RouteSource::Learned {
        net.fib_install(node, entry.route.clone(), sim.now());
    }
    debug!(?node, %dest, "路由失效");
}

impl DistanceVector {
    pub fn new(node: NodeId, cfg: DvConfig) -> Self {
        Self {
            node,
            cfg,
            rib: BTreeMap::new(),
            triggered_pending: false,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &DvConfig {
        &self.cfg
    }

    pub fn routes(&self) -> impl Iterator<Item = &RibEntry> {
        self.rib.values()
    }

    pub fn entry(&self, dest: &Ipv4Net) -> Option<&RibEntry> {
        self.rib.get(&dest.trunc())
    }

    /// 载入直连网段，并安排第一次周期通告
    pub(crate) fn start(&mut self, sim: &mut Simulator, net: &mut Network) {
        let ifaces: Vec<Interface> = net.nodes()[self.node.0]
            .interfaces
            .iter()
            .filter(|i| i.is_up())
            .cloned()
            .collect();
        for iface in &ifaces {
            self.set_direct(sim, iface);
        }
        sim.schedule_in(self.cfg.startup_delay, DvPeriodicUpdate { node: self.node });
    }

    /// 确保接口所在网段作为有效直连路由存在。返回 RIB 是否变化。
    fn set_direct(&mut self, sim: &mut Simulator, iface: &Interface) -> bool {
        let route = Route::direct(iface.prefix, iface.index);
        let now = sim.now();
        match self.rib.get_mut(&iface.prefix) {
            Some(e) if e.route == route => false,
            Some(e) => {
                e.cancel_timers(sim);
                *e = RibEntry::new(route, None, now);
                true
            }
            None => {
                self.rib.insert(iface.prefix, RibEntry::new(route, None, now));
                true
            }
        }
    }

    fn participates(&self, net: &Network, ifindex: IfIndex) -> bool {
        net.interface(self.node, ifindex)
            .is_some_and(|i| !i.is_loopback() && !i.dv_excluded)
            && net.interface_operational(self.node, ifindex)
    }

    /// 为某个出接口构造通告条目（已应用水平分割）。
    ///
    /// `only_changed` 为真时只包含自上次通告以来变化过的条目（触发更新）。
    pub fn build_advertisement(&self, ifindex: IfIndex, only_changed: bool) -> Vec<AdvertEntry> {
        let mut entries = Vec::new();
        for e in self.rib.values() {
            if only_changed && !e.changed {
                continue;
            }
            let mut metric = e.route.metric.min(INFINITY_METRIC);
            let learned_here = e.route.source == RouteSource::Learned && e.route.iface == ifindex;
            if learned_here {
                match self.cfg.split_horizon {
                    SplitHorizon::NoSplitHorizon => {}
                    SplitHorizon::SplitHorizon => continue,
                    SplitHorizon::PoisonReverse => metric = INFINITY_METRIC,
                }
            }
            entries.push(AdvertEntry {
                dest: e.route.dest,
                metric,
            });
        }
        entries
    }

    fn send(
        &self,
        sim: &mut Simulator,
        net: &mut Network,
        ifindex: IfIndex,
        command: DvCommand,
        entries: Vec<AdvertEntry>,
    ) {
        let Some(iface) = net.interface(self.node, ifindex) else {
            return;
        };
        let Some(link_id) = iface.link else {
            return;
        };
        let adv = Advertisement {
            command,
            sender: self.node,
            sender_if: ifindex,
            sender_addr: iface.addr,
            entries,
            sent_at: sim.now(),
        };
        let Some(link) = net.link(link_id) else {
            return;
        };
        let delay = link.delivery_delay(adv.size_bytes());
        let peers: Vec<(NodeId, IfIndex)> = link.peers_of(self.node).collect();
        trace!(
            node = ?self.node,
            ifindex = ifindex.0,
            ?command,
            entries = adv.entries.len(),
            peers = peers.len(),
            "发送距离向量报文"
        );
        for (to, to_if) in peers {
            sim.schedule_in(
                delay,
                DeliverAdvertisement {
                    to,
                    ifindex: to_if,
                    link: link_id,
                    adv: adv.clone(),
                },
            );
        }
        net.stats.dv_messages += 1;
    }

    /// 把条目按报文容量拆分后从某接口发出
    fn send_table(&self, sim: &mut Simulator, net: &mut Network, ifindex: IfIndex, only_changed: bool) {
        let entries = self.build_advertisement(ifindex, only_changed);
        for chunk in entries.chunks(MAX_ENTRIES_PER_MESSAGE) {
            self.send(sim, net, ifindex, DvCommand::Response, chunk.to_vec());
        }
    }

    fn send_update(&mut self, sim: &mut Simulator, net: &mut Network, only_changed: bool) {
        let ifaces: Vec<IfIndex> = {
            let view: &Network = net;
            view.nodes()[self.node.0]
                .interfaces
                .iter()
                .map(|i| i.index)
                .filter(|&i| self.participates(view, i))
                .collect()
        };
        for ifindex in ifaces {
            self.send_table(sim, net, ifindex, only_changed);
        }
        for e in self.rib.values_mut() {
            e.changed = false;
        }
    }

    fn schedule_triggered(&mut self, sim: &mut Simulator) {
        if self.triggered_pending {
            return;
        }
        self.triggered_pending = true;
        sim.schedule_in(self.cfg.triggered_delay, DvTriggeredUpdate { node: self.node });
    }

    /// 周期通告；返回下一次通告的间隔
    pub(crate) fn on_periodic(&mut self, sim: &mut Simulator, net: &mut Network) -> SimTime {
        debug!(node = ?self.node, routes = self.rib.len(), "周期通告");
        self.send_update(sim, net, false);
        self.cfg.update_interval
    }

    pub(crate) fn on_triggered(&mut self, sim: &mut Simulator, net: &mut Network) {
        self.triggered_pending = false;
        if !self.rib.values().any(|e| e.changed) {
            return;
        }
        debug!(node = ?self.node, "触发更新");
        self.send_update(sim, net, true);
    }

    /// 接口或其所在链路的状态发生变化
    pub(crate) fn on_interface_change(
        &mut self,
        sim: &mut Simulator,
        net: &mut Network,
        ifindex: IfIndex,
    ) {
        let Some(iface) = net.interface(self.node, ifindex).cloned() else {
            return;
        };
        let operational = net.interface_operational(self.node, ifindex);
        let node = self.node;
        let mut changed = false;

        if iface.is_up() {
            changed |= self.set_direct(sim, &iface);
        } else if let Some(e) = self.rib.get_mut(&iface.prefix) {
            if e.route.source == RouteSource::Direct && e.route.iface == ifindex && e.is_valid() {
                invalidate(e, node, &self.cfg, sim, net);
                changed = true;
            }
        }

        if !operational {
            for e in self.rib.values_mut() {
                if e.route.source == RouteSource::Learned && e.route.iface == ifindex && e.is_valid()
                {
                    invalidate(e, node, &self.cfg, sim, net);
                    changed = true;
                }
            }
        } else if self.participates(net, ifindex) {
            // 接口恢复：请求邻居立即回送完整路由表
            self.send(sim, net, ifindex, DvCommand::Request, Vec::new());
        }

        info!(?node, ifindex = ifindex.0, operational, changed, "距离向量处理接口变化");
        if changed {
            self.schedule_triggered(sim);
        }
    }

    fn validate(
        &self,
        net: &Network,
        ifindex: IfIndex,
        link: LinkId,
        adv: &Advertisement,
    ) -> Result<(), MalformedAdvertisement> {
        let iface = net
            .interface(self.node, ifindex)
            .ok_or(MalformedAdvertisement::UnknownInterface {
                node: self.node,
                ifindex,
            })?;
        let l = iface
            .link
            .filter(|&l| l == link)
            .and_then(|l| net.link(l))
            .ok_or(MalformedAdvertisement::WrongLink {
                node: self.node,
                ifindex,
                link,
            })?;
        if adv.sender == self.node || !l.attaches(adv.sender, adv.sender_if) {
            return Err(MalformedAdvertisement::UnknownSender {
                sender: adv.sender,
                sender_if: adv.sender_if,
                link,
            });
        }
        if let Some(e) = adv.entries.iter().find(|e| e.metric > INFINITY_METRIC) {
            return Err(MalformedAdvertisement::MetricOutOfRange {
                dest: e.dest,
                metric: e.metric,
            });
        }
        Ok(())
    }

    /// 收到邻居的报文
    pub(crate) fn on_advertisement(
        &mut self,
        sim: &mut Simulator,
        net: &mut Network,
        ifindex: IfIndex,
        link: LinkId,
        adv: Advertisement,
    ) {
        if let Err(e) = self.validate(net, ifindex, link, &adv) {
            warn!(node = ?self.node, error = %e, "丢弃畸形通告");
            net.stats.dv_malformed += 1;
            return;
        }
        if !self.participates(net, ifindex) {
            trace!(node = ?self.node, ifindex = ifindex.0, "接口不参与协议或不可用，忽略报文");
            return;
        }

        match adv.command {
            DvCommand::Request => self.send_table(sim, net, ifindex, false),
            DvCommand::Response => self.process_response(sim, net, ifindex, link, &adv),
        }
    }

    fn process_response(
        &mut self,
        sim: &mut Simulator,
        net: &mut Network,
        ifindex: IfIndex,
        link: LinkId,
        adv: &Advertisement,
    ) {
        let node = self.node;
        let cfg = self.cfg.clone();
        let now = sim.now();
        let cost = net.link(link).map_or(1, |l| l.cost);
        let mut any_change = false;

        for e in &adv.entries {
            let dest = e.dest.trunc();
            let candidate = e.metric.saturating_add(cost).min(INFINITY_METRIC);
            let learned = Route::via(dest, adv.sender_addr, ifindex, candidate, RouteSource::Learned);

            match self.rib.get_mut(&dest) {
                None => {
                    if candidate >= INFINITY_METRIC {
                        continue;
                    }
                    let mut entry = RibEntry::new(learned, Some(adv.sender), now);
                    entry.timeout = Some(sim.schedule_in(cfg.timeout, DvRouteTimeout { node, dest }));
                    net.fib_install(node, entry.route.clone(), now);
                    self.rib.insert(dest, entry);
                    any_change = true;
                }
                Some(entry) => {
                    if entry.route.source == RouteSource::Direct && entry.is_valid() {
                        continue;
                    }
                    let from_provider = entry.route.source == RouteSource::Learned
                        && entry.route.same_next_hop(&learned);

                    if from_provider {
                        if candidate < INFINITY_METRIC {
                            // 刷新：重置老化计时，取消可能在进行的垃圾回收
                            entry.cancel_timers(sim);
                            entry.refreshed_at = now;
                            entry.neighbor = Some(adv.sender);
                            entry.timeout =
                                Some(sim.schedule_in(cfg.timeout, DvRouteTimeout { node, dest }));
                            if entry.route.metric != candidate {
                                entry.route.metric = candidate;
                                entry.changed = true;
                                any_change = true;
                            }
                            net.fib_install(node, entry.route.clone(), now);
                        } else if entry.is_valid() {
                            invalidate(entry, node, &cfg, sim, net);
                            any_change = true;
                        }
                    } else if candidate < entry.route.metric {
                        entry.cancel_timers(sim);
                        *entry = RibEntry::new(learned, Some(adv.sender), now);
                        entry.timeout =
                            Some(sim.schedule_in(cfg.timeout, DvRouteTimeout { node, dest }));
                        net.fib_install(node, entry.route.clone(), now);
                        any_change = true;
                    }
                }
            }
        }

        if any_change {
            self.schedule_triggered(sim);
        }
    }

    /// 路由超时
    pub(crate) fn on_timeout(&mut self, sim: &mut Simulator, net: &mut Network, dest: Ipv4Net) {
        let node = self.node;
        let now = sim.now();
        let Some(entry) = self.rib.get_mut(&dest) else {
            return;
        };
        if entry.route.source != RouteSource::Learned || !entry.is_valid() {
            return;
        }
        if entry.age(now) < self.cfg.timeout {
            return;
        }
        entry.timeout = None;
        info!(?node, %dest, age = %entry.age(now), "⏰ 路由超时");
        invalidate(entry, node, &self.cfg, sim, net);
        self.schedule_triggered(sim);
    }

    /// 垃圾回收到期：从 RIB 与转发表中删除
    pub(crate) fn on_garbage_collect(&mut self, sim: &mut Simulator, net: &mut Network, dest: Ipv4Net) {
        let Some(entry) = self.rib.get(&dest) else {
            return;
        };
        if entry.is_valid() || entry.gc.is_none() {
            return;
        }
        let Some(entry) = self.rib.remove(&dest) else {
            return;
        };
        debug!(node = ?self.node, %dest, "🗑️  垃圾回收路由");
        if entry.route.source == RouteSource::Learned {
            let in_fib = net
                .fib(self.node)
                .get(&dest)
                .is_some_and(|r| r.source == RouteSource::Learned && r.same_next_hop(&entry.route));
            if in_fib {
                net.fib_remove(self.node, &dest, sim.now());
            }
        }
    }
}
