use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::net::{FibChange, ForwardingTable, IfIndex, INFINITY_METRIC, NoRoute, Route, RouteSource};

fn net(s: &str) -> Ipv4Net {
    s.parse().expect("valid prefix")
}

fn gw(s: &str) -> Ipv4Addr {
    s.parse().expect("valid address")
}

fn learned(dest: &str, via: &str, iface: usize, metric: u32) -> Route {
    Route::via(net(dest), gw(via), IfIndex(iface), metric, RouteSource::Learned)
}

#[test]
fn lookup_reports_no_route_for_missing_and_invalidated_entries() {
    let mut fib = ForwardingTable::new();
    let dest = net("10.0.5.0/24");
    assert_eq!(fib.lookup(&dest), Err(NoRoute { dest }));

    assert!(fib.install(learned("10.0.5.0/24", "10.0.1.2", 1, 2)));
    assert_eq!(fib.lookup(&dest).map(|r| r.metric), Ok(2));

    // 同一下一跳的撤销（度量 16）总会被接受，但查询结果是不可达
    assert!(fib.install(learned("10.0.5.0/24", "10.0.1.2", 1, INFINITY_METRIC)));
    assert_eq!(fib.lookup(&dest), Err(NoRoute { dest }));
    assert!(fib.get(&dest).is_some(), "invalid entry stays until garbage collected");
    assert_eq!(fib.len(), 1);
}

#[test]
fn install_accepts_better_or_same_next_hop_and_rejects_worse() {
    let mut fib = ForwardingTable::new();
    assert!(fib.install(learned("10.0.7.0/24", "10.0.1.2", 1, 3)));

    // 其它邻居、度量更差：拒绝
    assert!(!fib.install(learned("10.0.7.0/24", "10.0.2.2", 2, 4)));
    // 其它邻居、度量相同：拒绝（不在等价路径间抖动）
    assert!(!fib.install(learned("10.0.7.0/24", "10.0.2.2", 2, 3)));
    // 其它邻居、度量更好：接受
    assert!(fib.install(learned("10.0.7.0/24", "10.0.2.2", 2, 2)));
    // 当前提供者的度量变差：接受
    assert!(fib.install(learned("10.0.7.0/24", "10.0.2.2", 2, 5)));
    // 完全相同：不算变化
    assert!(!fib.install(learned("10.0.7.0/24", "10.0.2.2", 2, 5)));

    let r = fib.lookup(&net("10.0.7.0/24")).expect("route");
    assert_eq!(r.gateway, Some(gw("10.0.2.2")));
    assert_eq!(r.metric, 5);
}

#[test]
fn install_respects_source_priority() {
    let mut fib = ForwardingTable::new();
    let dest = net("10.0.1.0/24");
    assert!(fib.install(learned("10.0.1.0/24", "10.0.0.2", 1, 1)));
    assert!(fib.install(Route::direct(dest, IfIndex(2))));
    // 直连优先于一切，度量再小的学习路由也不能覆盖
    assert!(!fib.install(learned("10.0.1.0/24", "10.0.0.2", 1, 0)));
    assert!(!fib.install(Route::via(dest, gw("10.0.0.2"), IfIndex(1), 1, RouteSource::Global)));
    assert_eq!(fib.lookup(&dest).map(|r| r.source), Ok(RouteSource::Direct));
}

#[test]
fn resolve_uses_longest_prefix_match() {
    let mut fib = ForwardingTable::new();
    fib.install(Route::via(
        Ipv4Net::default(),
        gw("10.0.0.2"),
        IfIndex(1),
        1,
        RouteSource::Static,
    ));
    fib.install(Route::direct(net("10.0.3.0/24"), IfIndex(2)));
    fib.install(learned("10.0.0.0/16", "10.0.3.1", 2, 4));

    assert_eq!(fib.resolve(gw("10.0.3.9")).map(|r| r.iface), Ok(IfIndex(2)));
    assert_eq!(
        fib.resolve(gw("10.0.9.9")).map(|r| r.source),
        Ok(RouteSource::Learned)
    );
    assert_eq!(
        fib.resolve(gw("192.168.1.1")).map(|r| r.source),
        Ok(RouteSource::Static)
    );
}

#[test]
fn resolve_skips_invalidated_routes() {
    let mut fib = ForwardingTable::new();
    fib.install(learned("10.0.4.0/24", "10.0.1.2", 1, INFINITY_METRIC));
    assert!(fib.resolve(gw("10.0.4.1")).is_err());
}

#[test]
fn replace_source_is_idempotent_and_reports_only_real_changes() {
    let mut fib = ForwardingTable::new();
    fib.install(Route::direct(net("10.0.0.0/24"), IfIndex(1)));

    let routes = vec![
        Route::via(net("10.0.1.0/24"), gw("10.0.0.2"), IfIndex(1), 1, RouteSource::Global),
        Route::via(net("10.0.2.0/24"), gw("10.0.0.2"), IfIndex(1), 2, RouteSource::Global),
        // 与直连冲突：不会写入
        Route::via(net("10.0.0.0/24"), gw("10.0.0.2"), IfIndex(1), 1, RouteSource::Global),
    ];
    let first = fib.replace_source(RouteSource::Global, routes.clone());
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|c| matches!(c, FibChange::Installed(_))));

    let second = fib.replace_source(RouteSource::Global, routes);
    assert!(second.is_empty());

    // 某条路由消失、另一条度量变化
    let third = fib.replace_source(
        RouteSource::Global,
        vec![Route::via(net("10.0.2.0/24"), gw("10.0.0.2"), IfIndex(1), 3, RouteSource::Global)],
    );
    assert_eq!(third.len(), 2);
    assert!(fib.lookup(&net("10.0.1.0/24")).is_err());
    assert_eq!(fib.lookup(&net("10.0.2.0/24")).map(|r| r.metric), Ok(3));
    assert_eq!(fib.lookup(&net("10.0.0.0/24")).map(|r| r.source), Ok(RouteSource::Direct));
}

#[test]
fn table_never_holds_two_entries_for_one_destination() {
    let mut fib = ForwardingTable::new();
    fib.install(learned("10.0.6.0/24", "10.0.1.2", 1, 3));
    fib.install(learned("10.0.6.7/24", "10.0.2.2", 2, 2));
    assert_eq!(fib.len(), 1);
    let shown = fib.to_string();
    assert!(shown.contains("10.0.6.0/24"));
    assert!(shown.contains("10.0.2.2"));
}
