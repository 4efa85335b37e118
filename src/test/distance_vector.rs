use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::net::{
    EchoClient, IfIndex, IfState, INFINITY_METRIC, NetWorld, NodeId, RouteSource,
    schedule_link_state_change,
};
use crate::routing::dv::{
    AdvertEntry, Advertisement, DeliverAdvertisement, DvCommand, DvConfig, SplitHorizon,
};
use crate::sim::{SimTime, Simulator};
use crate::topo::{Chain, LinkOpts, Ring, build_chain, build_ring};

fn loopback(id: NodeId) -> Ipv4Net {
    Ipv4Net::new(Ipv4Addr::new(10, 255, 0, (id.0 + 1) as u8), 32).expect("valid /32")
}

fn prefix(s: &str) -> Ipv4Net {
    s.parse().expect("valid prefix")
}

fn secs(s: u64) -> SimTime {
    SimTime::from_secs(s)
}

fn dv_ring(n: usize, split_horizon: SplitHorizon) -> (Simulator, NetWorld, Ring) {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let ring = build_ring(&mut world, n, &LinkOpts::default()).expect("ring");
    let cfg = DvConfig {
        split_horizon,
        ..DvConfig::default()
    };
    for &r in &ring.routers {
        world
            .net
            .enable_distance_vector(&mut sim, r, cfg.clone())
            .expect("enable dv");
    }
    (sim, world, ring)
}

fn dv_chain() -> (Simulator, NetWorld, Chain) {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let chain = build_chain(&mut world, 3, &LinkOpts::default()).expect("chain");
    for &r in &chain.routers {
        world
            .net
            .enable_distance_vector(&mut sim, r, DvConfig::default())
            .expect("enable dv");
    }
    (sim, world, chain)
}

#[test]
fn split_horizon_strings_parse_and_reject_unknown() {
    assert_eq!("NoSplitHorizon".parse::<SplitHorizon>().ok(), Some(SplitHorizon::NoSplitHorizon));
    assert_eq!("SplitHorizon".parse::<SplitHorizon>().ok(), Some(SplitHorizon::SplitHorizon));
    assert_eq!("PoisonReverse".parse::<SplitHorizon>().ok(), Some(SplitHorizon::PoisonReverse));
    assert!("poison".parse::<SplitHorizon>().is_err());
    assert_eq!(SplitHorizon::default(), SplitHorizon::PoisonReverse);
}

#[test]
fn ring_converges_to_hop_count_metrics() {
    let (mut sim, mut world, ring) = dv_ring(4, SplitHorizon::PoisonReverse);
    sim.run_until(secs(20), &mut world);

    let net = &world.net;
    let [a, b, c, d] = [ring.routers[0], ring.routers[1], ring.routers[2], ring.routers[3]];

    let to_b = net.lookup(a, &loopback(b)).expect("A -> B");
    assert_eq!(to_b.metric, 1);
    assert_eq!(to_b.iface, IfIndex(1));
    assert_eq!(to_b.source, RouteSource::Learned);
    assert_eq!(net.lookup(a, &loopback(d)).map(|r| r.metric), Ok(1));
    assert_eq!(net.lookup(a, &loopback(c)).map(|r| r.metric), Ok(2));
    // B-C 网段在 B 上是直连（0），A 经 B 学到为 1
    assert_eq!(net.lookup(a, &prefix("10.0.1.0/24")).map(|r| r.metric), Ok(1));
    assert_eq!(net.lookup(a, &prefix("10.0.0.0/24")).map(|r| r.source), Ok(RouteSource::Direct));

    // 每个路由器都能到达所有 loopback
    for &x in &ring.routers {
        for &y in &ring.routers {
            if x != y {
                assert!(net.lookup(x, &loopback(y)).is_ok(), "{x} -> {y}");
            }
        }
    }
}

#[test]
fn converged_tables_are_a_fixed_point() {
    let (mut sim, mut world, ring) = dv_ring(5, SplitHorizon::SplitHorizon);
    sim.run_until(secs(40), &mut world);
    let before: Vec<_> = ring.routers.iter().map(|&r| world.net.fib(r).clone()).collect();

    // 再经过多轮周期通告，表内容不再变化
    sim.run_until(secs(130), &mut world);
    let after: Vec<_> = ring.routers.iter().map(|&r| world.net.fib(r).clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn no_route_is_advertised_back_with_finite_metric() {
    for strategy in [SplitHorizon::SplitHorizon, SplitHorizon::PoisonReverse] {
        let (mut sim, mut world, ring) = dv_ring(4, strategy);
        sim.run_until(secs(20), &mut world);

        for &r in &ring.routers {
            let dv = world.net.nodes()[r.0]
                .distance_vector()
                .expect("router runs dv");
            for entry in dv.routes() {
                let route = entry.route();
                if route.source != RouteSource::Learned {
                    continue;
                }
                let adv = dv.build_advertisement(route.iface, false);
                let back = adv.iter().find(|e| e.dest == route.dest);
                match strategy {
                    SplitHorizon::SplitHorizon => assert!(back.is_none()),
                    _ => assert_eq!(back.map(|e| e.metric), Some(INFINITY_METRIC)),
                }
            }
        }
    }
}

#[test]
fn triggered_updates_after_failure_never_leak_finite_metric_back() {
    for strategy in [SplitHorizon::SplitHorizon, SplitHorizon::PoisonReverse] {
        let (mut sim, mut world, ring) = dv_ring(4, strategy);
        schedule_link_state_change(&mut sim, &world.net, secs(30), ring.routers[0], IfIndex(1), IfState::Down)
            .expect("valid");

        // 故障后每 250 ms 检查一次只含变更条目的通告，直到重新收敛
        let mut poisoned = 0;
        for step in 0..=40u64 {
            sim.run_until(SimTime::from_millis(30_000 + step * 250), &mut world);
            for &r in &ring.routers {
                let dv = world.net.nodes()[r.0]
                    .distance_vector()
                    .expect("router runs dv");
                for entry in dv.routes() {
                    let route = entry.route();
                    if route.source != RouteSource::Learned {
                        continue;
                    }
                    let adv = dv.build_advertisement(route.iface, true);
                    let back = adv.iter().find(|e| e.dest == route.dest);
                    match (strategy, back) {
                        (SplitHorizon::SplitHorizon, Some(e)) => {
                            panic!("{r} advertised {} back out {:?} (metric {})", e.dest, route.iface, e.metric)
                        }
                        (_, Some(e)) => {
                            assert_eq!(e.metric, INFINITY_METRIC, "{r} {}", e.dest);
                            poisoned += 1;
                        }
                        (_, None) => {}
                    }
                }
            }
        }
        if strategy == SplitHorizon::PoisonReverse {
            assert!(poisoned > 0, "expected changed entries right after the failure");
        }
    }
}

#[test]
fn without_split_horizon_routes_go_back_out_their_interface() {
    let (mut sim, mut world, ring) = dv_ring(4, SplitHorizon::NoSplitHorizon);
    sim.run_until(secs(20), &mut world);

    let a = ring.routers[0];
    let b_lo = loopback(ring.routers[1]);
    let dv = world.net.nodes()[a.0].distance_vector().expect("dv");
    let adv = dv.build_advertisement(IfIndex(1), false);
    let back = adv.iter().find(|e| e.dest == b_lo).expect("advertised back");
    assert_eq!(back.metric, 1);
}

#[test]
fn ring_reroutes_around_failed_link_and_recovers() {
    let (mut sim, mut world, ring) = dv_ring(4, SplitHorizon::PoisonReverse);
    let [a, b] = [ring.routers[0], ring.routers[1]];
    schedule_link_state_change(&mut sim, &world.net, secs(30), a, IfIndex(1), IfState::Down)
        .expect("valid");
    schedule_link_state_change(&mut sim, &world.net, secs(40), a, IfIndex(1), IfState::Up)
        .expect("valid");

    sim.run_until(secs(29), &mut world);
    assert_eq!(world.net.lookup(a, &loopback(b)).map(|r| r.iface), Ok(IfIndex(1)));

    sim.run_until(secs(35), &mut world);
    // 故障期间：不再经由断开的接口
    if let Ok(r) = world.net.lookup(a, &loopback(b)) {
        assert_ne!(r.iface, IfIndex(1));
    }
    if let Ok(r) = world.net.lookup(a, &prefix("10.0.0.0/24")) {
        assert_ne!(r.iface, IfIndex(1));
    }

    // 恢复后通过请求/应答立刻重新学到一跳路由
    sim.run_until(secs(45), &mut world);
    let to_b = world.net.lookup(a, &loopback(b)).expect("A -> B after recovery");
    assert_eq!((to_b.iface, to_b.metric), (IfIndex(1), 1));
    let to_a = world.net.lookup(b, &loopback(a)).expect("B -> A after recovery");
    assert_eq!((to_a.iface, to_a.metric), (IfIndex(1), 1));
}

#[test]
fn permanent_failure_converges_to_the_long_way_round() {
    let (mut sim, mut world, ring) = dv_ring(4, SplitHorizon::PoisonReverse);
    let [a, b] = [ring.routers[0], ring.routers[1]];
    schedule_link_state_change(&mut sim, &world.net, secs(30), a, IfIndex(1), IfState::Down)
        .expect("valid");

    sim.run_until(secs(120), &mut world);
    let to_b = world.net.lookup(a, &loopback(b)).expect("A -> B via D and C");
    assert_eq!(to_b.iface, IfIndex(2));
    assert_eq!(to_b.metric, 3);
}

#[test]
fn partition_yields_no_route_then_garbage_collection() {
    let (mut sim, mut world, chain) = dv_chain();
    let [a, b, c] = [chain.routers[0], chain.routers[1], chain.routers[2]];
    sim.run_until(secs(20), &mut world);
    assert_eq!(world.net.lookup(a, &loopback(c)).map(|r| r.metric), Ok(2));

    // B 的 if2 连 C
    schedule_link_state_change(&mut sim, &world.net, secs(30), b, IfIndex(2), IfState::Down)
        .expect("valid");
    sim.run_until(secs(40), &mut world);

    let lo_c = loopback(c);
    assert!(world.net.lookup(a, &lo_c).is_err());
    let stale = world.net.fib(a).get(&lo_c).expect("kept at infinity until gc");
    assert_eq!(stale.metric, INFINITY_METRIC);
    let entry = world.net.nodes()[a.0]
        .distance_vector()
        .and_then(|dv| dv.entry(&lo_c))
        .expect("rib entry");
    assert!(!entry.is_valid());
    assert!(entry.is_garbage_collecting());

    // 垃圾回收（120 s）之后彻底删除
    sim.run_until(secs(200), &mut world);
    assert!(world.net.fib(a).get(&lo_c).is_none());
    assert!(
        world.net.nodes()[a.0]
            .distance_vector()
            .and_then(|dv| dv.entry(&lo_c))
            .is_none()
    );
}

#[test]
fn silent_neighbor_routes_time_out() {
    let (mut sim, mut world, chain) = dv_chain();
    let [a, b, c] = [chain.routers[0], chain.routers[1], chain.routers[2]];
    sim.run_until(secs(40), &mut world);
    assert!(world.net.lookup(a, &loopback(b)).is_ok());

    // B 不再在 A-B 链路上发送通告，链路本身保持可用
    world.net.exclude_interface(b, IfIndex(1)).expect("valid");

    sim.run_until(secs(200), &mut world);
    assert!(world.net.lookup(a, &loopback(b)).is_ok(), "not yet timed out");

    // 最后一次刷新在 31 s，超时 180 s
    sim.run_until(secs(215), &mut world);
    assert!(world.net.lookup(a, &loopback(b)).is_err());
    assert!(world.net.lookup(a, &loopback(c)).is_err());
    let entry = world.net.nodes()[a.0]
        .distance_vector()
        .and_then(|dv| dv.entry(&loopback(b)))
        .expect("entry kept during gc");
    assert!(entry.age(sim.now()) >= DvConfig::default().timeout);
}

#[test]
fn malformed_advertisements_are_dropped_and_counted() {
    let (mut sim, mut world, ring) = dv_ring(4, SplitHorizon::PoisonReverse);
    sim.run_until(secs(20), &mut world);
    let [a, b, c] = [ring.routers[0], ring.routers[1], ring.routers[2]];
    let fib_before = world.net.fib(a).clone();
    let bogus = prefix("192.168.0.0/24");

    let adv = |sender: NodeId, metric: u32| Advertisement {
        command: DvCommand::Response,
        sender,
        sender_if: IfIndex(1),
        sender_addr: Ipv4Addr::new(10, 0, 0, 2),
        entries: vec![AdvertEntry {
            dest: bogus,
            metric,
        }],
        sent_at: SimTime::ZERO,
    };
    let link_ab = ring.links[0];
    let link_bc = ring.links[1];

    // 接口不在所声称的链路上
    sim.schedule_in(
        SimTime::ZERO,
        DeliverAdvertisement {
            to: a,
            ifindex: IfIndex(1),
            link: link_bc,
            adv: adv(b, 1),
        },
    );
    // 发送方不在这条链路上
    sim.schedule_in(
        SimTime::ZERO,
        DeliverAdvertisement {
            to: a,
            ifindex: IfIndex(1),
            link: link_ab,
            adv: adv(c, 1),
        },
    );
    // 度量超过无穷大
    sim.schedule_in(
        SimTime::ZERO,
        DeliverAdvertisement {
            to: a,
            ifindex: IfIndex(1),
            link: link_ab,
            adv: adv(b, INFINITY_METRIC + 1),
        },
    );
    // 不存在的接口
    sim.schedule_in(
        SimTime::ZERO,
        DeliverAdvertisement {
            to: a,
            ifindex: IfIndex(9),
            link: link_ab,
            adv: adv(b, 1),
        },
    );
    let malformed_before = world.net.stats.dv_malformed;
    sim.run_until(secs(21), &mut world);

    assert_eq!(world.net.stats.dv_malformed - malformed_before, 4);
    assert_eq!(world.net.fib(a), &fib_before);
}

#[test]
fn large_tables_are_split_into_bounded_messages() {
    let (mut sim, mut world, ring) = dv_ring(30, SplitHorizon::NoSplitHorizon);
    sim.run_until(secs(200), &mut world);

    let a = ring.routers[0];
    let dv = world.net.nodes()[a.0].distance_vector().expect("dv");
    // 30 个 loopback + 30 条链路
    let full = dv.build_advertisement(IfIndex(1), false);
    assert_eq!(full.len(), 60);

    // 跨越半个环的路由也能学到
    let far = ring.routers[15];
    assert_eq!(world.net.lookup(a, &loopback(far)).map(|r| r.metric), Ok(15));
}

#[test]
fn echo_traffic_crosses_the_chain_once_converged() {
    let (mut sim, mut world, chain) = dv_chain();
    let dst_addr = world
        .net
        .interface(chain.dst, IfIndex(1))
        .expect("dst if1")
        .addr;
    sim.schedule(
        secs(10),
        EchoClient {
            flow_id: 1,
            src: chain.src,
            dst: dst_addr,
            pkt_bytes: 1024,
            remaining: 10,
            interval: secs(1),
        },
    );
    sim.run_until(secs(30), &mut world);

    let st = &world.net.stats;
    assert_eq!(st.echo_requests, 10);
    assert_eq!(st.echo_replies, 10);
    assert_eq!(st.dropped_pkts(), 0);
}
