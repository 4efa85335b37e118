use crate::net::{IfIndex, IfState, NetWorld, schedule_link_state_change};
use crate::routing::dv::DvConfig;
use crate::sim::{SimTime, Simulator};
use crate::topo::{LinkOpts, build_ring};
use crate::trace::TraceEventKind;

#[test]
fn trace_starts_with_meta_and_records_route_and_topology_events() {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let ring = build_ring(&mut world, 3, &LinkOpts::default()).expect("ring");
    world.net.enable_trace(sim.now());
    for &r in &ring.routers {
        world
            .net
            .enable_distance_vector(&mut sim, r, DvConfig::default())
            .expect("enable dv");
    }
    schedule_link_state_change(
        &mut sim,
        &world.net,
        SimTime::from_secs(10),
        ring.routers[0],
        IfIndex(1),
        IfState::Down,
    )
    .expect("valid");
    sim.run_until(SimTime::from_secs(15), &mut world);

    let trace = world.net.take_trace().expect("trace enabled");
    let first = trace.events.first().expect("at least meta");
    match &first.kind {
        TraceEventKind::Meta { nodes, links } => {
            assert_eq!(nodes.len(), 3);
            assert_eq!(links.len(), 3);
            assert_eq!(nodes[0].name, "A");
            assert_eq!(links[0].prefix, "10.0.0.0/24");
        }
        other => panic!("expected meta first, got {other:?}"),
    }

    assert!(trace
        .events
        .iter()
        .any(|e| matches!(e.kind, TraceEventKind::RouteInstalled { .. })));
    assert!(trace.events.iter().any(|e| matches!(
        e.kind,
        TraceEventKind::TopologyChanged {
            node: 0,
            ifindex: 1,
            state: IfState::Down,
            link_up: false,
            ..
        }
    )));
    // 事件按仿真时间有序
    assert!(trace.events.windows(2).all(|w| w[0].t_ns <= w[1].t_ns));

    let json = serde_json::to_value(&trace.events).expect("serialize");
    let arr = json.as_array().expect("array");
    assert_eq!(arr[0].get("kind").and_then(|k| k.as_str()), Some("meta"));
    assert!(arr.iter().any(|e| e.get("kind").and_then(|k| k.as_str()) == Some("route_installed")));
}
