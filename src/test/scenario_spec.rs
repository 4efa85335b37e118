use crate::error::ConfigError;
use crate::net::{IfState, NodeId};
use crate::routing::dv::SplitHorizon;
use crate::scenario::{
    self, RoutingSpec, ScenarioSpec, TopologySpec, render_routing_tables,
};
use crate::sim::SimTime;

#[test]
fn scenario_spec_parses_minimal_json_with_defaults() {
    let raw = r#"
{
    "topology": { "kind": "chain" },
    "routing": { "kind": "link_state" }
}
"#;
    let spec = ScenarioSpec::from_json(raw).expect("parse scenario");
    assert_eq!(spec.topology, TopologySpec::Chain { routers: 3 });
    assert!(matches!(spec.routing, RoutingSpec::LinkState));
    assert!(spec.changes.is_empty());
    assert!(spec.pings.is_empty());
    assert_eq!(spec.until().expect("until"), SimTime::from_secs(300));
}

#[test]
fn scenario_spec_parses_full_json() {
    let raw = r#"
{
    "topology": { "kind": "ring", "routers": 5 },
    "link": { "latency_ms": 1.0, "bandwidth_bps": 10000000 },
    "routing": { "kind": "distance_vector", "split_horizon": "SplitHorizon", "update_interval_s": 10 },
    "changes": [
        { "at_s": 30, "node": "A", "ifindex": 1, "state": "down" },
        { "at_s": 40, "node": "A", "ifindex": 1, "state": "up" }
    ],
    "pings": [ { "from": "A", "to": "C", "to_if": 0, "start_s": 20, "count": 5 } ],
    "print_tables_at_s": [30, 60],
    "until_s": 50
}
"#;
    let spec = ScenarioSpec::from_json(raw).expect("parse scenario");
    assert_eq!(spec.topology, TopologySpec::Ring { routers: 5 });
    assert_eq!(spec.changes.len(), 2);
    assert_eq!(spec.changes[0].state, IfState::Down);
    assert_eq!(spec.pings[0].interval_s, 1.0);
    assert_eq!(spec.pings[0].start_s, 20.0);
    assert_eq!(spec.pings[0].pkt_bytes, 1024);

    let mut sc = scenario::build(&spec, false).expect("build");
    assert_eq!(sc.until, SimTime::from_secs(50));
    let dv = sc.world.net.nodes()[0].distance_vector().expect("routers run dv");
    assert_eq!(dv.config().split_horizon, SplitHorizon::SplitHorizon);
    assert_eq!(dv.config().update_interval, SimTime::from_secs(10));

    sc.run();
    assert_eq!(sc.sim.now(), SimTime::from_secs(50));
    assert_eq!(sc.world.net.stats.echo_requests, 5);
    assert_eq!(sc.world.net.stats.echo_replies, 5);
}

#[test]
fn unknown_values_are_configuration_errors() {
    assert!(matches!(
        "mesh".parse::<TopologySpec>(),
        Err(ConfigError::UnknownTopology(_))
    ));
    assert!(matches!(
        ScenarioSpec::from_json(r#"{ "topology": { "kind": "mesh" }, "routing": { "kind": "link_state" } }"#),
        Err(ConfigError::Json(_))
    ));

    let bad_split = ScenarioSpec::preset(
        TopologySpec::Square,
        RoutingSpec::DistanceVector {
            split_horizon: Some("Sometimes".to_string()),
            update_interval_s: None,
            timeout_s: None,
            gc_delay_s: None,
        },
    );
    assert!(matches!(
        scenario::build(&bad_split, false),
        Err(ConfigError::UnknownSplitHorizon(s)) if s == "Sometimes"
    ));

    let mut bad_node = ScenarioSpec::preset(TopologySpec::Square, RoutingSpec::LinkState);
    bad_node.changes[0].node = "Z".to_string();
    assert!(matches!(
        scenario::build(&bad_node, false),
        Err(ConfigError::UnknownNodeName(n)) if n == "Z"
    ));

    let mut loopback = ScenarioSpec::preset(TopologySpec::Square, RoutingSpec::LinkState);
    loopback.changes[0].ifindex = 0;
    assert!(matches!(
        scenario::build(&loopback, false),
        Err(ConfigError::LoopbackInterface { .. })
    ));

    let mut bad_time = ScenarioSpec::preset(TopologySpec::Square, RoutingSpec::LinkState);
    bad_time.until_s = Some(-1.0);
    assert!(matches!(
        scenario::build(&bad_time, false),
        Err(ConfigError::InvalidScenario(_))
    ));
}

#[test]
fn link_state_square_preset_answers_every_ping() {
    let mut spec = ScenarioSpec::preset(TopologySpec::Square, RoutingSpec::LinkState);
    // 停在 100 s 之后一点，让 100 s 发出的请求也能收到应答
    spec.until_s = Some(100.1);
    let mut sc = scenario::build(&spec, false).expect("build");
    sc.run();

    // 两个客户端分别从 1.5 s、2 s 起每秒一个请求
    let st = &sc.world.net.stats;
    assert_eq!(st.echo_requests, 198);
    assert_eq!(st.echo_replies, 198);
    assert_eq!(st.dropped_pkts(), 0);
    assert!(sc.summary().contains("echo_replies=198"));
}

#[test]
fn distance_vector_square_preset_keeps_some_connectivity() {
    let spec = ScenarioSpec::preset(
        TopologySpec::Square,
        RoutingSpec::distance_vector(SplitHorizon::PoisonReverse),
    );
    assert_eq!(spec.until().expect("until"), SimTime::from_secs(300));
    let mut sc = scenario::build(&spec, true).expect("build");
    sc.run();

    let st = &sc.world.net.stats;
    assert!(st.echo_replies > 0);
    assert!(st.echo_replies <= st.echo_requests);
    assert!(st.dv_messages > 0);
    assert_eq!(st.dv_malformed, 0);
    assert_eq!(sc.echo_replies().len() as u64, st.echo_replies);
}

#[test]
fn routing_tables_render_per_router() {
    let spec = ScenarioSpec::preset(TopologySpec::Square, RoutingSpec::LinkState);
    let sc = scenario::build(&spec, false).expect("build");
    let text = render_routing_tables(&sc.world.net, &[NodeId(2), NodeId(3)], SimTime::from_secs(30));
    assert!(text.contains("Node: A, Time: 30.000s"));
    assert!(text.contains("Node: B, Time: 30.000s"));
    assert!(text.contains("10.0.2.0/24"));
    assert!(!text.contains("Node: T"));
}
