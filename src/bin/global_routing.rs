//! 全局路由（链路状态）仿真
//!
//! 与 `rip` 相同的拓扑与故障时间表，路由由集中式最短路径计算给出，拓扑一变立即重算。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use routesim::error::ConfigError;
use routesim::scenario::{self, RoutingSpec, ScenarioSpec, TopologySpec};

#[derive(Debug, Parser)]
#[command(name = "global_routing", about = "全局路由（链路状态 oracle）仿真")]
struct Args {
    /// 拓扑：square、chain 或 ring
    #[arg(long, default_value = "square")]
    topology: TopologySpec,
    /// 在 30、60、90 秒打印各路由器的路由表
    #[arg(long)]
    print_routing_tables: bool,
    /// 结束后逐条列出收到的回显应答
    #[arg(long)]
    show_pings: bool,
    /// 覆盖仿真结束时间（秒）
    #[arg(long)]
    until_s: Option<f64>,
    /// 输出追踪事件 JSON
    #[arg(long)]
    trace_json: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), ConfigError> {
    let mut spec = ScenarioSpec::preset(args.topology, RoutingSpec::LinkState);
    if args.print_routing_tables {
        spec.print_tables_at_s = vec![30.0, 60.0, 90.0];
    }
    if args.until_s.is_some() {
        spec.until_s = args.until_s;
    }

    let mut sc = scenario::build(&spec, args.trace_json.is_some() || args.show_pings)?;
    sc.run();

    if args.show_pings {
        for (t, flow_id, hops) in sc.echo_replies() {
            println!("reply flow={flow_id} at={t} hops={hops}");
        }
    }
    let recomputations = sc
        .world
        .net
        .global_routing()
        .map_or(0, |g| g.recomputations());
    println!("{}, recomputations={recomputations}", sc.summary());

    if let Some(path) = args.trace_json {
        let n = sc.write_trace(&path)?;
        eprintln!("wrote {n} trace events to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
