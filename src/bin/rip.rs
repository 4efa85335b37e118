//! 距离向量路由仿真
//!
//! 在方形拓扑上运行类 RIP 协议：B 的 if1 在 30 s 断开、40 s 恢复，D 的 if1 在 70 s 断开、90 s 恢复。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use routesim::error::ConfigError;
use routesim::routing::dv::SplitHorizon;
use routesim::scenario::{self, RoutingSpec, ScenarioSpec, TopologySpec};

#[derive(Debug, Parser)]
#[command(name = "rip", about = "距离向量（类 RIP）路由仿真")]
struct Args {
    /// 水平分割策略：NoSplitHorizon、SplitHorizon 或 PoisonReverse
    #[arg(long, default_value = "PoisonReverse")]
    split_horizon: SplitHorizon,
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
    let mut spec = ScenarioSpec::preset(
        args.topology,
        RoutingSpec::distance_vector(args.split_horizon),
    );
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
    println!("{}", sc.summary());

    if let Some(path) = args.trace_json {
        let n = sc.write_trace(&path)?;
        eprintln!("wrote {n} trace events to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    // 初始化 tracing
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
