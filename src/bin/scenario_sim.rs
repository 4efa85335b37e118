use clap::Parser;
use routesim::error::ConfigError;
use routesim::scenario::{self, ScenarioSpec};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "scenario-sim",
    about = "Run a scenario.json on the routesim routing simulator"
)]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: PathBuf,

    /// Output trace JSON file
    #[arg(long)]
    trace_json: Option<PathBuf>,

    /// Run until this time (s); overrides `until_s` in the scenario
    #[arg(long)]
    until_s: Option<f64>,

    /// Override the split horizon strategy of a distance_vector scenario
    #[arg(long)]
    split_horizon: Option<String>,

    /// Print one line per echo reply after the run
    #[arg(long)]
    show_pings: bool,
}

fn run(args: Args) -> Result<(), ConfigError> {
    let mut spec = ScenarioSpec::load(&args.scenario)?;
    if args.until_s.is_some() {
        spec.until_s = args.until_s;
    }
    if let Some(sh) = args.split_horizon {
        match &mut spec.routing {
            scenario::RoutingSpec::DistanceVector { split_horizon, .. } => {
                *split_horizon = Some(sh);
            }
            scenario::RoutingSpec::LinkState => {
                return Err(ConfigError::InvalidScenario(
                    "--split-horizon only applies to distance_vector routing".to_string(),
                ));
            }
        }
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
