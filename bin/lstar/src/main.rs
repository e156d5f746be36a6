use std::{process::ExitCode, time::Duration};

use automata_core::prelude::*;
use automata_learning::active::{
    CachingOracle, HttpOracle, HttpOracleConfig, LStar, LStarConfig, MazeParameters, Oracle,
    DEFAULT_BASE_URL,
};

use tracing::{debug, error, info, trace};
use tracing_subscriber::{filter, prelude::*};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

fn cli() -> clap::Command {
    Command::new("lstar")
        .about("Learns the automaton behind a maze server with L*")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("info"),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .help("base URL of the maze server")
                .default_value(DEFAULT_BASE_URL),
        )
        .arg(
            Arg::new("alphabet")
                .short('a')
                .long("alphabet")
                .help("symbols of the alphabet, written without separators")
                .value_parser(|s: &str| s.parse::<CharAlphabet>())
                .default_value("EWNS"),
        )
        .arg(
            Arg::new("max-rounds")
                .long("max-rounds")
                .help("give up after this many equivalence queries [default: $MAX_ITERATIONS or built-in]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("timeout for a single request in seconds")
                .value_parser(value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .help("send every membership query to the server, even if it was asked before")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-generation")
                .long("skip-generation")
                .help("learn the maze that the server currently holds")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_parser(value_parser!(u32))
                .default_value("2"),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_parser(value_parser!(u32))
                .default_value("4"),
        )
        .arg(
            Arg::new("wall-probability")
                .long("wall-probability")
                .value_parser(value_parser!(u32))
                .default_value("3"),
        )
        .arg(
            Arg::new("exits")
                .long("exits")
                .value_parser(value_parser!(u32))
                .default_value("1"),
        )
}

fn setup_logging(matches: &ArgMatches) {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        Some("info") => filter::LevelFilter::INFO,
        _ => filter::LevelFilter::WARN,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .init();

    trace!("setup {level} logging");
}

fn maze_parameters(matches: &ArgMatches) -> MazeParameters {
    let get = |name: &str| matches.get_one::<u32>(name).copied();
    let defaults = MazeParameters::default();
    MazeParameters {
        width: get("width").unwrap_or(defaults.width),
        height: get("height").unwrap_or(defaults.height),
        wall_probability: get("wall-probability").unwrap_or(defaults.wall_probability),
        exits: get("exits").unwrap_or(defaults.exits),
    }
}

pub fn main() -> ExitCode {
    let matches = cli().get_matches();

    setup_logging(&matches);

    let config = HttpOracleConfig {
        base_url: matches
            .get_one::<String>("url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        timeout: Duration::from_secs(matches.get_one::<u64>("timeout").copied().unwrap_or(30)),
    };
    let alphabet = matches
        .get_one::<CharAlphabet>("alphabet")
        .cloned()
        .unwrap_or_else(|| CharAlphabet::new("EWNS".chars()));
    let lstar_config = match matches.get_one::<usize>("max-rounds") {
        Some(max_rounds) => LStarConfig::with_max_rounds(*max_rounds),
        None => LStarConfig::from_env(),
    };

    info!("connecting to {}", config.base_url);
    let http = match HttpOracle::new(config) {
        Ok(http) => http,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if !matches.get_flag("skip-generation") {
        let parameters = maze_parameters(&matches);
        if let Err(e) = http.generate_maze(&parameters) {
            error!("maze generation failed: {e}");
            return ExitCode::FAILURE;
        }
        info!("maze generation succeeded");
    }

    let oracle: Box<dyn Oracle> = if matches.get_flag("no-cache") {
        Box::new(http)
    } else {
        Box::new(CachingOracle::new(http))
    };

    let mut learner = LStar::with_config(alphabet, oracle, lstar_config);
    match learner.infer() {
        Ok(learned) => {
            println!("{}", learned.table);
            println!(
                "learned {} states in {} rounds with {} membership queries ({})",
                learned.size(),
                learned.rounds,
                learned.membership_queries,
                automata_core::show_duration(learned.elapsed)
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("learning failed: {e}");
            if let Some(table) = learner.partial_table() {
                debug!("table at the time of failure\n{table}");
            }
            ExitCode::FAILURE
        }
    }
}
