//! The balancer daemon.
//!
//! Loads the configuration, initializes logging and runs the balancer
//! until the operator console or a shutdown signal stops it. Exits with
//! code 1 on a startup or configuration error, 0 on a clean shutdown.

use std::process::ExitCode;

use clap::{Arg, Command};
use tracing::error;

use lingo_runtime::logging::{LoggingBuilder, parse_level};
use lingo_runtime::{Balancer, config};

fn cli() -> Command {
    Command::new("lingod")
        .about("WebSocket translation load balancer")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .required(true)
                .help("The configuration file with the balancer options"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .value_name("LEVEL")
                .default_value("info")
                .help("The log level to use (trace, debug, info, warn, error)"),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("debug")
        .map(|s| s.as_str())
        .unwrap_or("info");
    LoggingBuilder::new().with_level(parse_level(level)).init();

    let config_path = match matches.get_one::<String>("config") {
        Some(path) => path,
        None => {
            error!("no configuration file given");
            return ExitCode::from(1);
        }
    };

    let config = match config::load_from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::from(1);
        }
    };

    let balancer = match Balancer::new(config) {
        Ok(balancer) => balancer,
        Err(e) => {
            error!(error = %e, "failed to assemble the balancer");
            return ExitCode::from(1);
        }
    };

    match balancer.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "balancer terminated with error");
            ExitCode::from(1)
        }
    }
}
