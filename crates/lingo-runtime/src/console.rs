//! Operator console.
//!
//! A line-oriented command loop on stdin: `info` prints a runtime report,
//! `stop` shuts the balancer down. When stdin closes (the balancer runs
//! detached), the console goes quiet and shutdown is left to the signal
//! handlers.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::runtime::Balancer;

const PROMPT_HELP: &str = "commands: help | info | stop";

/// Runs the console until the operator asks to stop.
pub async fn run(balancer: &Balancer) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    println!("{PROMPT_HELP}");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                // stdin closed; keep running until a signal arrives.
                std::future::pending::<()>().await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                std::future::pending::<()>().await;
                return;
            }
        };

        match line.trim() {
            "" => {}
            "help" => println!("{PROMPT_HELP}"),
            "info" => println!("{}", balancer.report()),
            "stop" => return,
            other => println!("unknown command '{other}'; {PROMPT_HELP}"),
        }
    }
}
