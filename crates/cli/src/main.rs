mod bus;
mod channel;
mod cli;
mod controller;
mod emitter;
mod scheduler;
mod supervisor;

use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use multiplex_core::{assign_names, parse_formula, validate_deps, Formula};

use crate::cli::Args;
use crate::emitter::{Emitter, TimeMode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let program_start = Instant::now();
    let time_mode = resolve_time_mode(&args);
    let emitter = Emitter::new(time_mode, program_start);

    let formulas = match parse_and_validate(&args.commands).context("failed to parse command expressions") {
        Ok(formulas) => formulas,
        Err(e) => {
            emitter.message(&format!("{e:#}")).await;
            std::process::exit(2);
        }
    };

    let timeout = args.timeout.map(Duration::from_secs_f64);
    let exit_code = controller::run(formulas, emitter, timeout).await;
    std::process::exit(exit_code);
}

fn resolve_time_mode(args: &Args) -> TimeMode {
    if args.relative {
        return TimeMode::Relative;
    }
    match args.time.as_deref() {
        None => TimeMode::Off,
        Some("relative") => TimeMode::Relative,
        Some(_) => TimeMode::Absolute,
    }
}

fn parse_and_validate(commands: &[String]) -> anyhow::Result<Vec<Formula>> {
    let mut formulas = commands
        .iter()
        .map(|arg| parse_formula(arg))
        .collect::<Result<Vec<_>, _>>()?;
    assign_names(&mut formulas)?;
    validate_deps(&formulas)?;
    Ok(formulas)
}
