mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // Show tailfold info+ on stderr unless --json; --verbose enables debug; RUST_LOG overrides
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("tailfold", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::List => commands::list::run(&cli.global),
        Command::Show { fixture, optimize } => commands::show::run(fixture, *optimize, &cli.global),
        Command::Run {
            fixture,
            args,
            optimize,
            max_depth,
            max_steps,
        } => commands::run::run(
            fixture,
            args,
            &commands::run::RunOptions {
                optimize: *optimize,
                max_depth: *max_depth,
                max_steps: *max_steps,
            },
            &cli.global,
        ),
        Command::Check { sequential } => commands::check::run(!*sequential, &cli.global),
    }
}
