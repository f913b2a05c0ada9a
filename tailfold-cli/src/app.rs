use clap::{Parser, Subcommand};

/// tailfold - accumulator tail-recursion elimination on sample functions
#[derive(Debug, Parser)]
#[command(name = "tailfold", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the bundled fixtures and what the pipeline does with them.
    List,

    /// Print the IR of a fixture, optionally after running the pipeline.
    Show {
        /// Fixture name (see `list`).
        #[arg(value_name = "FIXTURE")]
        fixture: String,

        /// Also print the function after the pipeline.
        #[arg(short, long)]
        optimize: bool,
    },

    /// Evaluate a fixture with the reference interpreter.
    Run {
        /// Fixture name (see `list`).
        #[arg(value_name = "FIXTURE")]
        fixture: String,

        /// Integer arguments, one per parameter.
        #[arg(value_name = "ARGS", allow_negative_numbers = true)]
        args: Vec<i64>,

        /// Run the pipeline before evaluating.
        #[arg(short, long)]
        optimize: bool,

        /// Maximum call depth before evaluation is aborted.
        #[arg(long, default_value_t = 10_000)]
        max_depth: usize,

        /// Maximum executed steps before evaluation is aborted.
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: u64,
    },

    /// Optimise every fixture and compare results over its sample inputs.
    Check {
        /// Process fixtures one after another instead of in parallel.
        #[arg(long)]
        sequential: bool,
    },
}
