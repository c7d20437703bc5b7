use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod run;

use run::{RunOptions, print_config, run_session};

#[derive(Parser, Debug)]
#[command(name = "guild", version = "0.1.0")]
#[command(about = "Guild CLI - drive a Minecraft bot with a team of agents")]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted session against a worker process
    Run {
        /// JSON plan with the decision script of each agent
        #[arg(long)]
        plan: PathBuf,
        /// Worker program to launch
        #[arg(long)]
        worker: String,
        /// Argument passed to the worker (repeatable)
        #[arg(long = "arg", allow_hyphen_values = true)]
        worker_args: Vec<String>,
        /// Overrides the goal stored in the plan
        #[arg(long)]
        goal: Option<String>,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn init_logging(pretty: bool) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    let _ = if pretty {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.pretty);

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Could not read .env file"),
    }

    match cli.command {
        Commands::Run {
            plan,
            worker,
            worker_args,
            goal,
        } => {
            let options = RunOptions {
                plan,
                worker,
                worker_args,
                goal,
            };
            if let Err(e) = run_session(options).await {
                tracing::error!(error = %e, code = e.error_code(), "Session failed");
                std::process::exit(1);
            }
        }
        Commands::Config => {
            if let Err(e) = print_config() {
                tracing::error!(error = %e, "Invalid configuration");
                std::process::exit(1);
            }
        }
    }
}
