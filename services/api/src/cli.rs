use crate::demo::{run_demo, run_priority_report, DemoArgs, PriorityReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use talent_ai::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Talent Allocation Engine",
    about = "Rank analysts, audit allocation decisions, and distribute candidates from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Order open jobs by urgency
    Priority(PriorityReportArgs),
    /// Walk one job through ranking, decision, and distribution
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// JSON file with `jobs` and `analysts` arrays; the built-in sample catalog is used otherwise
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Priority(args) => run_priority_report(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
