use crate::commands::{run_cpf, run_schools, CpfArgs, SchoolsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use olympiad::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "olympiad-api",
    about = "Run the olympiad registration service and its maintenance commands",
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
    /// Validate a CPF and print it in both layouts
    Cpf(CpfArgs),
    /// Import a school registry CSV and list what it contains
    Schools(SchoolsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the school table from a registry CSV export
    #[arg(long)]
    pub(crate) schools: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Cpf(args) => run_cpf(args),
        Command::Schools(args) => run_schools(args),
    }
}
