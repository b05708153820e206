use crate::demo::{run_demo, run_import_check, DemoArgs, ImportCheckArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lead_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Lead Desk",
    about = "Run the lead workflow service or exercise it from the command line",
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
    /// Validate a lead CSV export and print the import summary without persisting it
    Import(ImportCheckArgs),
    /// Walk through checkout, disposition, queue, and import against an in-memory store
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
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
