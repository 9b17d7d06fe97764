use crate::demo::{
    run_demo, run_emi_calculator, run_ledger_export, DemoArgs, EmiArgs, LedgerExportArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use gold_ledger::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Gold Loan Ledger",
    about = "Run and explore the gold loan ledger from the command line",
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
    /// Installment calculators
    Calc {
        #[command(subcommand)]
        command: CalcCommand,
    },
    /// Ledger bookkeeping utilities
    Ledger {
        #[command(subcommand)]
        command: LedgerCommand,
    },
    /// Walk a demo book through submission, payment, outsourcing and closure
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CalcCommand {
    /// Compute the monthly installment and totals for a loan
    Emi(EmiArgs),
}

#[derive(Subcommand, Debug)]
enum LedgerCommand {
    /// Export the demo book as CSV
    Export(LedgerExportArgs),
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
        Command::Calc {
            command: CalcCommand::Emi(args),
        } => run_emi_calculator(args),
        Command::Ledger {
            command: LedgerCommand::Export(args),
        } => run_ledger_export(args),
        Command::Demo(args) => run_demo(args),
    }
}
