use clap::{Parser, Subcommand};
use colored::*;
use drive2pdf::{run_direct, run_interactive};
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "drive2pdf")]
#[command(about = "CLI utility to merge publicly shared Google Drive files into a single PDF")]
#[command(version = "0.1.0")]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Google Drive links, in the order their pages should appear (free
    /// text; separators and surrounding prose are tolerated)
    urls: Option<String>,

    /// Output file path for the merged PDF
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output file name placed in the output directory (wins over --output)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prompt for links and a file name in a loop, one merge per round
    #[command(visible_alias = "i")]
    Interactive,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::from_default_env().add_directive("drive2pdf=info".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Some(Commands::Interactive) => run_interactive().await,
        None => {
            let urls = args.urls.unwrap_or_default();
            run_direct(&urls, args.output, args.name).await
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
