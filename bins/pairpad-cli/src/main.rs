mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pairpad-cli")]
#[command(about = "Pairpad CLI - Submit snippets to a running pairpad server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a source file for execution and print the verdict
    Submit {
        /// Path to the source file
        #[arg(short, long)]
        file: PathBuf,

        /// Language: python3 or java
        #[arg(short, long)]
        language: String,

        /// Inline test cases in UI format (one case per line)
        #[arg(short, long)]
        input: Option<String>,

        /// Read test cases from a file instead
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// Server base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            file,
            language,
            input,
            input_file,
            server,
        } => commands::submit(file, &language, input, input_file, &server).await,
    }
}
