// gnssconf - GNSS receiver configuration streamer
use clap::Parser;
use gnssconf::cli::args::Args;
use gnssconf::cli::commands::execute_command;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = execute_command(args).await {
        if !e.is_silent() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
