use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = servemux::cli::Cli::parse();
    if let Err(e) = servemux::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
