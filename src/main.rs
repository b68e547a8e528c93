use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = linediary::Cli::parse();
    if let Err(error) = linediary::run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
