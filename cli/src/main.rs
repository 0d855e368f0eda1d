use clap::Parser;
use hive_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    hive_cli::run::main(cli).await
}
