mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use nexlify::config::Config;
use nexlify::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    observability::init_tracing(cli.json_logs);

    match cli.command {
        Commands::Server(args) => {
            let mut config = Config::load_with(args.config)?;
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            nexlify::api::run(config).await?;
        }
        Commands::Config(args) => {
            let config = Config::load_with(args.config)?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
