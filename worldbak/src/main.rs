use clap::Parser;
use worldbak::args::{Cli, Commands};
use worldbak::{commands, config, logging};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    match cli.command {
        Commands::Run(args) => commands::run(&config_path, args).await,
        Commands::List => commands::list(&config_path).await,
    }
}
