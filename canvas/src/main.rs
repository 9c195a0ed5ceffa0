mod commands;

use commands::{Cli, Commands};
use log::info;
use scroll_canvas::{config::Config, logger, utils};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    let config = Config::load_or_default(&cli.config)?;
    logger::init(config.telegram.as_ref())?;
    utils::install_interrupt_handler()?;

    info!("Scroll Canvas Bot started");
    match cli.command.unwrap_or_default() {
        Commands::Run {
            accounts,
            headless,
            resume,
        } => Cli::run_cmd(&config, &accounts, headless, resume)?,
        Commands::Check { accounts } => Cli::check_cmd(&config, &accounts)?,
        Commands::Gas { network } => Cli::gas_cmd(&config, &network)?,
        Commands::Init => Cli::init_cmd(&cli.config)?,
    }
    Ok(())
}
