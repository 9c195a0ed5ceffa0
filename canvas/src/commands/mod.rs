use clap::{Parser, Subcommand};
use log::{info, warn};
use scroll_canvas::{
    accounts::{load_accounts, Account},
    config::{Config, NetworkName},
    error::Result,
    gas::{GasOracle, GasQuote},
    prompt::{Console, Headless, Prompt},
    runner::{LiveConnector, RunOutcome, Runner, PROXY_RETRY_INTERVAL},
    utils::{checksum, extract_keypair_from_str},
};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// json config file, every field is optional
    #[clap(long, global = true, default_value = "config.json")]
    pub(crate) config: PathBuf,

    #[clap(subcommand)]
    pub(crate) command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register profiles and claim badges for every account
    Run {
        /// account csv, overrides the config file
        #[clap(long)]
        accounts: Option<PathBuf>,

        /// never wait for input, skip whatever needs an answer
        #[clap(long)]
        headless: bool,

        /// resume from the checkpoint without asking (headless only)
        #[clap(long)]
        resume: bool,
    },
    /// Validate the account file and print the processing order
    Check {
        /// account csv, overrides the config file
        #[clap(long)]
        accounts: Option<PathBuf>,
    },
    /// Print the current gas quote of a network
    Gas {
        /// eth or scroll
        #[clap(long, default_value = "scroll")]
        network: String,
    },
    /// Print the default config file
    Init,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            accounts: None,
            headless: false,
            resume: false,
        }
    }
}

fn accounts_path(config: &Config, accounts: &Option<PathBuf>) -> PathBuf {
    accounts.clone().unwrap_or_else(|| PathBuf::from(&config.accounts))
}

fn describe(account: &Account) -> String {
    let address = extract_keypair_from_str(&account.private_key)
        .map(|(_, addr)| checksum(&addr))
        .unwrap_or_else(|_| "?".to_string());
    format!(
        "{} {} username={} invite={} proxy={} badges={} retries={} sleep={}-{}s",
        account.short_key(),
        address,
        account.username.as_deref().unwrap_or("random"),
        account.invite_code.as_deref().unwrap_or("-"),
        account.proxy.as_ref().map_or("-", |p| p.url()),
        account.claim_badges,
        account.max_retries,
        account.sleep.min,
        account.sleep.max,
    )
}

impl Cli {
    pub(crate) fn parse_args() -> Self {
        Cli::parse()
    }

    pub(crate) fn run_cmd(config: &Config, accounts: &Option<PathBuf>, headless: bool, resume: bool) -> Result<()> {
        let path = accounts_path(config, accounts);
        let batch = load_accounts(&path)?;
        info!("Loaded {} accounts from {:?}", batch.len(), path);

        let network = config.network(NetworkName::Scroll);
        let connector = LiveConnector::new(network, config.receipt_timeout());
        let console = Console::default();
        let unattended = Headless { resume };
        let prompt: &dyn Prompt = if headless { &unattended } else { &console };

        let gas = GasOracle::default().with_l1_gate(config.network(NetworkName::Eth));
        let outcome = Runner::new(connector, gas, prompt, &config.checkpoint)
            .with_proxy_checks(config.proxy_check_attempts, PROXY_RETRY_INTERVAL)
            .run(batch)?;
        match outcome {
            RunOutcome::Completed => info!("All accounts processed"),
            RunOutcome::Exited => warn!("Session stopped before the end of the batch"),
        }
        Ok(())
    }

    pub(crate) fn check_cmd(config: &Config, accounts: &Option<PathBuf>) -> Result<()> {
        let path = accounts_path(config, accounts);
        let batch = load_accounts(&path)?;
        println!("{} accounts in {:?}", batch.len(), path);
        for (i, account) in batch.iter().enumerate() {
            println!("{:>4}. {}", i + 1, describe(account));
        }
        Ok(())
    }

    pub(crate) fn gas_cmd(config: &Config, network: &str) -> Result<()> {
        let network = config.network(NetworkName::from_str(network)?);
        let quote = GasOracle::default().quote(&network, None)?;
        let model = match quote {
            GasQuote::Legacy { .. } => "legacy".to_string(),
            GasQuote::Eip1559 { max_priority_fee, .. } => {
                format!("eip-1559, priority {:.3} Gwei", max_priority_fee.low_u128() as f64 / 1e9)
            }
        };
        println!("{}: {:.3} Gwei ({})", network, quote.price_gwei(), model);
        if let Some(max) = network.max_gwei {
            println!("ceiling: {} Gwei", max);
        }
        Ok(())
    }

    pub(crate) fn init_cmd(path: &Path) -> Result<()> {
        if path.exists() {
            warn!("{:?} already exists, printing defaults only", path);
        }
        println!("{}", Config::show()?);
        Ok(())
    }
}
