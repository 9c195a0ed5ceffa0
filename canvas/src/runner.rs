//! Batch driver: resume, per-account proxy checks and the retry policy.

use crate::{
    accounts::Account,
    api::HttpCanvasApi,
    checkpoint::Checkpoint,
    config::Network,
    error::{Result, TxStatus},
    gas::GasOracle,
    prompt::{decide, Decision, Prompt, ProxyDecision, RetryPolicy},
    tx::Submitter,
    utils::{self, http_client, sleep_quiet, test_proxy, Proxy, ProxyProbe},
    workflow::Workflow,
    BlockClient,
};
use log::{error, info, warn};
use std::{path::PathBuf, time::Duration};

pub const PROXY_RETRY_INTERVAL: Duration = Duration::from_secs(15);
const MOBILE_PROXY_SETTLE: Duration = Duration::from_secs(5);

/// Everything that leaves the process on behalf of one account.
pub trait Connector {
    /// One workflow pass.
    fn attempt(&mut self, account: &Account, gas: &mut GasOracle, prompt: &dyn Prompt) -> TxStatus;
    fn probe_proxy(&self, proxy: &Proxy) -> Result<ProxyProbe>;
    fn rotate_mobile_proxy(&self, link: &str);
}

pub struct LiveConnector {
    network: Network,
    receipt_timeout: Duration,
}

impl LiveConnector {
    pub fn new(network: Network, receipt_timeout: Duration) -> Self {
        LiveConnector {
            network,
            receipt_timeout,
        }
    }
}

impl Connector for LiveConnector {
    fn attempt(&mut self, account: &Account, gas: &mut GasOracle, prompt: &dyn Prompt) -> TxStatus {
        let proxy = account.proxy.as_ref();
        let chain = match BlockClient::setup(&self.network, proxy, &account.private_key, None) {
            Ok(chain) => chain,
            Err(e) => {
                error!("[Scroll Canvas] Failed to connect to {}: {}", self.network, e);
                return TxStatus::Failed;
            }
        };
        let api = match HttpCanvasApi::new(proxy) {
            Ok(api) => api,
            Err(e) => {
                error!("[Scroll Canvas] Failed to build http client: {}", e);
                return TxStatus::Failed;
            }
        };
        let submitter = Submitter::new(gas, &self.network, proxy, self.receipt_timeout, prompt);
        Workflow::new(&chain, &api, account, submitter).run()
    }

    fn probe_proxy(&self, proxy: &Proxy) -> Result<ProxyProbe> {
        test_proxy(proxy)
    }

    fn rotate_mobile_proxy(&self, link: &str) {
        let res = http_client(None, Some(Duration::from_secs(30))).and_then(|c| Ok(c.get(link).send()?));
        match res {
            Ok(res) if res.status().as_u16() == 200 => {
                info!("[Main] Changed mobile proxy: {}", res.text().unwrap_or_default());
                utils::sleep(MOBILE_PROXY_SETTLE);
            }
            Ok(res) => warn!(
                "[Main] Failed to change mobile proxy: {} - {}",
                res.status(),
                res.text().unwrap_or_default()
            ),
            Err(e) => warn!("[Main] Failed to change mobile proxy: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The operator stopped the run.
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountOutcome {
    Done,
    Skipped,
    Exit,
}

pub struct Runner<'a, K: Connector> {
    connector: K,
    gas: GasOracle,
    prompt: &'a dyn Prompt,
    checkpoint: PathBuf,
    proxy_attempts: u32,
    proxy_interval: Duration,
}

impl<'a, K: Connector> Runner<'a, K> {
    pub fn new(connector: K, gas: GasOracle, prompt: &'a dyn Prompt, checkpoint: impl Into<PathBuf>) -> Self {
        Runner {
            connector,
            gas,
            prompt,
            checkpoint: checkpoint.into(),
            proxy_attempts: crate::config::DEFAULT_PROXY_CHECK_ATTEMPTS,
            proxy_interval: PROXY_RETRY_INTERVAL,
        }
    }

    pub fn with_proxy_checks(mut self, attempts: u32, interval: Duration) -> Self {
        self.proxy_attempts = attempts;
        self.proxy_interval = interval;
        self
    }

    pub fn run(&mut self, accounts: Vec<Account>) -> Result<RunOutcome> {
        if accounts.is_empty() {
            warn!("[Main] No accounts to process");
            return Ok(RunOutcome::Completed);
        }
        let (mut batch, mut state) = self.plan(accounts);
        state.save(&self.checkpoint)?;
        info!(
            "Accounts order: {}",
            batch.iter().map(Account::short_key).collect::<Vec<_>>().join(" -> ")
        );

        for account in batch.iter_mut() {
            state.account_hash = account.id();
            state.save(&self.checkpoint)?;
            info!("Processing account with private_key {}", account.short_key());
            match self.process(account) {
                AccountOutcome::Done => info!("[Main] Finished account with private_key {}", account.short_key()),
                AccountOutcome::Skipped => {}
                AccountOutcome::Exit => return Ok(RunOutcome::Exited),
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn plan(&self, accounts: Vec<Account>) -> (Vec<Account>, Checkpoint) {
        let ids: Vec<String> = accounts.iter().map(Account::id).collect();
        let saved = match Checkpoint::load(&self.checkpoint) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("[Main] Ignoring unreadable checkpoint {:?}: {}", self.checkpoint, e);
                None
            }
        };
        if let Some(saved) = saved {
            if let Some(plan) = saved.resume_plan(&ids) {
                let mut pool: Vec<Option<Account>> = accounts.iter().cloned().map(Some).collect();
                let mut batch = Vec::with_capacity(plan.len());
                for id in &plan {
                    if let Some(slot) = pool.iter_mut().find(|a| a.as_ref().map_or(false, |a| a.id() == *id)) {
                        batch.extend(slot.take());
                    }
                }
                let first = batch.first().map(Account::short_key).unwrap_or_default();
                if self.prompt.confirm_resume(&first) {
                    info!("[Main] Continuing account with private_key {}", first);
                    return (batch, saved);
                }
            }
        }
        (accounts, Checkpoint::new(ids))
    }

    fn process(&mut self, account: &mut Account) -> AccountOutcome {
        let short = account.short_key();
        if let Some(link) = &account.mobile_proxy_changelink {
            self.connector.rotate_mobile_proxy(link);
        }

        if let Some(proxy) = &account.proxy {
            if !self.proxy_alive(proxy, &short) {
                match self.prompt.on_dead_proxy(&short) {
                    ProxyDecision::Skip => {
                        warn!("[Main] Skipping account with private_key {}", short);
                        return AccountOutcome::Skipped;
                    }
                    ProxyDecision::Exit => {
                        error!("[Main] Exiting session due to incorrect proxy");
                        return AccountOutcome::Exit;
                    }
                    ProxyDecision::DropProxy => {
                        info!("[Main] Deleting proxy for account with private_key {}", short);
                        account.proxy = None;
                    }
                }
            }
        }

        let policy = RetryPolicy {
            max_retries: account.max_retries,
            auto_skip: account.auto_skip,
        };
        let mut failures = 0;
        loop {
            let status = self.connector.attempt(account, &mut self.gas, self.prompt);
            if status.is_success() {
                return AccountOutcome::Done;
            }
            failures += 1;
            match decide(failures, policy) {
                Decision::Retry => account.sleep.sleep(),
                Decision::Skip => {
                    error!("[Main] Failed to process account with private_key {} ({})", short, status);
                    warn!("[Main] Skipping account with private_key {}", short);
                    return AccountOutcome::Skipped;
                }
                Decision::Exit => return AccountOutcome::Exit,
                Decision::Ask => {
                    error!("[Main] Failed to process account with private_key {} ({})", short, status);
                    match self.prompt.on_exhausted(&short) {
                        Decision::Skip => {
                            warn!("[Main] Skipping account with private_key {}", short);
                            return AccountOutcome::Skipped;
                        }
                        Decision::Exit => {
                            error!("[Main] Exiting session due to failed transaction");
                            return AccountOutcome::Exit;
                        }
                        _ => {
                            info!("[Main] Retrying account with private_key {}", short);
                            failures = 0;
                            account.sleep.sleep();
                        }
                    }
                }
            }
        }
    }

    /// Probes until the proxy answers, the attempts run out or Ctrl+C.
    fn proxy_alive(&self, proxy: &Proxy, short: &str) -> bool {
        for attempt in 1..=self.proxy_attempts {
            match self.connector.probe_proxy(proxy) {
                Ok(ProxyProbe::Located(ip)) => {
                    info!("[Main] Outgoing IP for account with private_key {} - {}", short, ip);
                    return true;
                }
                Ok(ProxyProbe::Reachable) => {
                    warn!("[Main] Failed to get outgoing IP for account with private_key {}", short);
                    return true;
                }
                Ok(ProxyProbe::Dead) => {}
                Err(e) => warn!("[Main] Proxy check failed: {}", e),
            }
            error!(
                "[Main] Proxy specified for account with private_key {} is not working ({}/{})",
                short, attempt, self.proxy_attempts
            );
            if attempt == self.proxy_attempts {
                break;
            }
            info!("[Main] Retrying. To stop retrying, press Ctrl+C");
            if sleep_quiet(self.proxy_interval) {
                break;
            }
        }
        false
    }
}
