pub mod accounts;
pub mod api;
pub mod checkpoint;
pub mod config;
pub mod contract;
pub mod error;
pub mod gas;
pub mod logger;
#[cfg(test)]
mod mock;
pub mod prompt;
pub mod runner;
pub mod tx;
pub mod utils;
pub mod workflow;

use crate::{
    config::Network,
    error::{Error, Result},
    utils::{extract_keypair_from_str, Proxy},
};
use log::error;
use reqwest::{Client, Url};
use std::{future::Future, time::Duration};
use tokio::runtime::Runtime;
use web3::{
    transports::Http,
    types::{Address, BlockNumber, CallRequest, TransactionParameters, TransactionReceipt, H256, U256, U64},
};

const RPC_TIMEOUT: u64 = 30;
const NONCE_TRIES: u64 = 3;
const NONCE_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// The parts of a receipt the submitter looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: H256,
    pub status: Option<U64>,
    pub block_number: Option<U64>,
    pub gas_used: Option<U256>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == Some(U64::from(1))
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(r: TransactionReceipt) -> Self {
        Receipt {
            hash: r.transaction_hash,
            status: r.status,
            block_number: r.block_number,
            gas_used: r.gas_used,
        }
    }
}

/// Transaction plumbing for one signing account.
pub trait EvmRpc {
    fn sender(&self) -> Address;
    fn nonce(&self) -> Result<U256>;
    fn estimate_gas(&self, req: CallRequest) -> Result<U256>;
    /// Signs with the account key and broadcasts.
    fn send_transaction(&self, tx: TransactionParameters) -> Result<H256>;
    fn receipt(&self, hash: H256) -> Result<Option<Receipt>>;
}

/// Blocking web3 client for one signing account, optionally behind a proxy.
pub struct BlockClient {
    pub eth: web3::api::Eth<Http>,
    pub accounts: web3::api::Accounts<Http>,
    pub root_sk: secp256k1::SecretKey,
    pub root_addr: Address,
    rt: Runtime,
}

impl BlockClient {
    pub fn setup(network: &Network, proxy: Option<&Proxy>, private_key: &str, timeout: Option<u64>) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(timeout.unwrap_or(RPC_TIMEOUT)));
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        let client = builder.build()?;
        let url = Url::parse(network.rpc_url.as_str())?;
        let transport = Http::with_client(client, url);
        let web3 = web3::Web3::new(transport);
        let eth = web3.eth();
        let accounts = web3.accounts();
        let (root_sk, root_addr) = extract_keypair_from_str(private_key)?;
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            eth,
            accounts,
            root_sk,
            root_addr,
            rt,
        })
    }

    pub fn block_on<F: Future>(&self, f: F) -> F::Output {
        self.rt.block_on(f)
    }

    pub fn nonce_inner(&self, interval: Duration, times: u64) -> Result<U256> {
        let mut tries = 1u64;
        loop {
            match self
                .rt
                .block_on(self.eth.transaction_count(self.root_addr, Some(BlockNumber::Latest)))
            {
                Ok(nonce) => break Ok(nonce),
                Err(e) if tries >= times => break Err(Error::Rpc(e)),
                Err(e) => error!("failed to get nonce, tries {}, {}", tries, e),
            }
            std::thread::sleep(interval);
            tries += 1;
        }
    }
}

impl EvmRpc for BlockClient {
    fn sender(&self) -> Address {
        self.root_addr
    }

    fn nonce(&self) -> Result<U256> {
        self.nonce_inner(NONCE_RETRY_INTERVAL, NONCE_TRIES)
    }

    fn estimate_gas(&self, req: CallRequest) -> Result<U256> {
        Ok(self.rt.block_on(self.eth.estimate_gas(req, None))?)
    }

    fn send_transaction(&self, tx: TransactionParameters) -> Result<H256> {
        let signed = self
            .rt
            .block_on(self.accounts.sign_transaction(tx, &self.root_sk))?;
        Ok(self
            .rt
            .block_on(self.eth.send_raw_transaction(signed.raw_transaction))?)
    }

    fn receipt(&self, hash: H256) -> Result<Option<Receipt>> {
        Ok(self
            .rt
            .block_on(self.eth.transaction_receipt(hash))?
            .map(Receipt::from))
    }
}
