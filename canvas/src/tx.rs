//! Estimate, sign, send and confirm one transaction.

use crate::{
    config::Network,
    error::{is_insufficient_funds, Error, Result, TxStatus},
    gas::GasOracle,
    prompt::Prompt,
    utils::{sleep_quiet, Proxy},
    EvmRpc, Receipt,
};
use log::{error, info, warn};
use std::time::{Duration, Instant};
use web3::types::{Address, Bytes, CallRequest, TransactionParameters, H256, U256};

const MAX_RECEIPT_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
    /// What the transaction does, for the log.
    pub label: String,
}

/// `ceil(raw * 1.25)`
pub fn with_margin(raw: U256) -> U256 {
    (raw * U256::from(125) + U256::from(99)) / U256::from(100)
}

pub fn receipt_poll_interval(timeout: Duration) -> Duration {
    MAX_RECEIPT_POLL.min(timeout / 10)
}

pub struct Submitter<'a> {
    gas: &'a mut GasOracle,
    network: &'a Network,
    proxy: Option<&'a Proxy>,
    receipt_timeout: Duration,
    prompt: &'a dyn Prompt,
}

impl<'a> Submitter<'a> {
    pub fn new(
        gas: &'a mut GasOracle,
        network: &'a Network,
        proxy: Option<&'a Proxy>,
        receipt_timeout: Duration,
        prompt: &'a dyn Prompt,
    ) -> Self {
        Submitter {
            gas,
            network,
            proxy,
            receipt_timeout,
            prompt,
        }
    }

    pub fn submit<R: EvmRpc + ?Sized>(&mut self, rpc: &R, req: &TxRequest) -> TxStatus {
        match self.try_submit(rpc, req) {
            Ok(status) => status,
            Err(e) if is_insufficient_funds(&e) => {
                error!("[Scroll Canvas] Insufficient balance to {}", req.label);
                TxStatus::InsufficientBalance
            }
            Err(e) => {
                error!("[Scroll Canvas] Failed to {}: {}", req.label, e);
                TxStatus::Failed
            }
        }
    }

    fn try_submit<R: EvmRpc + ?Sized>(&mut self, rpc: &R, req: &TxRequest) -> Result<TxStatus> {
        let nonce = rpc.nonce()?;
        let quote = self.gas.suggest(self.network, self.proxy)?;

        let mut call = CallRequest {
            from: Some(rpc.sender()),
            to: Some(req.to),
            value: Some(req.value),
            data: Some(Bytes(req.data.clone())),
            ..Default::default()
        };
        quote.apply_call(&mut call);
        let gas = match rpc.estimate_gas(call) {
            Ok(raw) => with_margin(raw),
            Err(e) if is_insufficient_funds(&e) => {
                error!("[Scroll Canvas] Insufficient balance to {}", req.label);
                return Ok(TxStatus::InsufficientBalance);
            }
            Err(e) => {
                error!("[Scroll Canvas] Error while estimating gas: {}", e);
                return Ok(TxStatus::Failed);
            }
        };

        let mut tx = TransactionParameters {
            nonce: Some(nonce),
            to: Some(req.to),
            gas,
            value: req.value,
            data: Bytes(req.data.clone()),
            chain_id: Some(self.network.chain_id),
            ..Default::default()
        };
        quote.apply(&mut tx);

        let hash = rpc.send_transaction(tx).map_err(|e| match e {
            e if is_insufficient_funds(&e) => e,
            e => Error::Transaction(format!("sending failed: {}", e)),
        })?;
        info!("[Scroll Canvas] Transaction: {}", self.network.tx_link(&hash));

        match self.wait_for_receipt(rpc, hash, &req.label)? {
            Some(receipt) if receipt.succeeded() => {
                info!("[Scroll Canvas] Successfully completed: {}", req.label);
                Ok(TxStatus::Success)
            }
            Some(_) => {
                error!("[Scroll Canvas] Transaction reverted: {}", req.label);
                Ok(TxStatus::Failed)
            }
            None => {
                error!("[Scroll Canvas] No receipt for {}", req.label);
                Ok(TxStatus::Failed)
            }
        }
    }

    fn wait_for_receipt<R: EvmRpc + ?Sized>(&self, rpc: &R, hash: H256, label: &str) -> Result<Option<Receipt>> {
        let interval = receipt_poll_interval(self.receipt_timeout);
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            match rpc.receipt(hash) {
                Ok(Some(receipt)) => return Ok(Some(receipt)),
                Ok(None) => {}
                Err(e) => warn!("[Scroll Canvas] Error while waiting for transaction receipt: {}", e),
            }
            if Instant::now() >= deadline || sleep_quiet(interval) {
                break;
            }
        }

        if self.prompt.wait_for_inclusion("Scroll Canvas") {
            return rpc.receipt(hash);
        }
        warn!("[Scroll Canvas] Gave up waiting for {} ({:?})", label, hash);
        Ok(None)
    }
}
