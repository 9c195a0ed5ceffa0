//! In-memory chain and Canvas backends for unit tests.

use crate::{
    api::{Badge, CanvasApi, Eligibility, MintInfo},
    config::Network,
    contract::CanvasChain,
    error::{Error, Result},
    gas::{gwei_to_wei, GasOracle, GasQuote, GasSource},
    utils::Proxy,
    EvmRpc, Receipt,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};
use web3::types::{Address, CallRequest, TransactionParameters, H256, U256, U64};

pub struct FixedGas(pub GasQuote);

impl GasSource for FixedGas {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn quote(&self, _network: &Network, _proxy: Option<&Proxy>) -> Result<GasQuote> {
        Ok(self.0)
    }
}

pub fn fixed_gas() -> GasOracle {
    let quote = GasQuote::Legacy {
        gas_price: gwei_to_wei(0.05),
    };
    GasOracle::new(Box::new(FixedGas(quote)), Box::new(FixedGas(quote)))
}

fn rpc_error(msg: &str) -> Error {
    Error::Rpc(web3::Error::InvalidResponse(msg.to_string()))
}

/// Every sent transaction is mined at once unless `pending` is set;
/// transactions to a `reverting` address get status 0.
#[derive(Default)]
pub struct FakeChain {
    pub sender: Address,
    pub estimate: u64,
    pub estimate_error: Option<&'static str>,
    pub reverting: Vec<Address>,
    pub pending: Cell<bool>,
    pub profile_minted: bool,
    pub taken_usernames: Vec<String>,
    pub held_badges: Vec<Address>,
    pub origins_token: Option<U256>,
    pub sent: RefCell<Vec<TransactionParameters>>,
}

impl FakeChain {
    pub fn sent_to(&self) -> Vec<Address> {
        self.sent.borrow().iter().filter_map(|tx| tx.to).collect()
    }
}

impl EvmRpc for FakeChain {
    fn sender(&self) -> Address {
        self.sender
    }

    fn nonce(&self) -> Result<U256> {
        Ok(U256::from(3))
    }

    fn estimate_gas(&self, _req: CallRequest) -> Result<U256> {
        match self.estimate_error {
            Some(msg) => Err(rpc_error(msg)),
            None => Ok(U256::from(self.estimate)),
        }
    }

    fn send_transaction(&self, tx: TransactionParameters) -> Result<H256> {
        let mut sent = self.sent.borrow_mut();
        sent.push(tx);
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&(sent.len() as u64).to_be_bytes());
        Ok(H256(hash))
    }

    fn receipt(&self, hash: H256) -> Result<Option<Receipt>> {
        if self.pending.get() {
            return Ok(None);
        }
        let mut index = [0u8; 8];
        index.copy_from_slice(&hash.0[24..]);
        let index = u64::from_be_bytes(index) as usize;
        let sent = self.sent.borrow();
        let tx = sent.get(index - 1).ok_or_else(|| rpc_error("unknown transaction"))?;
        let reverted = tx.to.map_or(false, |to| self.reverting.contains(&to));
        Ok(Some(Receipt {
            hash,
            status: Some(U64::from(if reverted { 0 } else { 1 })),
            block_number: Some(U64::from(100)),
            gas_used: Some(tx.gas),
        }))
    }
}

impl CanvasChain for FakeChain {
    fn profile_minted(&self) -> Result<bool> {
        Ok(self.profile_minted)
    }

    fn username_used(&self, username: &str) -> Result<bool> {
        Ok(self.taken_usernames.iter().any(|u| u == username))
    }

    fn has_badge(&self, badge: Address) -> Result<bool> {
        Ok(self.held_badges.contains(&badge))
    }

    fn origins_token(&self) -> Result<Option<U256>> {
        Ok(self.origins_token)
    }
}

pub fn badge(byte: u8) -> Badge {
    Badge {
        name: format!("badge-{}", byte),
        base_url: format!("https://badge-{}.test/api", byte),
        contract: Address::repeat_byte(byte),
        description: String::new(),
        mint_info: None,
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub badges: Vec<Badge>,
    pub catalog_down: bool,
    pub eligible: Vec<Address>,
    /// Badges whose check endpoint times out.
    pub check_down: Vec<Address>,
    pub usernames: RefCell<VecDeque<String>>,
    pub inactive_codes: Vec<String>,
    pub checked: RefCell<Vec<Address>>,
}

impl CanvasApi for FakeApi {
    fn badge_list(&self) -> Result<Vec<Badge>> {
        if self.catalog_down {
            return Err(Error::Network("404 Not Found".to_string()));
        }
        Ok(self.badges.clone())
    }

    fn check_eligibility(&self, badge: &Badge, _recipient: Address) -> Result<Eligibility> {
        self.checked.borrow_mut().push(badge.contract);
        if self.check_down.contains(&badge.contract) {
            return Err(Error::Eligibility(format!("{}: operation timed out", badge.name)));
        }
        Ok(Eligibility {
            eligible: self.eligible.contains(&badge.contract),
            message: String::new(),
        })
    }

    fn claim_payload(&self, badge: &Badge, _recipient: Address) -> Result<MintInfo> {
        Ok(MintInfo {
            to: badge.contract,
            data: web3::types::Bytes(vec![0xc1, 0xa1]),
        })
    }

    fn random_username(&self) -> Result<String> {
        self.usernames
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Network("no more usernames".to_string()))
    }

    fn invite_code_active(&self, code: &str) -> Result<bool> {
        Ok(!self.inactive_codes.iter().any(|c| c == code))
    }

    fn referral_signature(&self, _code: &str, _address: Address) -> Result<Vec<u8>> {
        Ok(vec![0x5e; 65])
    }
}
