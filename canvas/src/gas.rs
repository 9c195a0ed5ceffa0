//! Fee quotes with a per-network cache and a hard price ceiling.

use crate::{
    config::{Network, NetworkName},
    error::{Error, Result},
    utils::{self, http_client, Proxy},
};
use log::{info, warn};
use serde::Deserialize;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use web3::types::{CallRequest, TransactionParameters, U256, U64};

pub const QUOTE_TTL: Duration = Duration::from_secs(10);
pub const CEILING_POLL: Duration = Duration::from_secs(10);

const GWEI: f64 = 1_000_000_000.0;
const RABBY_URL: &str = "https://api.rabby.io/v1/wallet/gas_market";
const RABBY_HEADERS: [(&str, &str); 6] = [
    ("X-Api-Ver", "v2"),
    ("X-Client", "Rabby"),
    ("X-Version", "0.92.52"),
    ("X-Api-Nonce", "n_0LknmB7aJePWhQezXR3SFQeLmf0Q3wDDnSpgDJxS"),
    ("X-Api-Sign", "058c4e73eb35b19a57ffca66643937e447dcacd9a3c653df774fb7c45e328462"),
    ("X-Api-Ts", "1709038705"),
];
const METAMASK_URL: &str = "https://gas-api.metaswap.codefi.network/networks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasQuote {
    Legacy { gas_price: U256 },
    Eip1559 { max_fee: U256, max_priority_fee: U256 },
}

impl GasQuote {
    /// The price compared against the ceiling.
    pub fn price(&self) -> U256 {
        match self {
            GasQuote::Legacy { gas_price } => *gas_price,
            GasQuote::Eip1559 { max_fee, .. } => *max_fee,
        }
    }

    pub fn price_gwei(&self) -> f64 {
        self.price().low_u128() as f64 / GWEI
    }

    pub fn apply(&self, tx: &mut TransactionParameters) {
        match *self {
            GasQuote::Legacy { gas_price } => {
                tx.gas_price = Some(gas_price);
                tx.transaction_type = None;
            }
            GasQuote::Eip1559 { max_fee, max_priority_fee } => {
                tx.max_fee_per_gas = Some(max_fee);
                tx.max_priority_fee_per_gas = Some(max_priority_fee);
                tx.transaction_type = Some(U64::from(2));
            }
        }
    }

    pub fn apply_call(&self, req: &mut CallRequest) {
        match *self {
            GasQuote::Legacy { gas_price } => req.gas_price = Some(gas_price),
            GasQuote::Eip1559 { max_fee, max_priority_fee } => {
                req.max_fee_per_gas = Some(max_fee);
                req.max_priority_fee_per_gas = Some(max_priority_fee);
                req.transaction_type = Some(U64::from(2));
            }
        }
    }
}

pub trait GasSource {
    fn name(&self) -> &'static str;
    fn quote(&self, network: &Network, proxy: Option<&Proxy>) -> Result<GasQuote>;
}

pub fn gwei_to_wei(gwei: f64) -> U256 {
    U256::from((gwei * GWEI).round() as u128)
}

#[derive(Debug, Deserialize)]
struct RabbyLevel {
    price: f64,
    priority_price: Option<f64>,
}

/// Rabby wallet gas market, the `normal` tier.
#[derive(Debug, Default)]
pub struct RabbyGasMarket;

impl RabbyGasMarket {
    fn parse(levels: &[RabbyLevel]) -> Result<GasQuote> {
        let normal = levels
            .get(1)
            .ok_or_else(|| Error::Network("rabby gas market returned no normal tier".to_string()))?;
        let gas_price = U256::from(normal.price as u128);
        Ok(match normal.priority_price {
            Some(priority) => GasQuote::Eip1559 {
                max_fee: gas_price,
                max_priority_fee: U256::from(priority as u128),
            },
            None => GasQuote::Legacy { gas_price },
        })
    }
}

impl GasSource for RabbyGasMarket {
    fn name(&self) -> &'static str {
        "Rabby"
    }

    fn quote(&self, network: &Network, proxy: Option<&Proxy>) -> Result<GasQuote> {
        let rabby_id = network
            .rabby_id
            .as_deref()
            .ok_or_else(|| Error::Unsupported(format!("Rabby has no gas market for {}", network.name)))?;
        let mut req = http_client(proxy, Some(Duration::from_secs(10)))?
            .get(RABBY_URL)
            .query(&[("chain_id", rabby_id)]);
        for (name, value) in RABBY_HEADERS {
            req = req.header(name, value);
        }
        let res = req.send()?;
        if !res.status().is_success() {
            return Err(Error::Network(format!("rabby gas market: {}", res.status())));
        }
        Self::parse(&res.json::<Vec<RabbyLevel>>()?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaMaskLevel {
    suggested_max_fee_per_gas: String,
    suggested_max_priority_fee_per_gas: String,
}

#[derive(Debug, Deserialize)]
struct MetaMaskFees {
    medium: MetaMaskLevel,
}

/// MetaMask (Infura) suggested fees, the `medium` tier, always EIP-1559.
#[derive(Debug, Default)]
pub struct MetaMaskGasApi;

impl MetaMaskGasApi {
    fn parse(fees: &MetaMaskFees) -> Result<GasQuote> {
        let gwei = |s: &str| {
            s.parse::<f64>()
                .map(gwei_to_wei)
                .map_err(|_| Error::Network(format!("bad gwei value \"{}\"", s)))
        };
        Ok(GasQuote::Eip1559 {
            max_fee: gwei(&fees.medium.suggested_max_fee_per_gas)?,
            max_priority_fee: gwei(&fees.medium.suggested_max_priority_fee_per_gas)?,
        })
    }
}

impl GasSource for MetaMaskGasApi {
    fn name(&self) -> &'static str {
        "MetaMask"
    }

    fn quote(&self, network: &Network, proxy: Option<&Proxy>) -> Result<GasQuote> {
        let url = format!("{}/{}/suggestedGasFees", METAMASK_URL, network.chain_id);
        let res = http_client(proxy, Some(Duration::from_secs(10)))?.get(url).send()?;
        if !res.status().is_success() {
            return Err(Error::Network(format!("metamask gas api: {}", res.status())));
        }
        Self::parse(&res.json::<MetaMaskFees>()?)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedQuote {
    at: Instant,
    quote: GasQuote,
}

pub struct GasOracle {
    primary: Box<dyn GasSource>,
    fallback: Box<dyn GasSource>,
    cache: HashMap<NetworkName, CachedQuote>,
    ttl: Duration,
    poll: Duration,
    /// Mainnet ceiling that Scroll transactions also wait for.
    l1_gate: Option<Network>,
}

impl Default for GasOracle {
    fn default() -> Self {
        Self::new(Box::new(RabbyGasMarket), Box::new(MetaMaskGasApi))
    }
}

impl GasOracle {
    pub fn new(primary: Box<dyn GasSource>, fallback: Box<dyn GasSource>) -> Self {
        GasOracle {
            primary,
            fallback,
            cache: HashMap::new(),
            ttl: QUOTE_TTL,
            poll: CEILING_POLL,
            l1_gate: None,
        }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Scroll quotes are only handed out while `eth` is under its own
    /// `max_gwei`. Without a mainnet ceiling nothing is gated.
    pub fn with_l1_gate(mut self, eth: Network) -> Self {
        self.l1_gate = Some(eth).filter(|n| n.name == NetworkName::Eth && n.max_gwei.is_some());
        self
    }

    /// Primary source, then fallback. Neither cached nor capped.
    pub fn quote(&self, network: &Network, proxy: Option<&Proxy>) -> Result<GasQuote> {
        match self.primary.quote(network, proxy) {
            Ok(quote) => Ok(quote),
            Err(e) => {
                warn!(
                    "[Gas] Failed to get gas price for {} on {}: {}",
                    network.name,
                    self.primary.name(),
                    e
                );
                self.fallback.quote(network, proxy).map_err(|e| {
                    Error::Network(format!(
                        "no gas price for {} from {}: {}",
                        network.name,
                        self.fallback.name(),
                        e
                    ))
                })
            }
        }
    }

    /// Returns a quote at or below the network ceiling, blocking until one is
    /// available. Errors only when no source can be reached.
    ///
    /// On Scroll every poll first waits for the mainnet gate, if any.
    pub fn suggest(&mut self, network: &Network, proxy: Option<&Proxy>) -> Result<GasQuote> {
        if let Some(cached) = self.cache.get(&network.name) {
            if cached.at.elapsed() <= self.ttl {
                return Ok(cached.quote);
            }
        }

        let gate = match network.name {
            NetworkName::Scroll => self.l1_gate.clone(),
            NetworkName::Eth => None,
        };
        let quote = loop {
            if let Some(eth) = &gate {
                self.suggest(eth, proxy)?;
            }
            let quote = self.quote(network, proxy)?;
            match network.max_gwei {
                Some(max) if quote.price_gwei() > max => {
                    info!(
                        "[Gas] Current gas price {:.3} Gwei is higher than max {} Gwei in {} network",
                        quote.price_gwei(),
                        max,
                        network.name
                    );
                    utils::sleep(self.poll);
                }
                _ => break quote,
            }
        };

        self.cache.insert(
            network.name,
            CachedQuote {
                at: Instant::now(),
                quote,
            },
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    struct Scripted {
        replies: RefCell<VecDeque<Result<GasQuote>>>,
        calls: Rc<RefCell<u32>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<GasQuote>>) -> (Box<Self>, Rc<RefCell<u32>>) {
            let calls = Rc::new(RefCell::new(0));
            (
                Box::new(Scripted {
                    replies: RefCell::new(replies.into()),
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    impl GasSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn quote(&self, _network: &Network, _proxy: Option<&Proxy>) -> Result<GasQuote> {
            *self.calls.borrow_mut() += 1;
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("exhausted".to_string())))
        }
    }

    fn legacy(gwei: f64) -> GasQuote {
        GasQuote::Legacy {
            gas_price: gwei_to_wei(gwei),
        }
    }

    fn scroll(max_gwei: Option<f64>) -> Network {
        let mut n = Network::builtin(NetworkName::Scroll);
        n.max_gwei = max_gwei;
        n
    }

    #[test]
    fn blocks_until_price_is_under_ceiling() {
        let (primary, calls) = Scripted::new(vec![Ok(legacy(3.0)), Ok(legacy(2.5)), Ok(legacy(0.4))]);
        let (fallback, _) = Scripted::new(vec![]);
        let mut oracle = GasOracle::new(primary, fallback).with_poll_interval(Duration::ZERO);
        let quote = oracle.suggest(&scroll(Some(0.5)), None).unwrap();
        assert_eq!(quote, legacy(0.4));
        assert!(quote.price_gwei() <= 0.5);
        assert_eq!(*calls.borrow(), 3);
    }

    /// Replies per network, in order, and records which network was asked.
    struct PerNetwork {
        replies: RefCell<HashMap<NetworkName, VecDeque<GasQuote>>>,
        asked: Rc<RefCell<Vec<NetworkName>>>,
    }

    impl GasSource for PerNetwork {
        fn name(&self) -> &'static str {
            "per-network"
        }

        fn quote(&self, network: &Network, _proxy: Option<&Proxy>) -> Result<GasQuote> {
            self.asked.borrow_mut().push(network.name);
            self.replies
                .borrow_mut()
                .get_mut(&network.name)
                .and_then(|q| q.pop_front())
                .ok_or_else(|| Error::Network("exhausted".to_string()))
        }
    }

    #[test]
    fn scroll_waits_for_mainnet_ceiling() {
        let asked = Rc::new(RefCell::new(Vec::new()));
        let mut replies = HashMap::new();
        replies.insert(NetworkName::Eth, VecDeque::from(vec![legacy(30.0), legacy(12.0)]));
        replies.insert(NetworkName::Scroll, VecDeque::from(vec![legacy(0.04)]));
        let primary = Box::new(PerNetwork {
            replies: RefCell::new(replies),
            asked: asked.clone(),
        });
        let (fallback, _) = Scripted::new(vec![]);
        let mut eth = Network::builtin(NetworkName::Eth);
        eth.max_gwei = Some(20.0);
        let mut oracle = GasOracle::new(primary, fallback)
            .with_poll_interval(Duration::ZERO)
            .with_l1_gate(eth);

        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), legacy(0.04));
        assert_eq!(
            *asked.borrow(),
            vec![NetworkName::Eth, NetworkName::Eth, NetworkName::Scroll]
        );
    }

    #[test]
    fn mainnet_without_ceiling_gates_nothing() {
        let (primary, calls) = Scripted::new(vec![Ok(legacy(0.04))]);
        let (fallback, _) = Scripted::new(vec![]);
        let mut oracle = GasOracle::new(primary, fallback).with_l1_gate(Network::builtin(NetworkName::Eth));
        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), legacy(0.04));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn fresh_quotes_are_cached_per_network() {
        let (primary, calls) = Scripted::new(vec![Ok(legacy(1.0)), Ok(legacy(20.0))]);
        let (fallback, _) = Scripted::new(vec![]);
        let mut oracle = GasOracle::new(primary, fallback);
        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), legacy(1.0));
        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), legacy(1.0));
        assert_eq!(*calls.borrow(), 1);

        let eth = Network::builtin(NetworkName::Eth);
        assert_eq!(oracle.suggest(&eth, None).unwrap(), legacy(20.0));
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn stale_quotes_are_refetched() {
        let (primary, calls) = Scripted::new(vec![Ok(legacy(1.0)), Ok(legacy(2.0))]);
        let (fallback, _) = Scripted::new(vec![]);
        let mut oracle = GasOracle::new(primary, fallback).with_ttl(Duration::ZERO);
        oracle.suggest(&scroll(None), None).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), legacy(2.0));
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn falls_back_then_fails() {
        let eip = GasQuote::Eip1559 {
            max_fee: gwei_to_wei(1.0),
            max_priority_fee: gwei_to_wei(0.1),
        };
        let (primary, _) = Scripted::new(vec![Err(Error::Unsupported("x".to_string()))]);
        let (fallback, fallback_calls) = Scripted::new(vec![Ok(eip)]);
        let mut oracle = GasOracle::new(primary, fallback);
        assert_eq!(oracle.suggest(&scroll(None), None).unwrap(), eip);
        assert_eq!(*fallback_calls.borrow(), 1);

        let (primary, _) = Scripted::new(vec![]);
        let (fallback, _) = Scripted::new(vec![]);
        let mut oracle = GasOracle::new(primary, fallback);
        assert!(matches!(
            oracle.suggest(&scroll(None), None),
            Err(Error::Network(_))
        ));
    }

    #[test]
    fn fee_model_follows_returned_fields() {
        let levels: Vec<RabbyLevel> = serde_json::from_str(
            r#"[{"level":"slow","price":1000},{"level":"normal","price":2000000000,"priority_price":1500000}]"#,
        )
        .unwrap();
        assert_eq!(
            RabbyGasMarket::parse(&levels).unwrap(),
            GasQuote::Eip1559 {
                max_fee: U256::from(2_000_000_000u64),
                max_priority_fee: U256::from(1_500_000u64)
            }
        );

        let levels: Vec<RabbyLevel> =
            serde_json::from_str(r#"[{"price":1},{"price":42000000}]"#).unwrap();
        assert_eq!(
            RabbyGasMarket::parse(&levels).unwrap(),
            GasQuote::Legacy {
                gas_price: U256::from(42_000_000u64)
            }
        );

        let fees: MetaMaskFees = serde_json::from_str(
            r#"{"medium":{"suggestedMaxFeePerGas":"12.5","suggestedMaxPriorityFeePerGas":"1.25"}}"#,
        )
        .unwrap();
        assert_eq!(
            MetaMaskGasApi::parse(&fees).unwrap(),
            GasQuote::Eip1559 {
                max_fee: U256::from(12_500_000_000u64),
                max_priority_fee: U256::from(1_250_000_000u64)
            }
        );
    }

    #[test]
    fn quote_fills_the_right_fields() {
        let mut tx = TransactionParameters::default();
        legacy(1.0).apply(&mut tx);
        assert_eq!(tx.gas_price, Some(gwei_to_wei(1.0)));
        assert_eq!(tx.transaction_type, None);

        let mut tx = TransactionParameters::default();
        GasQuote::Eip1559 {
            max_fee: U256::from(10),
            max_priority_fee: U256::from(1),
        }
        .apply(&mut tx);
        assert_eq!(tx.max_fee_per_gas, Some(U256::from(10)));
        assert_eq!(tx.transaction_type, Some(U64::from(2)));
    }
}
