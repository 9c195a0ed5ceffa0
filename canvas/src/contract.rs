use crate::{error::Result, BlockClient, EvmRpc};
use web3::{
    contract::{Contract, Options},
    ethabi::{self, Token},
    transports::Http,
    types::{Address, H160, H256, U256},
};

pub const PROFILE_REGISTRY_ABI: &[u8] = include_bytes!("../abi/ProfileRegistry.json");
pub const BADGE_ABI: &[u8] = include_bytes!("../abi/Badge.json");
pub const ORIGINS_NFT_ABI: &[u8] = include_bytes!("../abi/ScrollOriginsNFT.json");
pub const EAS_ABI: &[u8] = include_bytes!("../abi/EAS.json");

/// Scroll mainnet deployments.
pub const PROFILE_REGISTRY: H160 = H160([
    0xb2, 0x3a, 0xf8, 0x70, 0x7c, 0x44, 0x2f, 0x59, 0xbd, 0xfc, 0x36, 0x86, 0x12, 0xbd, 0x8d, 0xbc, 0xca, 0x8a,
    0x7a, 0x5a,
]);
pub const ORIGINS_ATTESTOR: H160 = H160([
    0xc4, 0x73, 0x00, 0x42, 0x8b, 0x6a, 0xd2, 0xc7, 0xd0, 0x3b, 0xb7, 0x6d, 0x05, 0xa1, 0x76, 0x05, 0x8b, 0x47,
    0xe6, 0xb0,
]);
pub const ORIGINS_BADGE: H160 = H160([
    0x2d, 0xbc, 0xe6, 0x0e, 0xbe, 0xaa, 0xfb, 0x77, 0xe5, 0x47, 0x23, 0x08, 0xf4, 0x32, 0xf7, 0x8a, 0xc3, 0xae,
    0x07, 0xd9,
]);
pub const ORIGINS_NFT: H160 = H160([
    0x74, 0x67, 0x0a, 0x39, 0x98, 0xd9, 0xd6, 0x62, 0x2e, 0x32, 0xd0, 0x84, 0x7f, 0xf5, 0x97, 0x7c, 0x37, 0xe0,
    0xec, 0x91,
]);

/// EAS schema of Canvas badge attestations.
pub const BADGE_SCHEMA: H256 = H256([
    0xd5, 0x7d, 0xe4, 0xf4, 0x1c, 0x3d, 0x3c, 0xc8, 0x55, 0xea, 0xde, 0xf6, 0x8f, 0x98, 0xc0, 0xd4, 0xed, 0xd2,
    0x2d, 0x57, 0x16, 0x1d, 0x96, 0xb7, 0xc0, 0x6d, 0x2f, 0x43, 0x36, 0xcc, 0x3b, 0x49,
]);

/// 0.001 ETH, halved when minting with a referral.
pub const MINT_FEE: u64 = 1_000_000_000_000_000;

pub fn mint_fee(with_referral: bool) -> U256 {
    if with_referral {
        U256::from(MINT_FEE / 2)
    } else {
        U256::from(MINT_FEE)
    }
}

pub fn mint_calldata(username: &str, referral: &[u8]) -> Result<Vec<u8>> {
    let abi = ethabi::Contract::load(PROFILE_REGISTRY_ABI)?;
    Ok(abi
        .function("mint")?
        .encode_input(&[Token::String(username.to_string()), Token::Bytes(referral.to_vec())])?)
}

/// Attestation payload of the origins badge:
/// `(address badge, uint256 0x40, uint256 0x40, address nft, uint256 tokenId)`.
pub fn origins_payload(badge: Address, nft: Address, token_id: U256) -> Vec<u8> {
    ethabi::encode(&[
        Token::Address(badge),
        Token::Uint(U256::from(0x40)),
        Token::Uint(U256::from(0x40)),
        Token::Address(nft),
        Token::Uint(token_id),
    ])
}

pub fn attest_calldata(recipient: Address, payload: Vec<u8>) -> Result<Vec<u8>> {
    let abi = ethabi::Contract::load(EAS_ABI)?;
    let request = Token::Tuple(vec![
        Token::FixedBytes(BADGE_SCHEMA.as_bytes().to_vec()),
        Token::Tuple(vec![
            Token::Address(recipient),
            Token::Uint(U256::zero()),
            Token::Bool(false),
            Token::FixedBytes(vec![0u8; 32]),
            Token::Bytes(payload),
            Token::Uint(U256::zero()),
        ]),
    ]);
    Ok(abi.function("attest")?.encode_input(&[request])?)
}

/// Read-only views of the Canvas contracts for the client's account.
pub trait CanvasChain: EvmRpc {
    fn profile_minted(&self) -> Result<bool>;
    fn username_used(&self, username: &str) -> Result<bool>;
    /// `hasBadge(sender)` on any badge contract.
    fn has_badge(&self, badge: Address) -> Result<bool>;
    /// Token id of the sender's origins NFT, `None` if it never minted one.
    fn origins_token(&self) -> Result<Option<U256>>;
}

impl BlockClient {
    fn contract(&self, address: Address, abi: &[u8]) -> Result<Contract<Http>> {
        Ok(Contract::from_json(self.eth.clone(), address, abi)?)
    }
}

impl CanvasChain for BlockClient {
    fn profile_minted(&self) -> Result<bool> {
        let registry = self.contract(PROFILE_REGISTRY, PROFILE_REGISTRY_ABI)?;
        let profile: Address = self.block_on(registry.query(
            "getProfile",
            (self.root_addr,),
            None,
            Options::default(),
            None,
        ))?;
        Ok(self.block_on(registry.query("isProfileMinted", (profile,), None, Options::default(), None))?)
    }

    fn username_used(&self, username: &str) -> Result<bool> {
        let registry = self.contract(PROFILE_REGISTRY, PROFILE_REGISTRY_ABI)?;
        Ok(self.block_on(registry.query(
            "isUsernameUsed",
            (username.to_string(),),
            None,
            Options::default(),
            None,
        ))?)
    }

    fn has_badge(&self, badge: Address) -> Result<bool> {
        let contract = self.contract(badge, BADGE_ABI)?;
        Ok(self.block_on(contract.query("hasBadge", (self.root_addr,), None, Options::default(), None))?)
    }

    fn origins_token(&self) -> Result<Option<U256>> {
        let nft = self.contract(ORIGINS_NFT, ORIGINS_NFT_ABI)?;
        let minted: bool = self.block_on(nft.query("minted", (self.root_addr,), None, Options::default(), None))?;
        if !minted {
            return Ok(None);
        }
        let token_id: U256 = self.block_on(nft.query(
            "tokenOfOwnerByIndex",
            (self.root_addr, U256::zero()),
            None,
            Options::default(),
            None,
        ))?;
        Ok(Some(token_id))
    }
}
