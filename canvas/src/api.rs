//! Off-chain Canvas services: badge catalog, eligibility and claim
//! endpoints, invite codes and the username generator.

use crate::{
    error::{Error, Result},
    utils::{checksum, http_client, Proxy},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use web3::types::{Address, H160};

pub const BADGE_LIST_URL: &str =
    "https://raw.githubusercontent.com/scroll-tech/canvas-badges/main/scroll.badgelist.json";
pub const CANVAS_URL: &str = "https://canvas.scroll.cat";
pub const RANDOM_USER_URL: &str = "https://randomuser.me/api/";

const TIMEOUT: Duration = Duration::from_secs(5);

/// Claim transaction handed out by a badge issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub to: Address,
    pub data: web3::types::Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    #[serde(rename = "baseUrl", alias = "base_url")]
    pub base_url: String,
    #[serde(rename = "badgeContract", alias = "contract_address")]
    pub contract: Address,
    #[serde(default)]
    pub description: String,
    #[serde(skip)]
    pub mint_info: Option<MintInfo>,
}

/// Badges that are claimable but missing from the public list.
pub fn builtin_badges() -> Vec<Badge> {
    vec![Badge {
        name: "Ethereum Year".to_string(),
        base_url: "https://canvas.scroll.cat/badge".to_string(),
        contract: H160([
            0x3d, 0xac, 0xad, 0x96, 0x1e, 0x5e, 0x2d, 0xe8, 0x50, 0xf5, 0xe0, 0x27, 0xc7, 0x0b, 0x56, 0xb5, 0xaf,
            0xa5, 0xdf, 0xed,
        ]),
        description: "Check out the Ethereum Year Badge! It's like a digital trophy that shows off the year your wallet made its debut on Ethereum. It's a little present from Scroll to celebrate all the cool stuff you've done in the Ethereum ecosystem.".to_string(),
        mint_info: None,
    }]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Eligibility {
    #[serde(rename = "eligibility")]
    pub eligible: bool,
    #[serde(default)]
    pub message: String,
}

pub trait CanvasApi {
    fn badge_list(&self) -> Result<Vec<Badge>>;
    fn check_eligibility(&self, badge: &Badge, recipient: Address) -> Result<Eligibility>;
    fn claim_payload(&self, badge: &Badge, recipient: Address) -> Result<MintInfo>;
    fn random_username(&self) -> Result<String>;
    fn invite_code_active(&self, code: &str) -> Result<bool>;
    fn referral_signature(&self, code: &str, address: Address) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct BadgeList {
    badges: Vec<Badge>,
}

#[derive(Deserialize)]
struct ClaimResponse {
    tx: MintInfo,
}

#[derive(Deserialize)]
struct CodeActive {
    active: bool,
}

#[derive(Deserialize)]
struct Signature {
    signature: web3::types::Bytes,
}

pub struct HttpCanvasApi {
    client: reqwest::blocking::Client,
    canvas_url: String,
}

impl HttpCanvasApi {
    pub fn new(proxy: Option<&Proxy>) -> Result<Self> {
        Ok(HttpCanvasApi {
            client: http_client(proxy, Some(TIMEOUT))?,
            canvas_url: CANVAS_URL.to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let res = self.client.get(url).query(query).send()?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(Error::Network(format!("{} - {}", status, body)));
        }
        Ok(res.json::<T>()?)
    }
}

fn badge_query(badge: &Badge, recipient: Address) -> [(&'static str, String); 2] {
    [
        ("badge", checksum(&badge.contract)),
        ("recipient", checksum(&recipient)),
    ]
}

impl CanvasApi for HttpCanvasApi {
    fn badge_list(&self) -> Result<Vec<Badge>> {
        Ok(self.get_json::<BadgeList>(BADGE_LIST_URL, &[])?.badges)
    }

    fn check_eligibility(&self, badge: &Badge, recipient: Address) -> Result<Eligibility> {
        let url = format!("{}/check", badge.base_url);
        self.get_json(&url, &badge_query(badge, recipient))
            .map_err(|e| Error::Eligibility(format!("{}: {}", badge.name, e)))
    }

    fn claim_payload(&self, badge: &Badge, recipient: Address) -> Result<MintInfo> {
        let url = format!("{}/claim", badge.base_url);
        Ok(self.get_json::<ClaimResponse>(&url, &badge_query(badge, recipient))?.tx)
    }

    fn random_username(&self) -> Result<String> {
        let json: serde_json::Value = self.get_json(RANDOM_USER_URL, &[])?;
        json.pointer("/results/0/login/username")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Network("randomuser.me returned no username".to_string()))
    }

    fn invite_code_active(&self, code: &str) -> Result<bool> {
        let url = format!("{}/code/{}/active", self.canvas_url, code);
        Ok(self.get_json::<CodeActive>(&url, &[])?.active)
    }

    fn referral_signature(&self, code: &str, address: Address) -> Result<Vec<u8>> {
        let url = format!("{}/code/{}/sig/{}", self.canvas_url, code, checksum(&address));
        Ok(self.get_json::<Signature>(&url, &[])?.signature.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock;

    #[test]
    fn badge_list_entries_deserialize() {
        let list: BadgeList = serde_json::from_str(
            r#"{"badges": [{
                "name": "Scroll Origins NFT",
                "image": "https://example.com/a.png",
                "description": "hold the nft",
                "baseUrl": "https://example.com/api",
                "badgeContract": "0x2dBce60ebeAafb77e5472308f432F78aC3AE07d9",
                "issuer": {"name": "Scroll"}
            }]}"#,
        )
        .unwrap();
        let badge = &list.badges[0];
        assert_eq!(badge.base_url, "https://example.com/api");
        assert_eq!(badge.contract, crate::contract::ORIGINS_BADGE);
        assert!(badge.mint_info.is_none());
    }

    #[test]
    fn claim_and_check_payloads_deserialize() {
        let claim: ClaimResponse = serde_json::from_str(
            r#"{"code": 1, "tx": {"to": "0x3dacad961e5e2de850f5e027c70b56b5afa5dfed", "data": "0xdeadbeef"}}"#,
        )
        .unwrap();
        assert_eq!(claim.tx.to, builtin_badges()[0].contract);
        assert_eq!(claim.tx.data.0, vec![0xde, 0xad, 0xbe, 0xef]);

        let check: Eligibility = serde_json::from_str(r#"{"eligibility": false, "message": "too young"}"#).unwrap();
        assert!(!check.eligible);
        assert_eq!(check.message, "too young");
        let bare: Eligibility = serde_json::from_str(r#"{"eligibility": true}"#).unwrap();
        assert!(bare.eligible);
    }

    #[test]
    fn badge_query_uses_checksummed_addresses() {
        let q = badge_query(&mock::badge(0xab), crate::contract::ORIGINS_BADGE);
        assert_eq!(q[0].0, "badge");
        assert_eq!(q[1], ("recipient", "0x2dBce60ebeAafb77e5472308f432F78aC3AE07d9".to_string()));
    }
}
