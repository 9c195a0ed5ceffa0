//! One pass over one account: profile, badges, origins attestation.
//!
//! Every stage reads chain or Canvas state first and only sends a
//! transaction when there is something left to do, so a pass can be
//! repeated after a failure without double-minting. Any error that escapes a
//! stage ends the pass as [`TxStatus::Failed`].

use crate::{
    accounts::Account,
    api::{builtin_badges, Badge, CanvasApi},
    contract::{
        attest_calldata, mint_calldata, mint_fee, origins_payload, CanvasChain, ORIGINS_ATTESTOR, ORIGINS_BADGE,
        ORIGINS_NFT, PROFILE_REGISTRY,
    },
    error::{Error, Result, TxStatus},
    tx::{Submitter, TxRequest},
    utils::{check_invite_code, check_username, checksum, sleep_quiet},
};
use log::{error, info, warn};
use std::time::Duration;
use web3::types::U256;

const USERNAME_PAUSE: Duration = Duration::from_secs(1);
const MAX_USERNAME_ATTEMPTS: u32 = 100;

pub struct Workflow<'a, C: ?Sized, A: ?Sized> {
    chain: &'a C,
    api: &'a A,
    account: &'a Account,
    submitter: Submitter<'a>,
    username_pause: Duration,
}

impl<'a, C, A> Workflow<'a, C, A>
where
    C: CanvasChain + ?Sized,
    A: CanvasApi + ?Sized,
{
    pub fn new(chain: &'a C, api: &'a A, account: &'a Account, submitter: Submitter<'a>) -> Self {
        Workflow {
            chain,
            api,
            account,
            submitter,
            username_pause: USERNAME_PAUSE,
        }
    }

    pub fn with_username_pause(mut self, pause: Duration) -> Self {
        self.username_pause = pause;
        self
    }

    pub fn run(&mut self) -> TxStatus {
        match self.try_run() {
            Ok(status) => status,
            Err(e) => {
                error!("[Scroll Canvas] {}", e);
                TxStatus::Failed
            }
        }
    }

    fn try_run(&mut self) -> Result<TxStatus> {
        let address = checksum(&self.chain.sender());
        if self.chain.profile_minted()? {
            info!("[Scroll Canvas] Profile is already minted for {}", address);
        } else {
            info!("[Scroll Canvas] Minting profile for {}", address);
            let status = self.mint_profile()?;
            if !status.is_success() {
                return Ok(status);
            }
            self.account.sleep.sleep();
        }

        if !self.account.claim_badges {
            return Ok(TxStatus::Success);
        }

        let claimable = self.eligible_badges()?;
        if claimable.is_empty() {
            info!("[Scroll Canvas] No badges to claim were found");
        } else {
            info!("[Scroll Canvas] Claiming {} badges", claimable.len());
        }
        for badge in claimable {
            let status = self.claim_badge(&badge);
            if !status.is_success() {
                return Ok(status);
            }
            self.account.sleep.sleep();
        }

        self.claim_origins()
    }

    fn resolve_username(&self) -> Result<Option<String>> {
        match self.account.username.as_deref() {
            Some(name) if !name.eq_ignore_ascii_case("random") => {
                if !check_username(name) {
                    error!(
                        "[Scroll Canvas] Invalid username: {}. Must be 4-15 characters long and contain only letters, numbers, and underscores",
                        name
                    );
                    return Ok(None);
                }
                if self.chain.username_used(name)? {
                    error!("[Scroll Canvas] Username {} is already taken", name);
                    return Ok(None);
                }
                Ok(Some(name.to_string()))
            }
            _ => {
                info!("[Scroll Canvas] Generating random username");
                for _ in 0..MAX_USERNAME_ATTEMPTS {
                    match self.api.random_username() {
                        Ok(name) if check_username(&name) => {
                            if !self.chain.username_used(&name)? {
                                info!("[Scroll Canvas] Generated username: {}", name);
                                return Ok(Some(name));
                            }
                        }
                        Ok(_) => {}
                        Err(e) => error!("[Scroll Canvas] Failed to get random username: {}", e),
                    }
                    sleep_quiet(self.username_pause);
                }
                Err(Error::Network(format!(
                    "no free username after {} attempts",
                    MAX_USERNAME_ATTEMPTS
                )))
            }
        }
    }

    /// Referral signature for the account's invite code, empty without one.
    /// `None` when the code cannot be used.
    fn referral(&self) -> Result<Option<Vec<u8>>> {
        let code = match &self.account.invite_code {
            Some(code) => code.to_uppercase(),
            None => return Ok(Some(Vec::new())),
        };
        if !check_invite_code(&code) {
            error!(
                "[Scroll Canvas] Invalid invite code: {}. Must be 5 uppercase letters or numbers",
                code
            );
            return Ok(None);
        }
        if !self.api.invite_code_active(&code)? {
            error!("[Scroll Canvas] Invite code {} is not active", code);
            return Ok(None);
        }
        Ok(Some(self.api.referral_signature(&code, self.chain.sender())?))
    }

    fn mint_profile(&mut self) -> Result<TxStatus> {
        let username = match self.resolve_username()? {
            Some(name) => name,
            None => return Ok(TxStatus::Failed),
        };
        let referral = match self.referral()? {
            Some(sig) => sig,
            None => return Ok(TxStatus::Failed),
        };
        let req = TxRequest {
            to: PROFILE_REGISTRY,
            data: mint_calldata(&username, &referral)?,
            value: mint_fee(!referral.is_empty()),
            label: format!("mint profile {}", username),
        };
        Ok(self.submitter.submit(self.chain, &req))
    }

    fn eligible_badges(&self) -> Result<Vec<Badge>> {
        info!("[Scroll Canvas] Fetching eligible badges");
        let catalog = self
            .api
            .badge_list()
            .map_err(|e| Error::Network(format!("Failed to get the badge list: {}", e)))?;
        let badges: Vec<Badge> = builtin_badges().into_iter().chain(catalog).collect();
        info!("[Scroll Canvas] Fetched {} badges, checking eligibility", badges.len());

        let recipient = self.chain.sender();
        let mut claimable = Vec::new();
        for mut badge in badges {
            if self.chain.has_badge(badge.contract)? {
                info!("[Scroll Canvas] {} badge is already claimed", badge.name);
                continue;
            }
            let check = match self.api.check_eligibility(&badge, recipient) {
                Ok(check) => check,
                Err(e) => {
                    warn!(
                        "[Scroll Canvas] Failed to check eligibility for {} badge. Usually this is okay: {}",
                        badge.name, e
                    );
                    continue;
                }
            };
            if !check.eligible {
                info!(
                    "[Scroll Canvas] Account is not eligible for {} badge: {}",
                    badge.name, check.message
                );
                if !badge.description.is_empty() {
                    info!("[Scroll Canvas] Requirement: {}", badge.description);
                }
                continue;
            }
            info!("[Scroll Canvas] Account is eligible for {} badge", badge.name);
            match self.api.claim_payload(&badge, recipient) {
                Ok(mint_info) => {
                    badge.mint_info = Some(mint_info);
                    claimable.push(badge);
                }
                Err(e) => error!("[Scroll Canvas] Failed to get claim data for {} badge: {}", badge.name, e),
            }
        }
        Ok(claimable)
    }

    fn claim_badge(&mut self, badge: &Badge) -> TxStatus {
        let mint_info = match &badge.mint_info {
            Some(info) => info,
            None => return TxStatus::Failed,
        };
        let req = TxRequest {
            to: mint_info.to,
            data: mint_info.data.0.clone(),
            value: U256::zero(),
            label: format!("claim {} badge", badge.name),
        };
        self.submitter.submit(self.chain, &req)
    }

    fn claim_origins(&mut self) -> Result<TxStatus> {
        info!("[Scroll Canvas] Checking eligibility for Scroll Origins NFT badge");
        if self.chain.has_badge(ORIGINS_BADGE)? {
            info!("[Scroll Canvas] Scroll Origins NFT badge is already claimed");
            return Ok(TxStatus::Success);
        }
        let token_id = match self.chain.origins_token()? {
            Some(id) => id,
            None => {
                info!("[Scroll Canvas] Account is not eligible for Scroll Origins NFT badge");
                return Ok(TxStatus::Success);
            }
        };
        info!("[Scroll Canvas] Account is eligible for Scroll Origins NFT badge, claiming");
        let payload = origins_payload(ORIGINS_BADGE, ORIGINS_NFT, token_id);
        let req = TxRequest {
            to: ORIGINS_ATTESTOR,
            data: attest_calldata(self.chain.sender(), payload)?,
            value: U256::zero(),
            label: "claim Scroll Origins NFT badge".to_string(),
        };
        Ok(self.submitter.submit(self.chain, &req))
    }
}
