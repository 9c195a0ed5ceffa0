//=====================================================================================================================

Account workflow:

The bot (off-chain) calls these methods on Scroll mainnet, per account

// ProfileRegistry: profile check and mint
- function getProfile(address account) external view returns (address)
- function isProfileMinted(address profile) external view returns (bool)
- function isUsernameUsed(string username) external view returns (bool)
- function mint(string username, bytes referral) external payable
    - value 0.001 ETH, 0.0005 ETH with a referral signature


// Badge contracts: skip badges that are already held
- function hasBadge(address user) external view returns (bool)


// Scroll Origins NFT: attestation payload source
- function minted(address account) external view returns (bool)
- function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256)


// EAS: origins badge attestation
- function attest((bytes32 schema, (address recipient, uint64 expirationTime, bool revocable, bytes32 refUID, bytes data, uint256 value) data) request) external payable returns (bytes32)


//=====================================================================================================================

Main thread:

Purpose: walk the account batch once, strictly one account after another.

    1> Load config.json (optional) and the accounts csv.
        - Any invalid row rejects the whole file, nothing is processed.
        - random / endrandom rows shuffle the rows between them.

    2> Compare the batch with last_state.json.
        - Same set of account ids: offer to continue from `account_hash`.
        - Otherwise start from the first row.
        - Write last_state.json, then update `account_hash` before every account.

    3> Per account:
        - GET the mobile proxy change link, wait 5 seconds.
        - Probe the proxy (geo endpoint, then google.com), every 15 seconds, until it answers,
          the attempts run out or Ctrl+C. Then ask: skip, exit, or drop the proxy.
        - Run the account workflow up to max(1, max_retries) times, random sleep in between.
        - Still failing: auto_skip skips, otherwise ask: skip, exit, or retry another round.


//=====================================================================================================================

Account workflow steps:

    1> getProfile + isProfileMinted, skip to 4> when already minted.

    2> Username: the csv value, or randomuser.me names until one is valid and free.
       Invite code: /code/{code}/active, then /code/{code}/sig/{address} for the referral.

    3> mint(username, referral), wait for the receipt, random sleep.
       claim_badges = false stops here with success.

    4> Badge list (scroll.badgelist.json plus the built-in Ethereum Year badge).
        - hasBadge: already claimed, skip.
        - {baseUrl}/check: unreachable is fine, the badge is skipped.
        - {baseUrl}/claim: tx.to / tx.data to send.

    5> Send every claim, random sleep in between. The first failure ends the account.

    6> Origins: no badge yet and an NFT minted, attest with
       (badge, 0x40, 0x40, nft, tokenId) as payload.

Every transaction:
    nonce -> gas quote (Rabby, then MetaMask, 10s cache, wait while above max_gwei)
          -> estimateGas * 1.25 -> sign -> send -> receipt every min(5s, timeout/10)
    "insufficient funds" at estimation is its own status, nothing is sent.
