//! Account batch loading.
//!
//! The input is a CSV file with one account per row. Every row is validated
//! before anything is returned: a single bad cell rejects the whole batch.
//! Rows whose private key is `random` ... `endrandom` bracket a block that is
//! shuffled in place, the marker rows themselves are dropped.

use crate::{
    error::{Error, Result},
    utils::{check_invite_code, check_private_key, check_username, key_id, short_key, Proxy, SleepRange},
};
use log::info;
use rand::seq::SliceRandom;
use std::{collections::HashMap, io::Read, path::Path};

pub const DEFAULT_INVITE_CODE: &str = "37FHD";

const COLUMNS: [&str; 10] = [
    "private_key",
    "username",
    "invite_code",
    "claim_badges",
    "auto_skip",
    "min_sleep_time",
    "max_sleep_time",
    "max_retries",
    "proxy",
    "mobile_proxy_changelink",
];

const RANDOM_START: &str = "random";
const RANDOM_END: &str = "endrandom";

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub private_key: String,
    /// `None` and `Some("random")` both ask for a generated name.
    pub username: Option<String>,
    pub invite_code: Option<String>,
    pub proxy: Option<Proxy>,
    pub mobile_proxy_changelink: Option<String>,
    pub claim_badges: bool,
    pub auto_skip: bool,
    pub sleep: SleepRange,
    pub max_retries: u32,
}

impl Account {
    pub fn id(&self) -> String {
        key_id(&self.private_key)
    }

    pub fn short_key(&self) -> String {
        short_key(&self.private_key)
    }

    fn is_marker(&self, marker: &str) -> bool {
        self.private_key.eq_ignore_ascii_case(marker)
    }
}

pub fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Validation(format!("cannot open \"{}\": {}", path.display(), e))
    })?;
    let accounts = parse_accounts(file)?;
    info!("[Account Loader] Loaded {} accounts from {}", accounts.len(), path.display());
    Ok(accounts)
}

pub fn parse_accounts<R: Read>(reader: R) -> Result<Vec<Account>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"))
        .collect();

    let unknown: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|h| !COLUMNS.contains(h))
        .collect();
    if !unknown.is_empty() {
        return Err(Error::Validation(format!(
            "Unknown account columns: {}",
            unknown.join(", ")
        )));
    }
    let missing: Vec<&str> = COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "Missing account columns: {}",
            missing.join(", ")
        )));
    }

    let mut accounts = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .collect();
        if let Some(account) = parse_row(&row, index + 2)? {
            accounts.push(account);
        }
    }

    shuffle_random_blocks(accounts)
}

fn cell<'a>(row: &HashMap<&str, &'a str>, column: &str) -> Option<&'a str> {
    row.get(column).copied().filter(|v| !v.is_empty())
}

fn flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v.to_lowercase().as_str(), "yes" | "+" | "1" | "true" | "y"),
        None => default,
    }
}

fn number(value: Option<&str>, default: f64, column: &str, line: usize) -> Result<f64> {
    let n = match value {
        Some(v) => v.parse::<f64>().map_err(|_| {
            Error::Validation(format!("Invalid {} \"{}\" on line {}", column, v, line))
        })?,
        None => default,
    };
    if !n.is_finite() || n < 0.0 {
        return Err(Error::Validation(format!(
            "{} must be a non-negative number on line {}",
            column, line
        )));
    }
    Ok(n)
}

fn parse_row(row: &HashMap<&str, &str>, line: usize) -> Result<Option<Account>> {
    let private_key = match cell(row, "private_key") {
        Some(key) => key.to_string(),
        None => return Ok(None),
    };
    let marker = private_key.eq_ignore_ascii_case(RANDOM_START) || private_key.eq_ignore_ascii_case(RANDOM_END);
    if !marker && !check_private_key(&private_key) {
        return Err(Error::Validation(format!(
            "Invalid private key \"{}\" on line {}",
            short_key(&private_key),
            line
        )));
    }

    let proxy = cell(row, "proxy").map(Proxy::parse).transpose()?;

    let username = cell(row, "username").map(str::to_string);
    if let Some(name) = &username {
        if !name.eq_ignore_ascii_case("random") && !check_username(name) {
            return Err(Error::Validation(format!(
                "Invalid username \"{}\" on line {}",
                name, line
            )));
        }
    }

    let invite_code = match cell(row, "invite_code") {
        None => Some(DEFAULT_INVITE_CODE.to_string()),
        Some(code) if code == "-" || code.eq_ignore_ascii_case("none") => None,
        Some(code) => {
            let code = code.to_uppercase();
            if !check_invite_code(&code) {
                return Err(Error::Validation(format!(
                    "Invalid invite code \"{}\" on line {}. Must be 5 uppercase letters or numbers or \"-\"/\"none\"",
                    code, line
                )));
            }
            Some(code)
        }
    };

    let min = number(cell(row, "min_sleep_time"), 1.0, "min_sleep_time", line)?;
    let max = number(cell(row, "max_sleep_time"), 10.0, "max_sleep_time", line)?;
    if min > max {
        return Err(Error::Validation(format!(
            "min_sleep_time {} is greater than max_sleep_time {} on line {}",
            min, max, line
        )));
    }
    let max_retries = number(cell(row, "max_retries"), 0.0, "max_retries", line)?.trunc() as u32;

    Ok(Some(Account {
        private_key,
        username,
        invite_code,
        proxy,
        mobile_proxy_changelink: cell(row, "mobile_proxy_changelink").map(str::to_string),
        claim_badges: flag(cell(row, "claim_badges"), true),
        auto_skip: flag(cell(row, "auto_skip"), true),
        sleep: SleepRange { min, max },
        max_retries,
    }))
}

/// Collapses every `random`/`endrandom` block into a shuffled run of its
/// interior rows.
pub fn shuffle_random_blocks(accounts: Vec<Account>) -> Result<Vec<Account>> {
    let mut out = Vec::with_capacity(accounts.len());
    let mut block: Option<Vec<Account>> = None;
    let mut rng = rand::thread_rng();

    for (index, account) in accounts.into_iter().enumerate() {
        if account.is_marker(RANDOM_START) {
            if block.is_some() {
                return Err(Error::Validation(format!(
                    "Found a Random account inside an unclosed random block (account #{})",
                    index + 1
                )));
            }
            block = Some(Vec::new());
        } else if account.is_marker(RANDOM_END) {
            match block.take() {
                Some(mut rows) => {
                    rows.shuffle(&mut rng);
                    out.extend(rows);
                }
                None => {
                    return Err(Error::Validation(format!(
                        "An EndRandom account found that is not preceded by a Random account (account #{})",
                        index + 1
                    )))
                }
            }
        } else if let Some(rows) = block.as_mut() {
            rows.push(account);
        } else {
            out.push(account);
        }
    }

    if block.is_some() {
        return Err(Error::Validation("Found a not closed random block".to_string()));
    }
    Ok(out)
}
