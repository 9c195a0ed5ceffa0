use std::fmt::Formatter;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Validation(String),
    Config(String),
    Eligibility(String),
    Transaction(String),
    InsufficientBalance,
    Network(String),
    Proxy(String),
    Unsupported(String),
    Rpc(web3::Error),
    Contract(web3::contract::Error),
    Abi(web3::ethabi::Error),
    Http(reqwest::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Key(secp256k1::Error),
    Url(url::ParseError),
    Io(std::io::Error),
}

/// Terminal outcome of a transaction or of a whole account workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    InsufficientBalance,
    Failed,
}

impl TxStatus {
    pub fn is_success(self) -> bool {
        self == TxStatus::Success
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxStatus::Success => "SUCCESS",
            TxStatus::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TxStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "validation failed: {}", e),
            Error::Config(e) => write!(f, "bad configuration: {}", e),
            Error::Eligibility(e) => write!(f, "eligibility check failed: {}", e),
            Error::Transaction(e) => write!(f, "transaction failed: {}", e),
            Error::InsufficientBalance => write!(f, "insufficient balance"),
            Error::Network(e) => write!(f, "network unavailable: {}", e),
            Error::Proxy(e) => write!(f, "proxy error: {}", e),
            Error::Unsupported(e) => write!(f, "not supported: {}", e),
            Error::Rpc(e) => write!(f, "rpc error: {}", e),
            Error::Contract(e) => write!(f, "contract error: {}", e),
            Error::Abi(e) => write!(f, "abi error: {}", e),
            Error::Http(e) => write!(f, "http error: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Csv(e) => write!(f, "csv error: {}", e),
            Error::Key(e) => write!(f, "key error: {}", e),
            Error::Url(e) => write!(f, "url error: {}", e),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Rpc(e) => Some(e),
            Error::Contract(e) => Some(e),
            Error::Abi(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Csv(e) => Some(e),
            Error::Key(e) => Some(e),
            Error::Url(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($src:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$src> for Error {
                fn from(e: $src) -> Self {
                    Error::$variant(e)
                }
            }
        )*
    };
}

impl_from! {
    web3::Error => Rpc,
    web3::contract::Error => Contract,
    web3::ethabi::Error => Abi,
    reqwest::Error => Http,
    serde_json::Error => Json,
    csv::Error => Csv,
    secp256k1::Error => Key,
    url::ParseError => Url,
    std::io::Error => Io,
}

/// Node error strings are the only signal for an underfunded sender.
pub fn is_insufficient_funds(err: &Error) -> bool {
    match err {
        Error::InsufficientBalance => true,
        e => e.to_string().to_lowercase().contains("insufficient funds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_is_detected_from_node_message() {
        let err = Error::Rpc(web3::Error::InvalidResponse(
            "Insufficient funds for gas * price + value".to_string(),
        ));
        assert!(is_insufficient_funds(&err));
        assert!(is_insufficient_funds(&Error::InsufficientBalance));
        assert!(!is_insufficient_funds(&Error::Network("timeout".to_string())));
    }
}
