use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A chain this wallet knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Polkadot,
    Kusama,
}

/// Static per-chain constants: display units, address prefix, the minimum
/// balance an account needs to exist, and default service endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProperties {
    pub block_time_ms: u64,
    pub address_prefix: u16,
    pub token_symbol: &'static str,
    pub token_decimals: u32,
    pub existential_deposit: u128,
    pub indexer_url: &'static str,
    pub rpc_url: &'static str,
}

impl Network {
    pub fn properties(&self) -> ChainProperties {
        match self {
            Network::Polkadot => ChainProperties {
                block_time_ms: 6_000,
                address_prefix: 0,
                token_symbol: "DOT",
                token_decimals: 10,
                existential_deposit: 10_000_000_000,
                indexer_url: "https://polkadot.api.subscan.io",
                rpc_url: "https://rpc.polkadot.io",
            },
            Network::Kusama => ChainProperties {
                block_time_ms: 6_000,
                address_prefix: 2,
                token_symbol: "KSM",
                token_decimals: 12,
                existential_deposit: 333_333_333,
                indexer_url: "https://kusama.api.subscan.io",
                rpc_url: "https://kusama-rpc.polkadot.io",
            },
        }
    }

    /// Render a raw balance in display units, e.g. `1.5 DOT`.
    pub fn format_amount(&self, amount: u128) -> String {
        let props = self.properties();
        let unit = 10u128.pow(props.token_decimals);
        let whole = amount / unit;
        let frac = amount % unit;
        if frac == 0 {
            return format!("{whole} {}", props.token_symbol);
        }
        let frac = format!("{frac:0width$}", width = props.token_decimals as usize);
        format!("{whole}.{} {}", frac.trim_end_matches('0'), props.token_symbol)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Polkadot => write!(f, "polkadot"),
            Network::Kusama => write!(f, "kusama"),
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "polkadot" => Ok(Network::Polkadot),
            "kusama" => Ok(Network::Kusama),
            other => Err(Error::Schema(format!("unknown network {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_amounts_in_display_units() {
        assert_eq!(Network::Polkadot.format_amount(10_000_000_000), "1 DOT");
        assert_eq!(Network::Polkadot.format_amount(15_000_000_000), "1.5 DOT");
        assert_eq!(
            Network::Kusama.format_amount(333_333_333),
            "0.000333333333 KSM"
        );
    }

    #[test]
    fn parses_network_names() {
        assert_eq!("polkadot".parse::<Network>().unwrap(), Network::Polkadot);
        assert_eq!("kusama".parse::<Network>().unwrap(), Network::Kusama);
        assert!("westend".parse::<Network>().is_err());
    }
}
