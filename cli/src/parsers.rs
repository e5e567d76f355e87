use anyhow::{anyhow, bail, Result};
use multisig_wallet_sdk::{AccountId, MultisigAccount, Network};

/// Parse a token amount in display units ("1.5") into raw chain units
/// using the network's decimals.
pub fn parse_amount(s: &str, network: Network) -> Result<u128> {
    let decimals = network.properties().token_decimals as usize;
    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        bail!("empty amount");
    }
    if frac.len() > decimals {
        bail!("amount {s:?} has more than {decimals} decimal places");
    }
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| anyhow!("invalid amount {s:?}"))?
    };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<decimals$}");
        padded.parse().map_err(|_| anyhow!("invalid amount {s:?}"))?
    };
    let unit = 10u128.pow(decimals as u32);
    whole
        .checked_mul(unit)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| anyhow!("amount {s:?} overflows"))
}

pub fn parse_multisig(signatories: &[String], threshold: u16) -> Result<MultisigAccount> {
    let signatories = signatories
        .iter()
        .map(|s| s.parse::<AccountId>().map_err(|e| anyhow!("{e}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(MultisigAccount::new(signatories, threshold)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_amounts() {
        // DOT has 10 decimals
        assert_eq!(parse_amount("1", Network::Polkadot).unwrap(), 10_000_000_000);
        assert_eq!(
            parse_amount("1.5", Network::Polkadot).unwrap(),
            15_000_000_000
        );
        assert_eq!(parse_amount(".5", Network::Polkadot).unwrap(), 5_000_000_000);
        assert_eq!(parse_amount("0.0000000001", Network::Polkadot).unwrap(), 1);
        assert!(parse_amount("0.00000000001", Network::Polkadot).is_err());
        assert!(parse_amount("abc", Network::Polkadot).is_err());
        assert!(parse_amount("", Network::Polkadot).is_err());
    }
}
