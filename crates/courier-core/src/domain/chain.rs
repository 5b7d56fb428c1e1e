//! Target ledgers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::CourierError;

/// The ledger a transaction is destined for.
///
/// One orchestrator instance serves exactly one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    #[serde(rename = "mina:mainnet")]
    MinaMainnet,
    #[serde(rename = "mina:devnet")]
    MinaDevnet,
    #[serde(rename = "mina:local")]
    MinaLocal,
    #[serde(rename = "zeko:testnet")]
    ZekoTestnet,
}

impl Chain {
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::MinaMainnet => "mina:mainnet",
            Chain::MinaDevnet => "mina:devnet",
            Chain::MinaLocal => "mina:local",
            Chain::ZekoTestnet => "zeko:testnet",
        }
    }

    /// Network name used by the third-party indexer, if it covers this chain.
    pub fn indexer_network(self) -> Option<&'static str> {
        match self {
            Chain::MinaMainnet => Some("mainnet"),
            Chain::MinaDevnet => Some("devnet"),
            Chain::MinaLocal | Chain::ZekoTestnet => None,
        }
    }

    /// Chains whose broadcast result is already final; nothing to monitor.
    pub fn settles_synchronously(self) -> bool {
        matches!(self, Chain::MinaLocal | Chain::ZekoTestnet)
    }

    /// Whether a rejected broadcast's hash is withheld from the submission result.
    pub fn drops_rejected_hash(self) -> bool {
        matches!(self, Chain::ZekoTestnet)
    }

    /// Whether a local-mode submission should block until block inclusion.
    pub fn waits_for_inclusion(self) -> bool {
        !matches!(self, Chain::ZekoTestnet)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mina:mainnet" => Ok(Chain::MinaMainnet),
            "mina:devnet" => Ok(Chain::MinaDevnet),
            "mina:local" => Ok(Chain::MinaLocal),
            "zeko:testnet" => Ok(Chain::ZekoTestnet),
            other => Err(CourierError::Config(format!("unknown chain: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Chain::MinaMainnet, Some("mainnet"), false)]
    #[case(Chain::MinaDevnet, Some("devnet"), false)]
    #[case(Chain::MinaLocal, None, true)]
    #[case(Chain::ZekoTestnet, None, true)]
    fn chain_profiles(
        #[case] chain: Chain,
        #[case] indexer: Option<&str>,
        #[case] synchronous: bool,
    ) {
        assert_eq!(chain.indexer_network(), indexer);
        assert_eq!(chain.settles_synchronously(), synchronous);
        assert_eq!(chain.as_str().parse::<Chain>().unwrap(), chain);
    }

    #[test]
    fn serde_uses_colon_names() {
        let json = serde_json::to_string(&Chain::ZekoTestnet).unwrap();
        assert_eq!(json, "\"zeko:testnet\"");
    }

    #[test]
    fn unknown_chain_is_a_config_error() {
        let err = "solana:mainnet".parse::<Chain>().unwrap_err();
        assert!(err.is_fatal());
    }
}
