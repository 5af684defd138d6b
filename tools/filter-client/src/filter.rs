//! What the client does to each record before handing it back.

use anyhow::{bail, Context, Result};
use shared_types::{Address, BlockRecord};
use std::collections::HashSet;

/// Drops top-level transactions by sender. Empty rule echoes.
#[derive(Debug, Default, Clone)]
pub struct FilterRule {
    drop_senders: HashSet<Address>,
}

impl FilterRule {
    pub fn from_hex(senders: &[String]) -> Result<Self> {
        let drop_senders = senders
            .iter()
            .map(|s| parse_address(s))
            .collect::<Result<_>>()?;
        Ok(Self { drop_senders })
    }

    pub fn is_echo(&self) -> bool {
        self.drop_senders.is_empty()
    }

    /// Apply to `record` in place. Returns the number of transactions dropped.
    pub fn apply(&self, record: &mut BlockRecord) -> usize {
        if self.is_echo() {
            return 0;
        }
        let before = record.payset.len();
        record
            .payset
            .retain(|t| !self.drop_senders.contains(&t.signed_txn.txn.sender));
        before - record.payset.len()
    }
}

fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim().trim_start_matches("0x");
    let bytes = hex::decode(s).with_context(|| format!("invalid address hex: {s}"))?;
    if bytes.len() != 32 {
        bail!("address must be 32 bytes, got {}", bytes.len());
    }
    let mut address = [0u8; 32];
    address.copy_from_slice(&bytes);
    Ok(address)
}
