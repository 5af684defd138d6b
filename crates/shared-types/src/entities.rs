//! # Core Domain Entities
//!
//! The block record handed to the hub by the ingestion pipeline.
//!
//! ## Clusters
//!
//! - **Record**: [`BlockRecord`], [`BlockHeader`], [`LedgerDelta`]
//! - **Transactions**: [`SignedTxnWithAd`], [`SignedTxn`], [`Transaction`], [`TxId`]
//! - **Evaluation**: [`ApplyData`], [`EvalDelta`], [`StateDelta`], [`ValueDelta`]
//! - **Streams**: [`AppLogFrame`]

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest as _, Sha512_256};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// PRIMITIVES
// =============================================================================

/// A 32-byte digest.
pub type Digest = [u8; 32];

/// A 32-byte account address (Ed25519 public key).
pub type Address = [u8; 32];

/// Domain separation prefix hashed in front of every transaction.
pub const TX_DOMAIN: &[u8] = b"TX";

/// A 64-byte Ed25519 signature.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde_as(as = "Bytes")] pub [u8; 64]);

/// Content-derived transaction identity.
///
/// Two transactions with byte-identical unsigned payloads share an identity,
/// wherever they sit in the payset forest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TxId(pub Digest);

impl TxId {
    pub fn as_bytes(&self) -> &Digest {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", hex::encode(&self.0[..8]))
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// One block's full structured payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockRecord {
    /// Block header.
    pub header: BlockHeader,
    /// State changes produced by applying the block.
    pub delta: LedgerDelta,
    /// Ordered top-level transactions.
    pub payset: Vec<SignedTxnWithAd>,
}

impl BlockRecord {
    /// Round number of the block.
    pub fn round(&self) -> u64 {
        self.header.round
    }

    /// Number of transactions in the whole forest, inner transactions included.
    pub fn transaction_count(&self) -> usize {
        let mut count = 0;
        walk_transactions(&self.payset, &mut |_| count += 1);
        count
    }
}

/// Block header metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    pub round: u64,
    /// Hash of the previous block.
    pub branch: Digest,
    pub seed: Digest,
    pub txn_root: Digest,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub genesis_id: String,
    pub genesis_hash: Digest,
    pub proposer: Option<Address>,
    pub fees_collected: u64,
    /// Number of transactions committed before this block.
    pub txn_counter: u64,
    /// State proof tracking data, keyed by state proof type.
    pub state_proof_tracking: Option<BTreeMap<u64, StateProofTrackingData>>,
}

/// Tracking data for one state proof type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateProofTrackingData {
    pub voters_commitment: Vec<u8>,
    pub online_total_weight: u64,
    pub next_round: u64,
}

/// Ledger changes produced by the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerDelta {
    /// Copy of the block header the delta was computed for.
    pub header: BlockHeader,
    pub accounts: Vec<AccountDelta>,
    /// Leases taken by transactions in this block, with their expiry round.
    pub tx_leases: Option<BTreeMap<TxLease, u64>>,
    /// Assets and applications created or deleted, keyed by index.
    pub creatables: Option<BTreeMap<u64, ModifiedCreatable>>,
    pub prev_timestamp: i64,
}

/// Balance change for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountDelta {
    pub address: Address,
    pub micro_algos: u64,
    pub total_apps_opted_in: u64,
}

/// A (sender, lease) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxLease {
    pub sender: Address,
    pub lease: Digest,
}

/// Kind of a creatable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatableKind {
    Asset,
    Application,
}

/// Creation or deletion of an asset or application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedCreatable {
    pub kind: CreatableKind,
    /// `true` on creation, `false` on deletion.
    pub created: bool,
    pub creator: Address,
    pub ndeltas: u64,
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// Transaction type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TxType {
    #[default]
    Payment,
    KeyRegistration,
    AssetConfig,
    AssetTransfer,
    AssetFreeze,
    ApplicationCall,
    StateProof,
}

/// Unsigned transaction payload. Its encoding determines the [`TxId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Transaction {
    pub tx_type: TxType,
    pub sender: Address,
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub note: Vec<u8>,
    pub genesis_hash: Digest,
    pub group: Option<Digest>,
    pub lease: Option<Digest>,
    pub receiver: Option<Address>,
    pub amount: u64,
    /// Called application; zero on creation.
    pub application_id: u64,
    pub app_args: Vec<Vec<u8>>,
}

impl Transaction {
    /// Computes the content-derived identity: SHA-512/256 over `"TX" || encoding`.
    pub fn id(&self) -> TxId {
        let mut hasher = Sha512_256::new();
        hasher.update(TX_DOMAIN);
        // Writing into a hasher cannot fail and the payload holds no maps.
        bincode::serialize_into(&mut hasher, self).expect("transaction encoding is infallible");
        TxId(hasher.finalize().into())
    }
}

/// A transaction with its authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedTxn {
    pub sig: Option<Signature>,
    pub txn: Transaction,
    /// Rekeyed authorizer, if any.
    pub auth_addr: Option<Address>,
}

/// A signed transaction together with the effects of applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SignedTxnWithAd {
    pub signed_txn: SignedTxn,
    pub apply_data: ApplyData,
}

impl SignedTxnWithAd {
    /// Identity of the underlying transaction.
    pub fn id(&self) -> TxId {
        self.signed_txn.txn.id()
    }

    /// Application this transaction ran, if it is an application call.
    ///
    /// Creations report the id assigned during evaluation.
    pub fn application(&self) -> Option<u64> {
        let txn = &self.signed_txn.txn;
        if txn.tx_type != TxType::ApplicationCall {
            return None;
        }
        match (txn.application_id, self.apply_data.application_id) {
            (0, 0) => None,
            (0, created) => Some(created),
            (called, _) => Some(called),
        }
    }
}

/// Effects of applying a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplyData {
    pub closing_amount: u64,
    /// Application created by this transaction, zero otherwise.
    pub application_id: u64,
    pub eval_delta: EvalDelta,
}

/// Application evaluation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EvalDelta {
    pub global_delta: Option<StateDelta>,
    /// Local state changes keyed by account offset (0 = sender).
    pub local_deltas: Option<BTreeMap<u64, StateDelta>>,
    /// Log lines emitted, in emission order.
    pub logs: Vec<Vec<u8>>,
    /// Transactions issued by this one during evaluation.
    pub inner_txns: Vec<SignedTxnWithAd>,
}

/// Key-value state changes.
pub type StateDelta = BTreeMap<Vec<u8>, ValueDelta>;

/// What happened to a state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaAction {
    SetBytes,
    SetUint,
    Delete,
}

/// A single state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDelta {
    pub action: DeltaAction,
    pub bytes: Vec<u8>,
    pub uint: u64,
}

/// Visits every transaction of a forest in depth-first pre-order.
///
/// Parents are visited before their inner transactions; siblings in stored
/// order. Iterative, so nesting depth is bounded by memory rather than by the
/// call stack.
pub fn walk_transactions<'a, F>(txns: &'a [SignedTxnWithAd], visit: &mut F)
where
    F: FnMut(&'a SignedTxnWithAd),
{
    let mut stack = vec![txns.iter()];
    while let Some(level) = stack.last_mut() {
        match level.next() {
            Some(txn) => {
                visit(txn);
                stack.push(txn.apply_data.eval_delta.inner_txns.iter());
            }
            None => {
                stack.pop();
            }
        }
    }
}

// =============================================================================
// STREAMS
// =============================================================================

/// Log lines one application emitted within one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppLogFrame {
    pub round: u64,
    pub application_id: u64,
    pub lines: Vec<Vec<u8>>,
}
