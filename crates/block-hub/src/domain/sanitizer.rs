//! # Encoding Sanitizer
//!
//! Removes the substructures subscribers must never see on the wire and puts
//! them back once the record returns from the filter gate.
//!
//! Removed unconditionally:
//! - `header.state_proof_tracking`
//! - `delta.header.state_proof_tracking`
//! - `delta.tx_leases`
//! - `delta.creatables`
//! - `apply_data.eval_delta.local_deltas` of every transaction in the forest
//!
//! Local deltas are keyed by [`TxId`], so a filter may drop or reorder
//! transactions and the survivors still get their own deltas back. Identities
//! are content-derived and can repeat (two identical inner payments). Each
//! identity therefore owns a queue filled in traversal order and drained in the
//! same order, so repeated identities restore positionally instead of
//! overwriting each other.

use shared_types::{
    BlockRecord, ModifiedCreatable, SignedTxnWithAd, StateDelta, StateProofTrackingData, TxId,
    TxLease,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

type Tracking = BTreeMap<u64, StateProofTrackingData>;
type LocalDeltas = BTreeMap<u64, StateDelta>;

/// Substructures removed from one record.
///
/// Built by [`strip`] and consumed by [`restore`]; lives for exactly one
/// `process` call.
#[derive(Debug, Default)]
pub struct ExclusionSet {
    header_tracking: Option<Tracking>,
    delta_tracking: Option<Tracking>,
    tx_leases: Option<BTreeMap<TxLease, u64>>,
    creatables: Option<BTreeMap<u64, ModifiedCreatable>>,
    local_deltas: HashMap<TxId, VecDeque<Option<LocalDeltas>>>,
    transactions: usize,
    repeated_ids: usize,
}

impl ExclusionSet {
    /// Transactions visited during strip, inner transactions included.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    /// Transactions whose identity was already seen earlier in the forest.
    pub fn repeated_ids(&self) -> usize {
        self.repeated_ids
    }

    fn record_local_deltas(&mut self, id: TxId, deltas: Option<LocalDeltas>) {
        let queue = self.local_deltas.entry(id).or_default();
        if !queue.is_empty() {
            self.repeated_ids += 1;
        }
        queue.push_back(deltas);
        self.transactions += 1;
    }

    fn take_local_deltas(&mut self, id: &TxId) -> Option<LocalDeltas> {
        self.local_deltas
            .get_mut(id)
            .and_then(VecDeque::pop_front)
            .flatten()
    }
}

/// Strip a record for the wire.
pub fn strip(mut record: BlockRecord) -> (BlockRecord, ExclusionSet) {
    let mut set = ExclusionSet {
        header_tracking: record.header.state_proof_tracking.take(),
        delta_tracking: record.delta.header.state_proof_tracking.take(),
        tx_leases: record.delta.tx_leases.take(),
        creatables: record.delta.creatables.take(),
        ..Default::default()
    };

    for_each_txn_mut(&mut record.payset, |txn| {
        let deltas = txn.apply_data.eval_delta.local_deltas.take();
        set.record_local_deltas(txn.id(), deltas);
    });

    if set.repeated_ids > 0 {
        debug!(
            round = record.header.round,
            repeated = set.repeated_ids,
            "Transaction identities repeat within the record"
        );
    }

    (record, set)
}

/// Reattach everything [`strip`] removed.
///
/// Transactions whose identity has no remaining entry (for example ones a
/// filter added) get no local deltas.
pub fn restore(mut record: BlockRecord, mut set: ExclusionSet) -> BlockRecord {
    record.header.state_proof_tracking = set.header_tracking.take();
    record.delta.header.state_proof_tracking = set.delta_tracking.take();
    record.delta.tx_leases = set.tx_leases.take();
    record.delta.creatables = set.creatables.take();

    for_each_txn_mut(&mut record.payset, |txn| {
        let id = txn.id();
        txn.apply_data.eval_delta.local_deltas = set.take_local_deltas(&id);
    });

    record
}

/// Visit every transaction in depth-first pre-order.
///
/// Uses an explicit stack, so nesting depth is limited only by memory.
fn for_each_txn_mut<F>(txns: &mut [SignedTxnWithAd], mut visit: F)
where
    F: FnMut(&mut SignedTxnWithAd),
{
    let mut stack = vec![txns.iter_mut()];
    while let Some(level) = stack.last_mut() {
        match level.next() {
            Some(txn) => {
                visit(&mut *txn);
                stack.push(txn.apply_data.eval_delta.inner_txns.iter_mut());
            }
            None => {
                stack.pop();
            }
        }
    }
}
