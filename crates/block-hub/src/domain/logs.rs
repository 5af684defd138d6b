//! Per-application log collection for the `logs` channel.

use shared_types::{walk_transactions, AppLogFrame, BlockRecord};
use std::collections::BTreeMap;

/// Group every emitted log line by the application that emitted it.
///
/// Walks the payset depth-first: a transaction's own lines come before those
/// of its inner transactions, and siblings keep their stored order.
///
/// Lines are keyed by the application that emitted them, not by the top-level
/// call. An inner call from application 42 into application 99 lands under
/// 99, so a subscriber to 42 sees the inner transactions 42 itself ran but not
/// lines another application logged on its behalf. Applications without lines
/// are absent from the result.
pub fn collect_app_logs(record: &BlockRecord) -> BTreeMap<u64, Vec<Vec<u8>>> {
    let mut by_app: BTreeMap<u64, Vec<Vec<u8>>> = BTreeMap::new();
    walk_transactions(&record.payset, &mut |txn| {
        let logs = &txn.apply_data.eval_delta.logs;
        if logs.is_empty() {
            return;
        }
        if let Some(app) = txn.application() {
            by_app.entry(app).or_default().extend(logs.iter().cloned());
        }
    });
    by_app
}

/// Wrap collected lines into wire frames.
pub fn app_log_frames(record: &BlockRecord) -> impl Iterator<Item = AppLogFrame> {
    let round = record.round();
    collect_app_logs(record)
        .into_iter()
        .map(move |(application_id, lines)| AppLogFrame {
            round,
            application_id,
            lines,
        })
}
