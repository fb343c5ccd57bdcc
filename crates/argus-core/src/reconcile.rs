//! Multi-source record reconciliation: validity filtering, equivalence
//! grouping, and field-level priority merge.

use std::collections::{HashMap, VecDeque};

use crate::record::{FieldKey, NOT_AVAILABLE, Record};

/// Policy knobs for one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Fields whose exact equality establishes that two records describe the
    /// same subject. A sentinel value never establishes equality.
    pub equality_keys: Vec<FieldKey>,
    /// Source id → rank. Lower rank wins field conflicts; sources missing
    /// from the table rank last.
    pub priority_table: HashMap<String, u32>,
    /// Minimum count of non-sentinel fields for a record to participate.
    pub validity_threshold: usize,
    pub sentinel: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            equality_keys: vec![FieldKey::Name, FieldKey::Ticker, FieldKey::Website],
            priority_table: HashMap::new(),
            validity_threshold: 5,
            sentinel: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Collapse duplicate records into one canonical record per subject.
///
/// Sparse records are dropped first, then the pool is consumed front-first:
/// the earliest record of each equivalence group survives as the merge base,
/// so ties between equal-priority sources deterministically keep the
/// first-encountered value. A merged field is always drawn verbatim from one
/// of the input records.
pub fn reconcile(records: Vec<Record>, config: &ReconcileConfig) -> Vec<Record> {
    let total = records.len();
    let mut pool: VecDeque<Record> = records
        .into_iter()
        .filter(|record| {
            let keep = record.populated_count(&config.sentinel) >= config.validity_threshold;
            if !keep {
                tracing::debug!(
                    source = %record.source,
                    populated = record.populated_count(&config.sentinel),
                    threshold = config.validity_threshold,
                    "Dropping sparse record"
                );
            }
            keep
        })
        .collect();

    if pool.len() < total {
        tracing::info!(
            dropped = total - pool.len(),
            kept = pool.len(),
            "Validity filter dropped sparse records"
        );
    }

    let mut merged = Vec::with_capacity(pool.len());
    while let Some(mut base) = pool.pop_front() {
        let mut group = Vec::new();
        let mut i = 0;
        while i < pool.len() {
            if same_subject(&base, &pool[i], &config.equality_keys, &config.sentinel) {
                if let Some(record) = pool.remove(i) {
                    group.push(record);
                }
            } else {
                i += 1;
            }
        }

        if !group.is_empty() {
            merge_group(&mut base, &group, config);
        }
        merged.push(base);
    }

    merged
}

/// True iff every equality-key field is non-sentinel and exactly equal.
///
/// An empty key set matches nothing; merging everything into one record is
/// never the intent.
fn same_subject(a: &Record, b: &Record, keys: &[FieldKey], sentinel: &str) -> bool {
    !keys.is_empty()
        && keys.iter().all(|&key| {
            let left = a.get(key);
            left != sentinel && left == b.get(key)
        })
}

/// Fold every grouped record into `base`, field by field.
fn merge_group(base: &mut Record, group: &[Record], config: &ReconcileConfig) {
    let base_rank = source_rank(&config.priority_table, &base.source);

    for other in group {
        let other_rank = source_rank(&config.priority_table, &other.source);
        for &key in FieldKey::ALL {
            let theirs = other.get(key);
            if base.get(key) == theirs {
                continue;
            }
            if base.get(key) == config.sentinel {
                // Sentinel absorbs a real value regardless of priority.
                base.set(key, theirs.to_string());
            } else if theirs != config.sentinel && other_rank < base_rank {
                base.set(key, theirs.to_string());
            }
        }
    }
}

fn source_rank(table: &HashMap<String, u32>, source: &str) -> u32 {
    table.get(source).copied().unwrap_or(u32::MAX)
}
