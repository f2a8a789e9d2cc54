//! Merge operator for counters and index containers.
//!
//! Writers never read-modify-write an index or the transaction counter.
//! They issue a RocksDB `merge` whose operand is an encoded
//! [`MergeRequest`]; the engine folds operands into the stored value on
//! read and during compaction.
//!
//! Stored value formats, per request kind:
//!
//! ```text
//! Increment(n)        decimal ASCII      "41" + Increment(1) -> "42"
//! AppendSequence(v)   Container::Sequence  [a, b] + [c]      -> [a, b, c]
//! MergeMapping(m)     Container::Mapping   {a:1} + {a:2, b:3} -> {a:2, b:3}
//! Replace(bytes)      raw bytes          anything + Replace(x) -> x
//! ```
//!
//! Only `Increment` is commutative. Sequence append and mapping
//! last-writer-wins depend on the order the engine applies operands, which
//! is write order for a single key. Replaying operands out of order, or
//! replaying them twice, changes the result.
//!
//! The fold is total. An operand that does not decode, or whose kind does
//! not match the stored value (a mapping merged into a sequence, an
//! increment on a container), is logged and skipped; the value it would
//! have applied to is kept. The full-merge callback never reports failure
//! to the engine.

use indexmap::IndexMap;
use rocksdb::MergeOperands;
use serde::{Deserialize, Serialize};

use super::keys::StorageKey;
use super::record::{decode, encode, Container};
use crate::error::StorageError;

/// Name registered with RocksDB. The engine does not check it on open: a
/// renamed operator still opens existing data and is handed whatever
/// operands were written under the old name.
pub const MERGE_OPERATOR_NAME: &str = "arbor.merge";

/// One merge operand, chosen by the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeRequest {
    /// Add to a decimal ASCII counter (absent counts as 0).
    Increment(u64),
    /// Append elements to a sequence container.
    AppendSequence(Vec<String>),
    /// Insert entries into a mapping container; incoming keys win.
    MergeMapping(IndexMap<String, String>),
    /// Overwrite whatever is stored.
    Replace(Vec<u8>),
}

impl MergeRequest {
    /// Single-entry mapping merge, the shape used by index updates.
    pub fn map_entry(name: impl Into<String>, oid: impl Into<String>) -> Self {
        let mut entries = IndexMap::with_capacity(1);
        entries.insert(name.into(), oid.into());
        MergeRequest::MergeMapping(entries)
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        decode(bytes)
    }

    /// Apply this operand on top of the stored value.
    pub fn apply(&self, existing: Option<&[u8]>) -> Result<Vec<u8>, StorageError> {
        match self {
            MergeRequest::Increment(amount) => {
                let base = existing.map(parse_counter).transpose()?.unwrap_or(0);
                let sum = base.checked_add(*amount).ok_or_else(|| {
                    StorageError::CounterCorrupt(format!("{base} + {amount} overflows"))
                })?;
                Ok(sum.to_string().into_bytes())
            }
            MergeRequest::AppendSequence(items) => match existing {
                None => Container::Sequence(items.clone()).encode(),
                Some(bytes) => match Container::decode(bytes)? {
                    Container::Sequence(mut current) => {
                        current.extend(items.iter().cloned());
                        Container::Sequence(current).encode()
                    }
                    Container::Mapping(_) => Err(StorageError::Decode(
                        "cannot append a sequence to a mapping".into(),
                    )),
                },
            },
            MergeRequest::MergeMapping(entries) => match existing {
                None => Container::Mapping(entries.clone()).encode(),
                Some(bytes) => match Container::decode(bytes)? {
                    Container::Mapping(mut current) => {
                        for (name, oid) in entries {
                            current.insert(name.clone(), oid.clone());
                        }
                        Container::Mapping(current).encode()
                    }
                    Container::Sequence(_) => Err(StorageError::Decode(
                        "cannot merge a mapping into a sequence".into(),
                    )),
                },
            },
            MergeRequest::Replace(bytes) => Ok(bytes.clone()),
        }
    }

    /// Collapse `self` followed by `next` into one operand.
    ///
    /// Returns `None` when the pair cannot be expressed as a single
    /// request; the engine then keeps both operands.
    pub fn combine(self, next: MergeRequest) -> Option<MergeRequest> {
        match (self, next) {
            (_, MergeRequest::Replace(bytes)) => Some(MergeRequest::Replace(bytes)),
            (MergeRequest::Replace(base), next) => {
                next.apply(Some(base.as_slice())).ok().map(MergeRequest::Replace)
            }
            (MergeRequest::Increment(a), MergeRequest::Increment(b)) => {
                a.checked_add(b).map(MergeRequest::Increment)
            }
            (MergeRequest::AppendSequence(mut a), MergeRequest::AppendSequence(b)) => {
                a.extend(b);
                Some(MergeRequest::AppendSequence(a))
            }
            (MergeRequest::MergeMapping(mut a), MergeRequest::MergeMapping(b)) => {
                a.extend(b);
                Some(MergeRequest::MergeMapping(a))
            }
            _ => None,
        }
    }
}

/// Parse a stored counter value.
pub fn parse_counter(bytes: &[u8]) -> Result<u64, StorageError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StorageError::CounterCorrupt(String::from_utf8_lossy(bytes).into_owned()))
}

/// Fold encoded operands, in order, over the stored value.
///
/// Operands that fail to decode or apply are skipped and reported in the
/// returned error list; the fold itself always produces a value.
pub fn fold_operands<'a, I>(existing: Option<&[u8]>, operands: I) -> (Vec<u8>, Vec<StorageError>)
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut current = existing.map(<[u8]>::to_vec);
    let mut skipped = Vec::new();
    for operand in operands {
        match MergeRequest::decode(operand).and_then(|r| r.apply(current.as_deref())) {
            Ok(value) => current = Some(value),
            Err(e) => skipped.push(e),
        }
    }
    (current.unwrap_or_default(), skipped)
}

/// Combine encoded operands into a single encoded operand, if possible.
pub fn combine_operands<'a, I>(operands: I) -> Option<Vec<u8>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut acc: Option<MergeRequest> = None;
    for operand in operands {
        let request = MergeRequest::decode(operand).ok()?;
        acc = Some(match acc {
            None => request,
            Some(prev) => prev.combine(request)?,
        });
    }
    acc?.encode().ok()
}

/// RocksDB full-merge callback.
pub fn full_merge(key: &[u8], existing: Option<&[u8]>, operands: &MergeOperands) -> Option<Vec<u8>> {
    let (value, skipped) = fold_operands(existing, operands.iter());
    if !skipped.is_empty() {
        let entity = match StorageKey::parse(key) {
            Some(parsed) => format!("{parsed:?}"),
            None => String::from_utf8_lossy(key).into_owned(),
        };
        for e in &skipped {
            log::error!("Skipped merge operand for {entity}: {e}");
        }
    }
    Some(value)
}

/// RocksDB partial-merge callback.
pub fn partial_merge(
    _key: &[u8],
    _existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    combine_operands(operands.iter())
}
