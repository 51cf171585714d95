// Collection payload encoding

use crate::item::{Item, ItemId};
use eyre::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Outcome of decoding a persisted payload
#[derive(Debug, Default)]
pub struct Decoded {
    pub items: Vec<Item>,
    /// Elements that could not be decoded and were dropped
    pub skipped: usize,
    /// True when the payload as a whole was not a JSON array
    pub corrupt: bool,
}

/// Serialize the whole collection as a JSON array
pub fn encode_collection(items: &[Item]) -> Result<Vec<u8>> {
    serde_json::to_vec(items).context("Failed to serialize collection")
}

/// Decode a persisted collection, salvaging what it can.
///
/// A payload that is not a JSON array yields an empty, `corrupt` result.
/// Individual elements that fail to decode are skipped, as are repeats of
/// an id already seen.
pub fn decode_collection(bytes: &[u8]) -> Decoded {
    let values: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, len = bytes.len(), "Persisted collection is unreadable, starting empty");
            return Decoded {
                corrupt: true,
                ..Default::default()
            };
        }
    };

    let mut decoded = Decoded::default();
    let mut seen: HashSet<ItemId> = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let item: Item = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(e) => {
                warn!(index, error = %e, "Failed to decode item, skipping");
                decoded.skipped += 1;
                continue;
            }
        };

        if !seen.insert(item.id().clone()) {
            warn!(index, id = %item.id(), "Duplicate item id, skipping");
            decoded.skipped += 1;
            continue;
        }

        decoded.items.push(item);
    }

    debug!(
        count = decoded.items.len(),
        skipped = decoded.skipped,
        "Decoded persisted collection"
    );

    decoded
}
