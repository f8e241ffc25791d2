//! Next-slot selection.
//!
//! Deterministic: equal inputs always pick the same slot, which keeps
//! conversations reproducible and testable.

use std::collections::HashMap;

use crate::domain::schema::{SlotSchema, SlotSpec};
use crate::domain::session::{SlotStatus, SlotValue};

/// Picks the next required slot to ask about, or `None` when every
/// required slot is valid.
///
/// Default policy: walk the schema's declared required order and return
/// the first slot that is not valid. One refinement: if that slot is the
/// one just asked (`last_asked`), the question went entirely unanswered
/// (no attempt was recorded for it), and another slot is still missing,
/// ask the other slot instead of repeating the ignored question verbatim.
pub fn select_next<'a>(
    schema: &'a SlotSchema,
    slots: &HashMap<String, SlotValue>,
    last_asked: Option<&str>,
    retry_counts: &HashMap<String, u32>,
) -> Option<&'a SlotSpec> {
    let missing: Vec<&SlotSpec> = schema
        .required_slots()
        .filter(|spec| {
            !matches!(slots.get(spec.name()), Some(v) if v.status == SlotStatus::Valid)
        })
        .collect();

    let first = *missing.first()?;

    if missing.len() > 1 {
        if let Some(asked) = last_asked {
            let was_asked = retry_counts.get(asked).copied().unwrap_or(0) > 0;
            let unanswered = !slots.contains_key(asked);
            if first.name() == asked && was_asked && unanswered {
                return missing.get(1).copied();
            }
        }
    }

    Some(first)
}
