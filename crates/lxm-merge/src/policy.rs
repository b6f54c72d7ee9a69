//! Field-level merge decisions.
//!
//! Every merge of an incoming value into an existing record goes through
//! [`allows_overwrite`]. Multilingual text is merged per writing-system
//! alternative, never as a whole.

use std::collections::BTreeMap;

use lxm_types::{MergeStyle, MultiText, RecordId};

/// Whether an incoming value may replace the existing one.
pub fn allows_overwrite(style: MergeStyle, existing_is_empty: bool, creating_new: bool) -> bool {
    creating_new || existing_is_empty || style.overwrites_existing()
}

/// Merge `incoming` into `existing` one alternative at a time.
///
/// Under [`MergeStyle::KeepOnlyNew`] alternatives the incoming text lacks are
/// removed first. Returns `true` when `existing` changed.
pub fn merge_text(
    style: MergeStyle,
    existing: &mut MultiText,
    incoming: &MultiText,
    creating_new: bool,
) -> bool {
    let before = existing.clone();
    if style.clears_absent() && !creating_new {
        let absent: Vec<String> = existing
            .writing_systems()
            .filter(|ws| incoming.get(ws).is_none())
            .map(str::to_string)
            .collect();
        for ws in absent {
            existing.remove(&ws);
        }
    }
    for (ws, text) in incoming.iter() {
        let current_empty = existing.get(ws).map_or(true, str::is_empty);
        if allows_overwrite(style, current_empty, creating_new) {
            existing.set(ws, text);
        }
    }
    *existing != before
}

/// Merge keyed text maps (notes, built-in fields) key by key.
///
/// Keys absent from `incoming` are removed only under `KeepOnlyNew`.
pub fn merge_keyed(
    style: MergeStyle,
    existing: &mut BTreeMap<String, MultiText>,
    incoming: &BTreeMap<String, MultiText>,
    creating_new: bool,
) -> bool {
    let mut changed = false;
    if style.clears_absent() && !creating_new {
        let before = existing.len();
        existing.retain(|key, _| incoming.contains_key(key));
        changed |= before != existing.len();
    }
    for (key, text) in incoming {
        let slot = existing.entry(key.clone()).or_default();
        changed |= merge_text(style, slot, text, creating_new);
    }
    existing.retain(|_, text| !text.is_empty());
    changed
}

/// Merge a handle list. Overwriting styles replace a non-empty incoming list;
/// the others add missing items.
pub fn merge_list(
    style: MergeStyle,
    existing: &mut Vec<RecordId>,
    incoming: &[RecordId],
    creating_new: bool,
) -> bool {
    if incoming.is_empty() {
        if style.clears_absent() && !creating_new && !existing.is_empty() {
            existing.clear();
            return true;
        }
        return false;
    }
    if allows_overwrite(style, existing.is_empty(), creating_new) {
        if existing.as_slice() == incoming {
            return false;
        }
        *existing = incoming.to_vec();
        return true;
    }
    let mut changed = false;
    for item in incoming {
        if !existing.contains(item) {
            existing.push(*item);
            changed = true;
        }
    }
    changed
}

/// Merge trait maps vocabulary by vocabulary.
pub fn merge_traits(
    style: MergeStyle,
    existing: &mut BTreeMap<String, Vec<RecordId>>,
    incoming: &BTreeMap<String, Vec<RecordId>>,
    creating_new: bool,
) -> bool {
    let mut changed = false;
    if style.clears_absent() && !creating_new {
        let before = existing.len();
        existing.retain(|key, _| incoming.contains_key(key));
        changed |= before != existing.len();
    }
    for (key, values) in incoming {
        let slot = existing.entry(key.clone()).or_default();
        changed |= merge_list(style, slot, values, creating_new);
    }
    existing.retain(|_, values| !values.is_empty());
    changed
}

/// Merge a single optional value.
pub fn merge_option<T: PartialEq + Clone>(
    style: MergeStyle,
    existing: &mut Option<T>,
    incoming: Option<&T>,
    creating_new: bool,
) -> bool {
    match incoming {
        Some(value) => {
            if existing.as_ref() == Some(value) {
                return false;
            }
            if allows_overwrite(style, existing.is_none(), creating_new) {
                *existing = Some(value.clone());
                return true;
            }
            false
        }
        None if style.clears_absent() && !creating_new && existing.is_some() => {
            *existing = None;
            true
        }
        None => false,
    }
}

/// Merge a plain string, where the empty string means "no value".
pub fn merge_string(
    style: MergeStyle,
    existing: &mut String,
    incoming: &str,
    creating_new: bool,
) -> bool {
    if incoming.is_empty() {
        if style.clears_absent() && !creating_new && !existing.is_empty() {
            existing.clear();
            return true;
        }
        return false;
    }
    if existing == incoming || !allows_overwrite(style, existing.is_empty(), creating_new) {
        return false;
    }
    *existing = incoming.to_string();
    true
}
