//! Parsing of the restored-resource inventory
//!
//! The main restore phase records every item it touched as
//! `namespace/name(status)` under its resource-type key.

use std::collections::HashSet;

use regex::Regex;

use crate::persistence::RestoredResourceList;

/// Inventory key of PersistentVolumeClaim entries
pub const PVC_RESOURCE_KEY: &str = "v1/PersistentVolumeClaim";

/// Status recorded for items created by the restore
pub const ITEM_RESTORE_RESULT_CREATED: &str = "created";

lazy_static::lazy_static! {
    static ref STATUS_GROUP: Regex = Regex::new(r"\(([^)]+)\)").unwrap();
}

/// `namespace/name` of an inventory entry whose status is `created`
///
/// Only the last parenthesized group is the status, so names that contain
/// parentheses themselves are kept intact.
pub fn created_item_key(entry: &str) -> Option<&str> {
    let status = STATUS_GROUP.captures_iter(entry).last()?;
    if &status[1] != ITEM_RESTORE_RESULT_CREATED {
        return None;
    }
    let start = status.get(0)?.start();
    Some(&entry[..start])
}

/// PVCs created by the main restore phase, as `namespace/name` keys
pub fn restored_pvcs(resources: &RestoredResourceList) -> HashSet<String> {
    resources
        .get(PVC_RESOURCE_KEY)
        .into_iter()
        .flatten()
        .filter_map(|entry| created_item_key(entry))
        .map(str::to_string)
        .collect()
}
