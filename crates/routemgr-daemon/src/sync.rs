//! Initial config-sync driver.
//!
//! When a backend client (re)connects, the daemon walks the datastore
//! from the root and collects, for this adapter only, the nodes whose
//! resolved subscribers include the adapter's client id. The result is an
//! ordered, path-deduplicated change set the transaction manager then
//! drains as `CFG_DATA_REQ` batches followed by one `CFG_APPLY_REQ`.
//!
//! The walk happens at most once per adapter: a non-empty cached set is
//! returned as-is on later calls.

use routemgr_core::SubscriptionMap;

use crate::adapter::Adapter;
use crate::datastore::Datastore;

/// How a change mutates the client's view of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgChangeAction {
    /// The node exists and the client has never seen it.
    Created,
    /// The node's value changed.
    Modified,
    /// The node went away.
    Deleted,
}

/// One pending configuration change, keyed by path in the adapter's set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgChange {
    /// Emission order; strictly increasing across the set.
    pub seq: u32,
    /// Mutation kind. The initial sync only emits `Created`.
    pub action: CfgChangeAction,
    /// Serialized node value, if any.
    pub value: Option<String>,
}

/// A drained change with its path, in `seq` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgChangeEntry {
    /// Instance path of the changed node.
    pub xpath: String,
    /// The change itself.
    pub change: CfgChange,
}

/// Collects the configuration this adapter must be brought up to date
/// with, returning the changes in emission (`seq`) order.
///
/// Returns an empty set for adapters that have not identified themselves
/// yet; identity arrives with the subscribe request, and conn-init will
/// land here again on the next connection if the client never does.
pub fn get_adapter_config(
    adapter: &Adapter,
    datastore: &dyn Datastore,
    subscriptions: &SubscriptionMap,
) -> Vec<CfgChangeEntry> {
    let Some(id) = adapter.id() else {
        return Vec::new();
    };

    let mut changes = adapter.cfg_changes();
    if changes.is_empty() {
        let mut seq = 0u32;
        datastore.walk_subtree("/", &mut |node| {
            if !subscriptions.resolve(node.xpath).is_subscribed(id) {
                return;
            }
            changes.entry(node.xpath.to_string()).or_insert_with(|| {
                let change = CfgChange {
                    seq,
                    action: CfgChangeAction::Created,
                    value: node.value.map(str::to_string),
                };
                seq += 1;
                change
            });
        });
    }

    let mut entries: Vec<CfgChangeEntry> = changes
        .iter()
        .map(|(xpath, change)| CfgChangeEntry {
            xpath: xpath.clone(),
            change: change.clone(),
        })
        .collect();
    entries.sort_by_key(|entry| entry.change.seq);
    entries
}
