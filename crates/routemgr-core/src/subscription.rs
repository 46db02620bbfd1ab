//! Static pattern → subscriber registry and xpath resolution.
//!
//! The registry is built once at daemon start-up from a compiled-in table
//! and is read-only afterwards; there is no dynamic re-registration. Each
//! entry binds a glob pattern to the set of backend clients interested in
//! that subtree, with a per-client capability triple.
//!
//! [`SubscriptionMap::resolve`] answers the routing question: given an
//! instance path, which clients own it? Candidate patterns are scored
//! with [`crate::xpath::match_len`]; only the patterns achieving the
//! maximum positive score contribute, and their capability bits are
//! OR-merged per client. The root-scope paths `/` and `/*` short-circuit
//! to the union of every registered subscriber.

use thiserror::Error;

use crate::client::ClientId;
use crate::xpath;

/// Upper bound on registered patterns.
///
/// The registry is a fixed-size table in spirit; exceeding this at init
/// is a programming error surfaced as [`SubscriptionMapError::TooMany`].
pub const MAX_PATTERNS: usize = 256;

/// Per-(pattern, client) capability flags.
///
/// The three bits are consulted individually by different daemon paths
/// even though the static registry currently sets them uniformly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityTriple {
    /// The client validates configuration under this subtree.
    pub validate_config: bool,
    /// The client is notified of configuration changes under this subtree.
    pub notify_config: bool,
    /// The client owns operational data under this subtree.
    pub own_oper_data: bool,
}

impl CapabilityTriple {
    /// All three capabilities granted.
    pub const ALL: Self = Self {
        validate_config: true,
        notify_config: true,
        own_oper_data: true,
    };

    /// True if any capability bit is set.
    #[must_use]
    pub const fn subscribed(&self) -> bool {
        self.validate_config || self.notify_config || self.own_oper_data
    }

    /// Per-bit union of two triples.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            validate_config: self.validate_config || other.validate_config,
            notify_config: self.notify_config || other.notify_config,
            own_oper_data: self.own_oper_data || other.own_oper_data,
        }
    }
}

/// One registered pattern with its interested clients.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pattern: String,
    subscribers: [Option<CapabilityTriple>; ClientId::COUNT],
}

impl SubscriptionEntry {
    /// The registered glob pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The capability triple for one client, if subscribed.
    #[must_use]
    pub fn capabilities(&self, id: ClientId) -> Option<CapabilityTriple> {
        self.subscribers[id.index()]
    }

    /// Iterates subscribed clients with their capabilities.
    pub fn subscribers(&self) -> impl Iterator<Item = (ClientId, CapabilityTriple)> + '_ {
        ClientId::ALL
            .into_iter()
            .filter_map(|id| self.subscribers[id.index()].map(|caps| (id, caps)))
    }
}

/// The resolved subscriber set for one instance path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberInfo {
    per_client: [Option<CapabilityTriple>; ClientId::COUNT],
}

impl SubscriberInfo {
    /// The merged capabilities of one client, if it is subscribed at all.
    #[must_use]
    pub fn get(&self, id: ClientId) -> Option<CapabilityTriple> {
        self.per_client[id.index()]
    }

    /// True if the client is subscribed with any capability.
    #[must_use]
    pub fn is_subscribed(&self, id: ClientId) -> bool {
        self.get(id).is_some_and(|caps| caps.subscribed())
    }

    /// Iterates subscribed clients with their merged capabilities.
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, CapabilityTriple)> + '_ {
        ClientId::ALL
            .into_iter()
            .filter_map(|id| self.per_client[id.index()].map(|caps| (id, caps)))
    }

    /// True if no client is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.per_client.iter().all(Option::is_none)
    }

    fn merge_in(&mut self, id: ClientId, caps: CapabilityTriple) {
        let slot = &mut self.per_client[id.index()];
        *slot = Some(slot.map_or(caps, |prev| prev.merge(caps)));
    }
}

/// Errors building the subscription map.
#[derive(Debug, Error)]
pub enum SubscriptionMapError {
    /// More patterns than the registry can hold.
    #[error("too many xpath patterns: {count} exceeds the {MAX_PATTERNS} limit")]
    TooMany {
        /// Number of patterns offered.
        count: usize,
    },
}

/// The process-wide pattern registry. Built once, read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionMap {
    entries: Vec<SubscriptionEntry>,
}

/// The compiled-in registry: pattern → interested clients.
///
/// Every listed (pattern, client) pair gets the full capability triple at
/// init; the per-bit model is kept because resolution and the operator
/// dumps consult the bits individually.
const STATIC_REGISTRY: &[(&str, &[ClientId])] = &[
    ("/frr-vrf:lib/*", &[ClientId::Staticd]),
    ("/frr-interface:lib/*", &[ClientId::Staticd]),
    (
        "/frr-routing:routing/control-plane-protocols/control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/frr-staticd:staticd/*",
        &[ClientId::Staticd],
    ),
];

impl SubscriptionMap {
    /// Builds the map from the compiled-in static registry.
    ///
    /// # Panics
    ///
    /// Panics if the compiled-in table exceeds [`MAX_PATTERNS`]; that is a
    /// build-time mistake, not a runtime condition.
    #[must_use]
    pub fn from_static_registry() -> Self {
        let entries = STATIC_REGISTRY
            .iter()
            .map(|(pattern, clients)| ((*pattern).to_string(), *clients));
        match Self::with_entries(entries) {
            Ok(map) => map,
            Err(err) => unreachable!("static registry is within bounds: {err}"),
        }
    }

    /// Builds a map from arbitrary (pattern, clients) pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionMapError::TooMany`] past [`MAX_PATTERNS`].
    pub fn with_entries<I>(entries: I) -> Result<Self, SubscriptionMapError>
    where
        I: IntoIterator<Item = (String, &'static [ClientId])>,
    {
        let mut built = Vec::new();
        for (pattern, clients) in entries {
            if built.len() == MAX_PATTERNS {
                return Err(SubscriptionMapError::TooMany { count: built.len() + 1 });
            }
            let mut subscribers = [None; ClientId::COUNT];
            for id in clients {
                subscribers[id.index()] = Some(CapabilityTriple::ALL);
            }
            built.push(SubscriptionEntry { pattern, subscribers });
        }
        Ok(Self { entries: built })
    }

    /// Number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no patterns are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the registered entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.iter()
    }

    /// Maps an instance path to the clients that own it.
    ///
    /// Every registered pattern is scored; only the patterns achieving the
    /// maximum positive score contribute (all of them, on ties). For root
    /// scope every pattern contributes. Capability bits OR-merge when the
    /// same client arrives via several patterns.
    #[must_use]
    pub fn resolve(&self, instance_xpath: &str) -> SubscriberInfo {
        let root = xpath::is_root_scope(instance_xpath);

        let mut best = 0usize;
        let mut winners: Vec<&SubscriptionEntry> = Vec::new();
        for entry in &self.entries {
            if root {
                winners.push(entry);
                continue;
            }
            let score = xpath::match_len(&entry.pattern, instance_xpath);
            if score == 0 || score < best {
                continue;
            }
            if score > best {
                winners.clear();
                best = score;
            }
            winners.push(entry);
        }

        let mut info = SubscriberInfo::default();
        for entry in winners {
            for (id, caps) in entry.subscribers() {
                if caps.subscribed() {
                    info.merge_in(id, caps);
                }
            }
        }
        info
    }
}
