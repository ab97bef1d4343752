//! Rule lists consulted by the policy engine
//!
//! The store is shared between the request path (reader), the tracker
//! detector (writer of the heuristic block set) and the settings ledger
//! (writer of the user lists). Every set sits behind a lock; the three user
//! lists share one lock so a commit is observed all at once or not at all.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::url::normalize_host;

/// Error type for rule edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Unknown user action '{0}'")]
    UnknownAction(String),
    #[error("Empty origin")]
    EmptyOrigin,
}

// =============================================================================
// User Edits
// =============================================================================

/// An override the user can commit for an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    /// Remove the origin from every user list
    Reset,
    /// Add to the user block list
    Block,
    /// Add to the user cookie-block list
    Cookieblock,
    /// Add to the user allow list
    Noaction,
}

impl FromStr for UserAction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reset" => Ok(Self::Reset),
            "block" => Ok(Self::Block),
            "cookieblock" => Ok(Self::Cookieblock),
            "noaction" => Ok(Self::Noaction),
            other => Err(RuleError::UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reset => "reset",
            Self::Block => "block",
            Self::Cookieblock => "cookieblock",
            Self::Noaction => "noaction",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEdit {
    pub origin: String,
    pub action: UserAction,
}

impl UserEdit {
    pub fn new(origin: &str, action: UserAction) -> Result<Self, RuleError> {
        let origin = normalize_host(origin);
        if origin.is_empty() {
            return Err(RuleError::EmptyOrigin);
        }
        Ok(Self { origin, action })
    }

    /// Parse an edit as staged by the display layer.
    pub fn parse(origin: &str, action: &str) -> Result<Self, RuleError> {
        Self::new(origin, action.parse()?)
    }
}

// =============================================================================
// Snapshot (persisted shape)
// =============================================================================

/// Persisted form of every rule set: string keys with presence semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleSnapshot {
    pub preloads: BTreeSet<String>,
    pub blocked_origins: BTreeSet<String>,
    pub user_red: BTreeSet<String>,
    pub user_yellow: BTreeSet<String>,
    pub user_green: BTreeSet<String>,
    pub disabled_sites: BTreeSet<String>,
}

fn normalized(set: BTreeSet<String>) -> BTreeSet<String> {
    set.into_iter()
        .map(|s| normalize_host(&s))
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// Rule Store
// =============================================================================

/// The three user-curated lists, updated together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLists {
    pub red: BTreeSet<String>,
    pub yellow: BTreeSet<String>,
    pub green: BTreeSet<String>,
}

impl UserLists {
    fn remove(&mut self, origin: &str) {
        self.red.remove(origin);
        self.yellow.remove(origin);
        self.green.remove(origin);
    }

    fn apply(&mut self, edit: &UserEdit) {
        self.remove(&edit.origin);
        let origin = edit.origin.clone();
        match edit.action {
            UserAction::Reset => {}
            UserAction::Block => {
                self.red.insert(origin);
            }
            UserAction::Cookieblock => {
                self.yellow.insert(origin);
            }
            UserAction::Noaction => {
                self.green.insert(origin);
            }
        }
    }
}

/// Size of each set, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleCounts {
    pub preloads: usize,
    pub blocked_origins: usize,
    pub user_red: usize,
    pub user_yellow: usize,
    pub user_green: usize,
    pub disabled_sites: usize,
}

/// Shared, concurrency-safe rule lists.
#[derive(Debug, Default)]
pub struct RuleStore {
    preloads: BTreeSet<String>,
    blocked_origins: RwLock<BTreeSet<String>>,
    user: RwLock<UserLists>,
    disabled_sites: RwLock<BTreeSet<String>>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted data. Keys are normalized.
    pub fn from_snapshot(snapshot: RuleSnapshot) -> Self {
        let store = Self {
            preloads: normalized(snapshot.preloads),
            blocked_origins: RwLock::new(normalized(snapshot.blocked_origins)),
            user: RwLock::new(UserLists {
                red: normalized(snapshot.user_red),
                yellow: normalized(snapshot.user_yellow),
                green: normalized(snapshot.user_green),
            }),
            disabled_sites: RwLock::new(normalized(snapshot.disabled_sites)),
        };
        let counts = store.counts();
        info!(
            "Loaded rules: {} preloads, {} blocked, {}/{}/{} user red/yellow/green",
            counts.preloads, counts.blocked_origins, counts.user_red, counts.user_yellow, counts.user_green
        );
        store
    }

    /// Replace the preload allowlist. Only meaningful before the store is shared.
    pub fn with_preloads<I, S>(mut self, preloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.preloads = preloads
            .into_iter()
            .map(|s| normalize_host(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Persisted form of the current state.
    pub fn snapshot(&self) -> RuleSnapshot {
        let user = self.user.read().clone();
        RuleSnapshot {
            preloads: self.preloads.clone(),
            blocked_origins: self.blocked_origins.read().clone(),
            user_red: user.red,
            user_yellow: user.yellow,
            user_green: user.green,
            disabled_sites: self.disabled_sites.read().clone(),
        }
    }

    pub fn counts(&self) -> RuleCounts {
        let user = self.user.read();
        RuleCounts {
            preloads: self.preloads.len(),
            blocked_origins: self.blocked_origins.read().len(),
            user_red: user.red.len(),
            user_yellow: user.yellow.len(),
            user_green: user.green.len(),
            disabled_sites: self.disabled_sites.read().len(),
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_preloaded(&self, origin: &str) -> bool {
        self.preloads.contains(origin)
    }

    pub fn is_blocked_base(&self, base_domain: &str) -> bool {
        self.blocked_origins.read().contains(base_domain)
    }

    pub fn user_red_contains(&self, key: &str) -> bool {
        self.user.read().red.contains(key)
    }

    pub fn user_yellow_contains(&self, key: &str) -> bool {
        self.user.read().yellow.contains(key)
    }

    pub fn user_green_contains(&self, key: &str) -> bool {
        self.user.read().green.contains(key)
    }

    pub fn is_disabled_site(&self, origin: &str) -> bool {
        self.disabled_sites.read().contains(origin)
    }

    /// Consistent copy of the user lists.
    pub fn user_lists(&self) -> UserLists {
        self.user.read().clone()
    }

    /// Run `f` against the user lists under a single read guard.
    ///
    /// Every check made inside `f` sees the same commit. `f` must not call
    /// back into the user-list queries on this store.
    pub fn with_user_lists<R>(&self, f: impl FnOnce(&UserLists) -> R) -> R {
        f(&self.user.read())
    }

    // -------------------------------------------------------------------------
    // Detector-facing mutation
    // -------------------------------------------------------------------------

    /// Mark a base domain as a tracker. Returns `true` if it was newly added.
    pub fn block_base_domain(&self, base_domain: &str) -> bool {
        let key = normalize_host(base_domain);
        if key.is_empty() {
            return false;
        }
        let added = self.blocked_origins.write().insert(key);
        if added {
            debug!("Heuristic block added for '{}'", base_domain);
        }
        added
    }

    pub fn unblock_base_domain(&self, base_domain: &str) -> bool {
        self.blocked_origins.write().remove(&normalize_host(base_domain))
    }

    // -------------------------------------------------------------------------
    // Site toggles
    // -------------------------------------------------------------------------

    pub fn disable_site(&self, origin: &str) -> bool {
        let key = normalize_host(origin);
        if key.is_empty() {
            return false;
        }
        self.disabled_sites.write().insert(key)
    }

    pub fn enable_site(&self, origin: &str) -> bool {
        self.disabled_sites.write().remove(&normalize_host(origin))
    }

    // -------------------------------------------------------------------------
    // User lists
    // -------------------------------------------------------------------------

    /// Apply a batch of user edits under a single write lock.
    pub fn apply_user_edits(&self, edits: &[UserEdit]) {
        if edits.is_empty() {
            return;
        }
        let mut user = self.user.write();
        for edit in edits {
            user.apply(edit);
        }
        info!("Applied {} user edits", edits.len());
    }
}
