//! Per-tab settings ledger
//!
//! Records the latest decision per origin for every top-level browsing
//! context, so a summary view can show what happened on the current page.
//! User edits made from that view are staged here and committed back into
//! the shared [`RuleStore`].
//!
//! Per tab: `absent -> populated -> cleared (navigation) -> populated -> ...`,
//! until the tab is removed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::rules::{RuleError, RuleStore, UserEdit};
use crate::store::PersistentStore;
use crate::types::{ActionTag, DecisionEvent, Effect, TabId};
use crate::url::normalize_host;

/// What the display layer sees for a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerView {
    /// The tab navigated and nothing was evaluated yet. Not the same as "no trackers".
    Cleared,
    /// Latest decision per origin. Empty if nothing was recorded.
    Entries(BTreeMap<String, ActionTag>),
}

impl LedgerView {
    pub fn is_cleared(&self) -> bool {
        matches!(self, LedgerView::Cleared)
    }

    /// Entries, or an empty map for a cleared tab.
    pub fn entries(&self) -> BTreeMap<String, ActionTag> {
        match self {
            LedgerView::Cleared => BTreeMap::new(),
            LedgerView::Entries(entries) => entries.clone(),
        }
    }

    pub fn get(&self, origin: &str) -> Option<ActionTag> {
        match self {
            LedgerView::Cleared => None,
            LedgerView::Entries(entries) => entries.get(origin).copied(),
        }
    }
}

/// Counts per effect, used for the toolbar badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub blocked: usize,
    pub cookieblocked: usize,
    pub allowed: usize,
}

/// An edit that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEdit {
    pub origin: String,
    pub action: String,
    pub reason: RuleError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub applied: Vec<UserEdit>,
    pub skipped: Vec<SkippedEdit>,
    /// Whether the committed rules were written to the persistent store
    pub persisted: bool,
}

// =============================================================================
// Settings Ledger
// =============================================================================

pub struct SettingsLedger {
    rules: Arc<RuleStore>,
    store: Option<Arc<dyn PersistentStore>>,
    tabs: RwLock<HashMap<TabId, LedgerView>>,
    staged: Mutex<Vec<(String, String)>>,
}

impl SettingsLedger {
    pub fn new(rules: Arc<RuleStore>, store: Option<Arc<dyn PersistentStore>>) -> Self {
        Self {
            rules,
            store,
            tabs: RwLock::new(HashMap::new()),
            staged: Mutex::new(Vec::new()),
        }
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    // -------------------------------------------------------------------------
    // Decisions
    // -------------------------------------------------------------------------

    pub fn record_decision(&self, event: &DecisionEvent) {
        self.record(event.tab_id, &event.origin, event.tag);
    }

    /// Upsert `origin -> tag` for a tab. Never fails; bad input is logged.
    pub fn record(&self, tab_id: TabId, origin: &str, tag: ActionTag) {
        let origin = normalize_host(origin);
        if origin.is_empty() {
            warn!("Dropping {} decision with empty origin in {}", tag, tab_id);
            return;
        }

        let mut tabs = self.tabs.write();
        let view = tabs
            .entry(tab_id)
            .or_insert_with(|| LedgerView::Entries(BTreeMap::new()));
        if view.is_cleared() {
            *view = LedgerView::Entries(BTreeMap::new());
        }
        if let LedgerView::Entries(entries) = view {
            entries.insert(origin, tag);
        }
    }

    pub fn read(&self, tab_id: TabId) -> LedgerView {
        self.tabs
            .read()
            .get(&tab_id)
            .cloned()
            .unwrap_or_else(|| LedgerView::Entries(BTreeMap::new()))
    }

    pub fn summary(&self, tab_id: TabId) -> LedgerSummary {
        let mut summary = LedgerSummary::default();
        if let Some(LedgerView::Entries(entries)) = self.tabs.read().get(&tab_id) {
            for tag in entries.values() {
                match tag.effect() {
                    Effect::Block => summary.blocked += 1,
                    Effect::Cookieblock => summary.cookieblocked += 1,
                    Effect::Allow => summary.allowed += 1,
                }
            }
        }
        summary
    }

    /// Tabs with a table (populated or cleared).
    pub fn tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<TabId> = self.tabs.read().keys().copied().collect();
        tabs.sort();
        tabs
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Top-level navigation: stale decisions must not be shown for the new document.
    pub fn clear(&self, tab_id: TabId) {
        self.tabs.write().insert(tab_id, LedgerView::Cleared);
    }

    /// The tab was closed.
    pub fn remove(&self, tab_id: TabId) {
        if self.tabs.write().remove(&tab_id).is_some() {
            debug!("Dropped ledger for {}", tab_id);
        }
    }

    pub fn clear_all(&self) {
        self.tabs.write().clear();
    }

    // -------------------------------------------------------------------------
    // Staged edits
    // -------------------------------------------------------------------------

    /// Queue a user edit. Nothing changes in the rule store until [`commit`](Self::commit).
    pub fn stage_edit(&self, origin: &str, action: &str) {
        let origin = normalize_host(origin);
        let mut staged = self.staged.lock();
        staged.retain(|(o, _)| o != &origin);
        staged.push((origin, action.to_string()));
    }

    pub fn staged(&self) -> Vec<(String, String)> {
        self.staged.lock().clone()
    }

    pub fn discard_staged(&self) {
        self.staged.lock().clear();
    }

    /// Apply and clear every staged edit.
    pub fn commit(&self) -> CommitReport {
        let staged = std::mem::take(&mut *self.staged.lock());
        self.commit_edits(staged)
    }

    /// Apply a list of `(origin, action)` edits.
    ///
    /// Unknown actions are skipped. The rest are applied together, persisted
    /// if a store is configured, and every tab is marked cleared so its view
    /// is rebuilt against the committed rules.
    pub fn commit_edits<I, O, A>(&self, edits: I) -> CommitReport
    where
        I: IntoIterator<Item = (O, A)>,
        O: AsRef<str>,
        A: AsRef<str>,
    {
        let mut report = CommitReport::default();

        for (origin, action) in edits {
            let (origin, action) = (origin.as_ref(), action.as_ref());
            match UserEdit::parse(origin, action) {
                Ok(edit) => report.applied.push(edit),
                Err(reason) => {
                    warn!("Skipping staged edit {} -> '{}': {}", origin, action, reason);
                    report.skipped.push(SkippedEdit {
                        origin: origin.to_string(),
                        action: action.to_string(),
                        reason,
                    });
                }
            }
        }

        if report.applied.is_empty() {
            return report;
        }

        self.rules.apply_user_edits(&report.applied);

        if let Some(store) = &self.store {
            match store.save(&self.rules.snapshot()) {
                Ok(()) => report.persisted = true,
                Err(e) => warn!("Failed to persist committed rules: {}", e),
            }
        }

        let mut tabs = self.tabs.write();
        for view in tabs.values_mut() {
            *view = LedgerView::Cleared;
        }
        info!(
            "Committed {} edits ({} skipped), {} views reset",
            report.applied.len(),
            report.skipped.len(),
            tabs.len()
        );

        report
    }
}
