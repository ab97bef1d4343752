//! HeuristicBlocker Core Library
//!
//! This crate provides the policy decision engine and the per-tab settings
//! ledger for the HeuristicBlocker content blocker.
//!
//! # Architecture
//!
//! Every third-party request is evaluated against a shared [`RuleStore`]:
//! user overrides first, then the preload allowlist, then the heuristic block
//! list maintained by the tracker detector. The engine returns its verdict
//! together with a decision event; the caller forwards that event to the
//! [`SettingsLedger`], which the summary view reads and edits.
//!
//! # Modules
//!
//! - `url`: Scheme and host extraction without full URL parsing
//! - `psl`: Public Suffix List for base domain extraction
//! - `party`: First-party / third-party classification
//! - `rules`: Shared rule lists and user edits
//! - `engine`: Rule evaluation and precedence
//! - `ledger`: Per-tab decision tables and staged edits
//! - `adapter`: Host request hook glue
//! - `store`: Rule persistence
//! - `stripper`: Credential stripping hook
//! - `types`: Shared type definitions

pub mod adapter;
pub mod engine;
pub mod ledger;
pub mod party;
pub mod psl;
pub mod rules;
pub mod store;
pub mod stripper;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use adapter::Interceptor;
pub use engine::PolicyEngine;
pub use ledger::{CommitReport, LedgerSummary, LedgerView, SettingsLedger};
pub use party::{is_whitelisted_scheme, PartyClassifier};
pub use psl::{SuffixList, SuffixResolver};
pub use rules::{RuleError, RuleSnapshot, RuleStore, UserAction, UserEdit};
pub use store::{JsonFileStore, MemoryStore, PersistentStore, StoreError};
pub use stripper::{ClobberQueue, CredentialStripper, NoopStripper, RecordingStripper};
pub use types::{
    ActionTag, CookieblockDecision, DecisionEvent, Disposition, Evaluation, FrameContext,
    RequestType, TabId, Verdict,
};
