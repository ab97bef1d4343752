//! Glue between the host's request hook and the engine
//!
//! The host calls [`Interceptor::classify`] once per request before it is
//! dispatched, and reports navigations and closed tabs so the ledger stays
//! in sync with what is on screen.

use std::sync::Arc;

use log::debug;

use crate::engine::PolicyEngine;
use crate::ledger::SettingsLedger;
use crate::types::{ActionTag, Disposition, FrameContext, TabId, Verdict};

#[derive(Clone)]
pub struct Interceptor {
    engine: PolicyEngine,
    ledger: Arc<SettingsLedger>,
}

impl Interceptor {
    pub fn new(engine: PolicyEngine, ledger: Arc<SettingsLedger>) -> Self {
        Self { engine, ledger }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn ledger(&self) -> &Arc<SettingsLedger> {
        &self.ledger
    }

    /// Final verdict for a request, forwarding decision events to the ledger.
    pub fn verdict(&self, url: &str, ctx: &FrameContext<'_>) -> Verdict {
        let evaluation = self.engine.evaluate(url, ctx);
        let user_allowed = evaluation.tag() == Some(ActionTag::UserNoAction);
        if let Some(event) = &evaluation.event {
            self.ledger.record_decision(event);
        }

        if evaluation.verdict == Verdict::Block {
            return Verdict::Block;
        }
        // An explicit user allow is not second-guessed by the cookie-block paths
        if user_allowed {
            return Verdict::Allow;
        }

        let cookieblock = self.engine.should_cookieblock(url, ctx);
        if let Some(event) = &cookieblock.event {
            self.ledger.record_decision(event);
        }
        if cookieblock.cookieblock {
            Verdict::Cookieblock
        } else {
            Verdict::Allow
        }
    }

    pub fn classify(&self, url: &str, ctx: &FrameContext<'_>) -> Disposition {
        self.verdict(url, ctx).into()
    }

    /// A same-document navigation (anchor change) keeps the tab's decisions.
    pub fn on_navigate(&self, tab_id: TabId, same_document: bool) {
        if same_document {
            return;
        }
        debug!("Navigation in {}, clearing ledger", tab_id);
        self.ledger.clear(tab_id);
    }

    pub fn on_context_destroyed(&self, tab_id: TabId) {
        self.ledger.remove(tab_id);
    }
}
