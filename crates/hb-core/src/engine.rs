//! Policy Decision Engine
//!
//! Every third-party request goes through here. Rules are checked in a fixed
//! order and the first match wins; user overrides come before heuristics.
//! The engine never blocks on input it cannot classify.

use std::sync::Arc;

use log::{debug, warn};

use crate::party::{is_whitelisted_scheme, PartyClassifier};
use crate::psl::SuffixResolver;
use crate::rules::RuleStore;
use crate::stripper::CredentialStripper;
use crate::types::{
    ActionTag, CookieblockDecision, DecisionEvent, Evaluation, FrameContext, RequestType, Verdict,
};
use crate::url::origin_of;

/// A request that passed the gate: third-party, with a usable origin.
#[derive(Debug)]
struct Subject {
    origin: String,
    base: Option<String>,
}

// =============================================================================
// Policy Engine
// =============================================================================

/// The rule-evaluation core.
#[derive(Clone)]
pub struct PolicyEngine {
    rules: Arc<RuleStore>,
    party: PartyClassifier,
    stripper: Arc<dyn CredentialStripper>,
}

impl PolicyEngine {
    pub fn new(
        rules: Arc<RuleStore>,
        suffixes: Arc<dyn SuffixResolver>,
        stripper: Arc<dyn CredentialStripper>,
    ) -> Self {
        Self {
            rules,
            party: PartyClassifier::new(suffixes),
            stripper,
        }
    }

    pub fn rules(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn party(&self) -> &PartyClassifier {
        &self.party
    }

    /// Decide whether a request is allowed or blocked.
    ///
    /// Returns the verdict together with the decision event for the ledger,
    /// if a terminal rule matched.
    pub fn evaluate(&self, location: &str, ctx: &FrameContext<'_>) -> Evaluation {
        // G: not evaluable, first-party, or disabled site
        let Some(subject) = self.gate(location, ctx) else {
            return Evaluation::allow();
        };
        let origin = subject.origin.as_str();
        let base = subject.base.as_deref();

        // R1, R2a, R2b: user lists, read under one guard so a concurrent
        // commit is seen entirely or not at all
        let user_rule = self.rules.with_user_lists(|user| {
            if user.red.contains(origin) {
                Some((ActionTag::UserBlock, Verdict::Block, false))
            } else if user.green.contains(origin) {
                Some((ActionTag::UserNoAction, Verdict::Allow, false))
            } else if user.yellow.contains(origin) {
                Some((ActionTag::UserCookieblock, Verdict::Allow, false))
            } else if base.is_some_and(|b| user.yellow.contains(b)) {
                // inherited from the base domain
                Some((ActionTag::UserCookieblock, Verdict::Allow, true))
            } else {
                None
            }
        });
        if let Some((tag, verdict, clobber)) = user_rule {
            if clobber {
                self.stripper.clobber(origin);
            }
            return self.decide(ctx, subject.origin, tag, verdict);
        }

        // R2c: preload allowlist
        if self.rules.is_preloaded(origin) {
            return self.decide(ctx, subject.origin, ActionTag::NoAction, Verdict::Allow);
        }

        // R3: heuristic block on the base domain
        if base.is_some_and(|b| self.rules.is_blocked_base(b)) {
            return self.decide(ctx, subject.origin, ActionTag::Block, Verdict::Block);
        }

        Evaluation::allow()
    }

    /// Decide whether a request that was not blocked should lose its credentials.
    pub fn should_cookieblock(&self, location: &str, ctx: &FrameContext<'_>) -> CookieblockDecision {
        let Some(subject) = self.gate(location, ctx) else {
            return CookieblockDecision::default();
        };
        let origin = subject.origin.as_str();
        let base = subject.base.as_deref();

        let (user_yellow, base_user_red) = self.rules.with_user_lists(|user| {
            let yellow = user.yellow.contains(origin) || base.is_some_and(|b| user.yellow.contains(b));
            (yellow, base.is_some_and(|b| user.red.contains(b)))
        });

        // C1: user cookie-block list
        if user_yellow {
            return self.cookieblock(ctx, subject.origin, ActionTag::UserCookieblock);
        }

        // C2: preloaded domain that has since been detected as a tracker
        let mut pending = None;
        if self.is_preloaded(origin, base) {
            if base.is_some_and(|b| self.rules.is_blocked_base(b)) {
                return self.cookieblock(ctx, subject.origin, ActionTag::Cookieblock);
            }
            pending = Some(self.event(ctx, origin.to_string(), ActionTag::NoAction));
        }

        // C3: block decision on the parent domain covers its subdomains
        if base_user_red || base.is_some_and(|b| self.rules.is_blocked_base(b)) {
            return self.cookieblock(ctx, subject.origin, ActionTag::Cookieblock);
        }

        CookieblockDecision {
            cookieblock: false,
            event: pending,
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn gate(&self, location: &str, ctx: &FrameContext<'_>) -> Option<Subject> {
        if is_whitelisted_scheme(location) {
            return None;
        }
        if ctx.request_type.contains(RequestType::MAIN_FRAME) {
            return None;
        }

        let Some(top_url) = ctx.top_document_url else {
            warn!("No top document for request in {}, allowing '{}'", ctx.tab_id, location);
            return None;
        };
        let Some(origin) = origin_of(location) else {
            warn!("Unparseable request URL '{}', allowing", location);
            return None;
        };

        if let Some(top_origin) = origin_of(top_url) {
            if self.rules.is_disabled_site(&top_origin) {
                debug!("Blocking disabled on '{}'", top_origin);
                return None;
            }
        }

        if !self.party.is_third_party(location, top_url) {
            return None;
        }

        let base = self.party.base_domain_of_origin(&origin);
        if base.is_none() {
            debug!("No base domain for '{}'", origin);
        }
        Some(Subject { origin, base })
    }

    fn is_preloaded(&self, origin: &str, base: Option<&str>) -> bool {
        self.rules.is_preloaded(origin) || base.is_some_and(|b| self.rules.is_preloaded(b))
    }

    fn event(&self, ctx: &FrameContext<'_>, origin: String, tag: ActionTag) -> DecisionEvent {
        DecisionEvent {
            tag,
            tab_id: ctx.tab_id,
            origin,
        }
    }

    fn decide(&self, ctx: &FrameContext<'_>, origin: String, tag: ActionTag, verdict: Verdict) -> Evaluation {
        debug!("{} -> {} ({:?}) in {}", origin, tag, verdict, ctx.tab_id);
        Evaluation {
            verdict,
            event: Some(self.event(ctx, origin, tag)),
        }
    }

    fn cookieblock(&self, ctx: &FrameContext<'_>, origin: String, tag: ActionTag) -> CookieblockDecision {
        self.stripper.clobber(&origin);
        debug!("{} -> {} (cookieblock) in {}", origin, tag, ctx.tab_id);
        CookieblockDecision {
            cookieblock: true,
            event: Some(self.event(ctx, origin, tag)),
        }
    }
}
