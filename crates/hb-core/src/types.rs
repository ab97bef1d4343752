//! Core type definitions for HeuristicBlocker
//!
//! These types are shared by the policy engine, the settings ledger and the
//! host bindings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Action Tags
// =============================================================================

/// Decision recorded for an origin.
///
/// The `User*` variants come from explicit user overrides; the others are
/// heuristic decisions. Ordering between tags is given by [`ActionTag::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTag {
    /// No blocking (heuristic default)
    NoAction,
    /// Heuristically blocked, request not sent
    Block,
    /// Heuristically cookie-blocked, request sent without credentials
    Cookieblock,
    /// User allowed
    UserNoAction,
    /// User blocked
    UserBlock,
    /// User cookie-blocked
    UserCookieblock,
}

/// What a tag does to the request, independent of who decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Allow,
    Block,
    Cookieblock,
}

impl ActionTag {
    /// All tags, highest priority first.
    pub const BY_PRIORITY: [ActionTag; 6] = [
        ActionTag::UserBlock,
        ActionTag::UserCookieblock,
        ActionTag::UserNoAction,
        ActionTag::Block,
        ActionTag::Cookieblock,
        ActionTag::NoAction,
    ];

    /// Precedence of this tag. Higher wins.
    pub const fn priority(self) -> u8 {
        match self {
            ActionTag::UserBlock => 5,
            ActionTag::UserCookieblock => 4,
            ActionTag::UserNoAction => 3,
            ActionTag::Block => 2,
            ActionTag::Cookieblock => 1,
            ActionTag::NoAction => 0,
        }
    }

    pub const fn is_user(self) -> bool {
        matches!(
            self,
            ActionTag::UserBlock | ActionTag::UserCookieblock | ActionTag::UserNoAction
        )
    }

    pub const fn effect(self) -> Effect {
        match self {
            ActionTag::NoAction | ActionTag::UserNoAction => Effect::Allow,
            ActionTag::Block | ActionTag::UserBlock => Effect::Block,
            ActionTag::Cookieblock | ActionTag::UserCookieblock => Effect::Cookieblock,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ActionTag::NoAction => "noaction",
            ActionTag::Block => "block",
            ActionTag::Cookieblock => "cookieblock",
            ActionTag::UserNoAction => "usernoaction",
            ActionTag::UserBlock => "userblock",
            ActionTag::UserCookieblock => "usercookieblock",
        }
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionTag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noaction" => Ok(Self::NoAction),
            "block" => Ok(Self::Block),
            "cookieblock" => Ok(Self::Cookieblock),
            "usernoaction" => Ok(Self::UserNoAction),
            "userblock" => Ok(Self::UserBlock),
            "usercookieblock" => Ok(Self::UserCookieblock),
            _ => Err(()),
        }
    }
}

impl PartialOrd for ActionTag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActionTag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// Final decision for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Verdict {
    /// Request is sent unchanged
    Allow = 0,
    /// Request is cancelled
    Block = 1,
    /// Request is sent with credentials stripped
    Cookieblock = 2,
}

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const MAIN_FRAME = 1 << 6;   // main document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const FETCH = 1 << 14;

        /// Document types (main_frame + sub_frame)
        const DOCUMENT = Self::MAIN_FRAME.bits() | Self::SUBDOCUMENT.bits();
    }
}

impl RequestType {
    /// Parse from browser request type string.
    pub fn parse(s: &str) -> Self {
        match s {
            "main_frame" | "document" => Self::MAIN_FRAME,
            "sub_frame" | "subdocument" => Self::SUBDOCUMENT,
            "stylesheet" | "css" => Self::STYLESHEET,
            "script" | "js" => Self::SCRIPT,
            "image" | "img" => Self::IMAGE,
            "font" => Self::FONT,
            "object" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "ping" => Self::PING,
            "beacon" => Self::BEACON,
            "fetch" => Self::FETCH,
            "csp_report" => Self::CSP_REPORT,
            "media" => Self::MEDIA,
            "websocket" | "ws" => Self::WEBSOCKET,
            _ => Self::OTHER,
        }
    }
}

// =============================================================================
// Browsing Contexts
// =============================================================================

/// Stable identifier of a top-level browsing context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub i32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab {}", self.0)
    }
}

/// The frame a request was issued from.
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    /// Top-level context the frame belongs to
    pub tab_id: TabId,
    /// Frame ID (0 for the top frame)
    pub frame_id: i32,
    /// URL of the top-level document, if known
    pub top_document_url: Option<&'a str>,
    /// Request type
    pub request_type: RequestType,
}

impl<'a> FrameContext<'a> {
    pub fn new(tab_id: i32, top_document_url: &'a str, request_type: RequestType) -> Self {
        Self {
            tab_id: TabId(tab_id),
            frame_id: 0,
            top_document_url: Some(top_document_url),
            request_type,
        }
    }

    pub fn with_frame(mut self, frame_id: i32) -> Self {
        self.frame_id = frame_id;
        self
    }
}

// =============================================================================
// Decision Events
// =============================================================================

/// A decision taken for an origin in a context, to be forwarded to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionEvent {
    pub tag: ActionTag,
    pub tab_id: TabId,
    pub origin: String,
}

/// Result of [`PolicyEngine::evaluate`](crate::engine::PolicyEngine::evaluate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub event: Option<DecisionEvent>,
}

impl Evaluation {
    pub(crate) fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            event: None,
        }
    }

    /// Tag of the emitted event, if any.
    pub fn tag(&self) -> Option<ActionTag> {
        self.event.as_ref().map(|e| e.tag)
    }
}

/// Result of [`PolicyEngine::should_cookieblock`](crate::engine::PolicyEngine::should_cookieblock).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieblockDecision {
    pub cookieblock: bool,
    pub event: Option<DecisionEvent>,
}

impl CookieblockDecision {
    pub fn tag(&self) -> Option<ActionTag> {
        self.event.as_ref().map(|e| e.tag)
    }
}

/// What the host's interception hook should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Disposition {
    Permit = 0,
    Deny = 1,
    PermitWithoutCredentials = 2,
}

impl From<Verdict> for Disposition {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allow => Disposition::Permit,
            Verdict::Block => Disposition::Deny,
            Verdict::Cookieblock => Disposition::PermitWithoutCredentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trips_through_str() {
        for tag in ActionTag::BY_PRIORITY {
            assert_eq!(tag.as_str().parse::<ActionTag>(), Ok(tag));
        }
        assert!("preloads".parse::<ActionTag>().is_err());
    }

    #[test]
    fn test_priority_order() {
        assert!(ActionTag::UserBlock > ActionTag::UserCookieblock);
        assert!(ActionTag::UserCookieblock > ActionTag::UserNoAction);
        assert!(ActionTag::UserNoAction > ActionTag::Block);
        assert!(ActionTag::Block > ActionTag::Cookieblock);
        assert!(ActionTag::Cookieblock > ActionTag::NoAction);

        let mut tags = ActionTag::BY_PRIORITY.to_vec();
        tags.sort();
        tags.reverse();
        assert_eq!(tags, ActionTag::BY_PRIORITY.to_vec());
    }

    #[test]
    fn test_effects() {
        assert_eq!(ActionTag::UserBlock.effect(), Effect::Block);
        assert_eq!(ActionTag::UserCookieblock.effect(), Effect::Cookieblock);
        assert_eq!(ActionTag::UserNoAction.effect(), Effect::Allow);
        assert!(ActionTag::UserNoAction.is_user());
        assert!(!ActionTag::Cookieblock.is_user());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ActionTag::UserCookieblock).unwrap();
        assert_eq!(json, "\"usercookieblock\"");
        let tag: ActionTag = serde_json::from_str("\"noaction\"").unwrap();
        assert_eq!(tag, ActionTag::NoAction);
    }

    #[test]
    fn test_request_type_parse() {
        assert_eq!(RequestType::parse("main_frame"), RequestType::MAIN_FRAME);
        assert_eq!(RequestType::parse("script"), RequestType::SCRIPT);
        assert_eq!(RequestType::parse("something"), RequestType::OTHER);
        assert!(RequestType::DOCUMENT.contains(RequestType::SUBDOCUMENT));
    }

    #[test]
    fn test_disposition_from_verdict() {
        assert_eq!(Disposition::from(Verdict::Block), Disposition::Deny);
        assert_eq!(
            Disposition::from(Verdict::Cookieblock),
            Disposition::PermitWithoutCredentials
        );
    }
}
