use std::collections::BTreeMap;
use std::path::Path;

use hb_core::rules::RuleCounts;
use hb_core::{ActionTag, Verdict};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyReport {
    pub url: String,
    pub top: String,
    pub verdict: &'static str,
    pub third_party: bool,
    pub base_domain: Option<String>,
    pub decisions: BTreeMap<String, ActionTag>,
    pub clobbered: Vec<String>,
}

fn verdict_name(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Allow => "allow",
        Verdict::Block => "block",
        Verdict::Cookieblock => "cookieblock",
    }
}

impl ClassifyReport {
    pub fn new(
        url: &str,
        top: &str,
        verdict: Verdict,
        third_party: bool,
        base_domain: Option<String>,
        decisions: BTreeMap<String, ActionTag>,
        clobbered: Vec<String>,
    ) -> Self {
        Self {
            url: url.to_string(),
            top: top.to_string(),
            verdict: verdict_name(verdict),
            third_party,
            base_domain,
            decisions,
            clobbered,
        }
    }

    pub fn print(&self) {
        println!("Request: {}", self.url);
        println!("  Top document: {}", self.top);
        println!("  Base domain:  {}", self.base_domain.as_deref().unwrap_or("-"));
        println!("  Third-party:  {}", self.third_party);
        println!("  Verdict:      {}", self.verdict);
        for (origin, tag) in &self.decisions {
            println!("  Decision:     {} -> {}", origin, tag);
        }
        for origin in &self.clobbered {
            println!("  Clobber:      {}", origin);
        }
    }
}

pub struct InfoReport<'a> {
    path: &'a Path,
    counts: RuleCounts,
    has_psl: bool,
}

impl<'a> InfoReport<'a> {
    pub fn new(path: &'a Path, counts: RuleCounts, has_psl: bool) -> Self {
        Self { path, counts, has_psl }
    }

    pub fn print(&self) {
        println!("Rule store: {}", self.path.display());
        println!("  PSL:             {}", if self.has_psl { "loaded" } else { "fallback" });
        println!();
        println!("Lists:");
        println!("  Preloads:        {}", self.counts.preloads);
        println!("  Blocked origins: {}", self.counts.blocked_origins);
        println!("  User red:        {}", self.counts.user_red);
        println!("  User yellow:     {}", self.counts.user_yellow);
        println!("  User green:      {}", self.counts.user_green);
        println!("  Disabled sites:  {}", self.counts.disabled_sites);
    }
}
