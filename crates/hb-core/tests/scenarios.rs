use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use hb_core::{
    ActionTag, Disposition, FrameContext, Interceptor, LedgerView, PolicyEngine, RecordingStripper,
    RequestType, RuleStore, SettingsLedger, SuffixList, TabId, UserAction, UserEdit, Verdict,
};

struct Harness {
    rules: Arc<RuleStore>,
    stripper: Arc<RecordingStripper>,
    hook: Interceptor,
}

fn harness(store: RuleStore) -> Harness {
    let rules = Arc::new(store);
    let stripper = Arc::new(RecordingStripper::new());
    let engine = PolicyEngine::new(rules.clone(), Arc::new(SuffixList::fallback()), stripper.clone());
    let ledger = Arc::new(SettingsLedger::new(rules.clone(), None));
    Harness {
        rules,
        stripper,
        hook: Interceptor::new(engine, ledger),
    }
}

fn on_site(tab: i32) -> FrameContext<'static> {
    FrameContext::new(tab, "https://site.com/", RequestType::SCRIPT)
}

#[test]
fn heuristic_block_is_recorded_for_the_top_context() {
    let store = RuleStore::new();
    store.block_base_domain("tracker.com");
    let h = harness(store);

    let eval = h.hook.engine().evaluate("https://cdn.tracker.com/x.js", &on_site(1));
    assert_eq!(eval.verdict, Verdict::Block);
    assert_eq!(eval.tag(), Some(ActionTag::Block));

    // Requests from a subframe land in the tab's table
    let frame = on_site(1).with_frame(12);
    assert_eq!(h.hook.classify("https://cdn.tracker.com/x.js", &frame), Disposition::Deny);
    assert_eq!(
        h.hook.ledger().read(TabId(1)).get("cdn.tracker.com"),
        Some(ActionTag::Block)
    );
}

#[test]
fn user_green_beats_heuristic_block() {
    let store = RuleStore::new();
    store.block_base_domain("tracker.com");
    store.apply_user_edits(&[UserEdit::new("cdn.tracker.com", UserAction::Noaction).unwrap()]);
    let h = harness(store);

    let eval = h.hook.engine().evaluate("https://cdn.tracker.com/x.js", &on_site(1));
    assert_eq!(eval.verdict, Verdict::Allow);
    assert_eq!(eval.tag(), Some(ActionTag::UserNoAction));
}

#[test]
fn first_party_request_emits_nothing() {
    let h = harness(RuleStore::new());
    assert_eq!(h.hook.classify("https://site.com/app.js", &on_site(1)), Disposition::Permit);
    assert_eq!(h.hook.ledger().read(TabId(1)), LedgerView::Entries(Default::default()));
}

#[test]
fn user_red_blocks_regardless_of_other_lists() {
    let store = RuleStore::new().with_preloads(["embed.video.net"]);
    store.apply_user_edits(&[
        UserEdit::new("embed.video.net", UserAction::Noaction).unwrap(),
        UserEdit::new("embed.video.net", UserAction::Block).unwrap(),
    ]);
    let h = harness(store);

    for tab in 0..3 {
        let eval = h.hook.engine().evaluate("https://embed.video.net/player", &on_site(tab));
        assert_eq!(eval.verdict, Verdict::Block);
        assert_eq!(eval.tag(), Some(ActionTag::UserBlock));
    }
}

#[test]
fn preload_exemption_degrades_to_cookieblock() {
    let store = RuleStore::new().with_preloads(["maps.provider.com"]);
    store.block_base_domain("provider.com");
    let h = harness(store);

    let verdict = h.hook.verdict("https://maps.provider.com/api.js", &on_site(2));
    assert_eq!(verdict, Verdict::Cookieblock);
    assert!(h.stripper.was_clobbered("maps.provider.com"));
    assert_eq!(
        h.hook.ledger().read(TabId(2)).get("maps.provider.com"),
        Some(ActionTag::Cookieblock)
    );
}

#[test]
fn stage_and_commit_changes_later_decisions() {
    let store = RuleStore::new();
    store.block_base_domain("tracker.com");
    let h = harness(store);
    let ledger = h.hook.ledger();

    assert_eq!(h.hook.classify("https://cdn.tracker.com/x.js", &on_site(5)), Disposition::Deny);

    ledger.stage_edit("cdn.tracker.com", "cookieblock");
    // Staged only: still blocked
    assert_eq!(h.hook.classify("https://cdn.tracker.com/x.js", &on_site(5)), Disposition::Deny);

    let report = ledger.commit();
    assert_eq!(report.applied.len(), 1);
    assert!(ledger.read(TabId(5)).is_cleared());

    assert_eq!(
        h.hook.classify("https://cdn.tracker.com/x.js", &on_site(5)),
        Disposition::PermitWithoutCredentials
    );
    assert_eq!(
        ledger.read(TabId(5)).get("cdn.tracker.com"),
        Some(ActionTag::UserCookieblock)
    );

    ledger.stage_edit("cdn.tracker.com", "reset");
    ledger.commit();
    let user = h.rules.user_lists();
    assert!(!user.red.contains("cdn.tracker.com"));
    assert!(!user.yellow.contains("cdn.tracker.com"));
    assert!(!user.green.contains("cdn.tracker.com"));
}

#[test]
fn detector_writes_interleave_with_evaluation() {
    let h = harness(RuleStore::new());
    let rules = h.rules.clone();

    let writer = thread::spawn(move || {
        for i in 0..500 {
            rules.block_base_domain(&format!("tracker{}.com", i));
            if i % 3 == 0 {
                rules.unblock_base_domain(&format!("tracker{}.com", i));
            }
        }
    });

    let readers: Vec<_> = (0..4)
        .map(|tab| {
            let hook = h.hook.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let url = format!("https://cdn.tracker{}.com/x.js", i);
                    let _ = hook.classify(&url, &on_site(tab));
                    let _ = hook.ledger().read(TabId(tab));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(h.rules.counts().blocked_origins, 500 - 167);
    assert!(h.rules.is_blocked_base("tracker1.com"));
    assert!(!h.rules.is_blocked_base("tracker0.com"));
}

#[test]
fn evaluation_sees_a_commit_entirely_or_not_at_all() {
    let store = RuleStore::new();
    store.block_base_domain("tracker.com");
    let h = harness(store);
    let ledger = h.hook.ledger().clone();
    ledger.commit_edits([("cdn.tracker.com", "block")]);

    let done = Arc::new(AtomicBool::new(false));
    let committer = {
        let done = done.clone();
        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                ledger.commit_edits([("cdn.tracker.com", "noaction")]);
                ledger.commit_edits([("cdn.tracker.com", "block")]);
            }
        })
    };

    for _ in 0..200_000 {
        let eval = h.hook.engine().evaluate("https://cdn.tracker.com/x.js", &on_site(1));
        let seen = (eval.verdict, eval.tag());
        assert!(
            seen == (Verdict::Block, Some(ActionTag::UserBlock))
                || seen == (Verdict::Allow, Some(ActionTag::UserNoAction)),
            "mixed evaluation {:?}",
            eval
        );
    }

    done.store(true, Ordering::Relaxed);
    committer.join().unwrap();
}
