//! WebAssembly bindings for HeuristicBlocker
//!
//! The extension's background page owns one engine instance. Cookie
//! clobbering is done by the host: origins the engine wants stripped are
//! queued and drained with `take_clobbered`.

use std::sync::{Arc, OnceLock};

use hb_core::{
    ClobberQueue, CommitReport, Interceptor, LedgerView, PolicyEngine, RequestType, RuleSnapshot,
    RuleStore, SettingsLedger, SuffixList, SuffixResolver, TabId,
};
use hb_core::types::FrameContext;
use wasm_bindgen::prelude::*;

struct EngineState {
    rules: Arc<RuleStore>,
    suffixes: Arc<SuffixList>,
    stripper: Arc<ClobberQueue>,
    hook: Interceptor,
}

static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn ledger_view_to_js(view: LedgerView) -> JsValue {
    let result = js_sys::Object::new();
    match view {
        LedgerView::Cleared => set(&result, "cleared", &JsValue::from(true)),
        LedgerView::Entries(entries) => {
            for (origin, tag) in entries {
                set(&result, &origin, &JsValue::from_str(tag.as_str()));
            }
        }
    }
    result.into()
}

fn commit_report_to_js(report: &CommitReport) -> JsValue {
    let applied = js_sys::Array::new();
    for edit in &report.applied {
        let entry = js_sys::Object::new();
        set(&entry, "origin", &JsValue::from_str(&edit.origin));
        set(&entry, "action", &JsValue::from_str(&edit.action.to_string()));
        applied.push(&entry);
    }
    let skipped = js_sys::Array::new();
    for edit in &report.skipped {
        let entry = js_sys::Object::new();
        set(&entry, "origin", &JsValue::from_str(&edit.origin));
        set(&entry, "action", &JsValue::from_str(&edit.action));
        set(&entry, "reason", &JsValue::from_str(&edit.reason.to_string()));
        skipped.push(&entry);
    }

    let result = js_sys::Object::new();
    set(&result, "applied", &applied);
    set(&result, "skipped", &skipped);
    set(&result, "reload", &JsValue::from(!report.applied.is_empty()));
    result.into()
}

#[wasm_bindgen]
pub fn init(rules_json: &str, psl_text: Option<String>) -> Result<(), JsValue> {
    if ENGINE_STATE.get().is_some() {
        return Err(JsValue::from_str("Already initialized. Reload the extension to reinitialize."));
    }

    let snapshot: RuleSnapshot = if rules_json.trim().is_empty() {
        RuleSnapshot::default()
    } else {
        serde_json::from_str(rules_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid rule store: {}", e)))?
    };

    let suffixes = match psl_text {
        Some(text) => SuffixList::from_psl_text(&text)
            .map_err(|e| JsValue::from_str(&format!("Failed to load PSL: {}", e)))?,
        None => SuffixList::fallback(),
    };

    let rules = Arc::new(RuleStore::from_snapshot(snapshot));
    let suffixes = Arc::new(suffixes);
    let stripper = Arc::new(ClobberQueue::new());
    let engine = PolicyEngine::new(rules.clone(), suffixes.clone(), stripper.clone());
    // Persistence stays on the JS side: it calls `export_rules` after `commit`.
    let ledger = Arc::new(SettingsLedger::new(rules.clone(), None));

    ENGINE_STATE
        .set(EngineState {
            rules,
            suffixes,
            stripper,
            hook: Interceptor::new(engine, ledger),
        })
        .map_err(|_| JsValue::from_str("Failed to set engine state"))?;

    web_sys::console::log_1(&"HeuristicBlocker engine initialized".into());
    Ok(())
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE_STATE.get().is_some()
}

/// Returns 0 (permit), 1 (deny) or 2 (permit without credentials).
/// Permits everything until `init` has run.
#[wasm_bindgen]
pub fn classify(
    url: &str,
    request_type: &str,
    top_url: Option<String>,
    tab_id: i32,
    frame_id: i32,
) -> u8 {
    let Some(state) = ENGINE_STATE.get() else {
        return 0;
    };

    let ctx = FrameContext {
        tab_id: TabId(tab_id),
        frame_id,
        top_document_url: top_url.as_deref(),
        request_type: RequestType::parse(request_type),
    };
    state.hook.classify(url, &ctx) as u8
}

/// Origins whose cookies should be removed since the last call.
#[wasm_bindgen]
pub fn take_clobbered() -> js_sys::Array {
    let origins = js_sys::Array::new();
    if let Some(state) = ENGINE_STATE.get() {
        for origin in state.stripper.take() {
            origins.push(&JsValue::from_str(&origin));
        }
    }
    origins
}

/// `{cleared: true}` after a navigation, otherwise `{origin: tag, ...}`.
#[wasm_bindgen]
pub fn read_ledger(tab_id: i32) -> JsValue {
    match ENGINE_STATE.get() {
        Some(state) => ledger_view_to_js(state.hook.ledger().read(TabId(tab_id))),
        None => js_sys::Object::new().into(),
    }
}

#[wasm_bindgen]
pub fn ledger_summary(tab_id: i32) -> JsValue {
    let result = js_sys::Object::new();
    if let Some(state) = ENGINE_STATE.get() {
        let summary = state.hook.ledger().summary(TabId(tab_id));
        set(&result, "blocked", &JsValue::from(summary.blocked as u32));
        set(&result, "cookieblocked", &JsValue::from(summary.cookieblocked as u32));
        set(&result, "allowed", &JsValue::from(summary.allowed as u32));
    }
    result.into()
}

#[wasm_bindgen]
pub fn stage_edit(origin: &str, action: &str) {
    if let Some(state) = ENGINE_STATE.get() {
        state.hook.ledger().stage_edit(origin, action);
    }
}

/// `{applied, skipped, reload}`. `reload` is set when any edit was applied.
#[wasm_bindgen]
pub fn commit() -> JsValue {
    match ENGINE_STATE.get() {
        Some(state) => commit_report_to_js(&state.hook.ledger().commit()),
        None => js_sys::Object::new().into(),
    }
}

#[wasm_bindgen]
pub fn on_navigate(tab_id: i32, same_document: bool) {
    if let Some(state) = ENGINE_STATE.get() {
        state.hook.on_navigate(TabId(tab_id), same_document);
    }
}

#[wasm_bindgen]
pub fn on_tab_removed(tab_id: i32) {
    if let Some(state) = ENGINE_STATE.get() {
        state.hook.on_context_destroyed(TabId(tab_id));
    }
}

#[wasm_bindgen]
pub fn clear_all() {
    if let Some(state) = ENGINE_STATE.get() {
        state.hook.ledger().clear_all();
    }
}

/// Entry point for the tracker detector.
#[wasm_bindgen]
pub fn block_base_domain(base_domain: &str) -> bool {
    ENGINE_STATE
        .get()
        .is_some_and(|state| state.rules.block_base_domain(base_domain))
}

#[wasm_bindgen]
pub fn set_site_disabled(origin: &str, disabled: bool) -> bool {
    let Some(state) = ENGINE_STATE.get() else {
        return false;
    };
    if disabled {
        state.rules.disable_site(origin)
    } else {
        state.rules.enable_site(origin)
    }
}

/// Current rule store as JSON, for the host to persist.
#[wasm_bindgen]
pub fn export_rules() -> Result<String, JsValue> {
    let state = ENGINE_STATE
        .get()
        .ok_or_else(|| JsValue::from_str("Not initialized"))?;
    serde_json::to_string(&state.rules.snapshot())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize rules: {}", e)))
}

#[wasm_bindgen]
pub fn base_domain(host: &str) -> Option<String> {
    match ENGINE_STATE.get() {
        Some(state) => state.suffixes.base_domain(host),
        None => SuffixList::fallback().base_domain(host),
    }
}

#[wasm_bindgen]
pub fn is_third_party(request_url: &str, top_url: &str) -> bool {
    match ENGINE_STATE.get() {
        Some(state) => state.hook.engine().party().is_third_party(request_url, top_url),
        None => false,
    }
}

#[wasm_bindgen]
pub fn is_whitelisted_scheme(scheme_or_url: &str) -> bool {
    hb_core::is_whitelisted_scheme(scheme_or_url)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    const RULES: &str = r#"{"blockedOrigins":["tracker.com","provider.com"],"preloads":["maps.provider.com"]}"#;
    const TOP: &str = "https://site.com/";

    // The engine is process-global, so every test shares one instance.
    fn setup() {
        if !is_initialized() {
            init(RULES, None).unwrap();
        }
    }

    fn get(target: &JsValue, key: &str) -> JsValue {
        js_sys::Reflect::get(target, &key.into()).unwrap()
    }

    fn classify_script(url: &str, tab_id: i32) -> u8 {
        classify(url, "script", Some(TOP.to_string()), tab_id, 0)
    }

    #[wasm_bindgen_test]
    fn test_read_ledger_reports_cleared_after_navigation() {
        setup();
        assert_eq!(classify_script("https://cdn.tracker.com/x.js", 41), 1);

        let view = read_ledger(41);
        assert_eq!(get(&view, "cdn.tracker.com").as_string().as_deref(), Some("block"));
        assert!(get(&view, "cleared").is_undefined());

        on_navigate(41, false);
        let view = read_ledger(41);
        assert_eq!(get(&view, "cleared").as_bool(), Some(true));
        assert!(get(&view, "cdn.tracker.com").is_undefined());
    }

    #[wasm_bindgen_test]
    fn test_commit_sets_reload_only_when_applied() {
        setup();
        stage_edit("ads.example.org", "block");
        let report = commit();
        assert_eq!(get(&report, "reload").as_bool(), Some(true));
        assert_eq!(js_sys::Array::from(&get(&report, "applied")).length(), 1);

        stage_edit("ads.example.org", "explode");
        let report = commit();
        assert_eq!(get(&report, "reload").as_bool(), Some(false));
        assert_eq!(js_sys::Array::from(&get(&report, "skipped")).length(), 1);

        stage_edit("ads.example.org", "reset");
        commit();
    }

    #[wasm_bindgen_test]
    fn test_empty_commit_report_does_not_reload() {
        let report = commit_report_to_js(&CommitReport::default());
        assert_eq!(get(&report, "reload").as_bool(), Some(false));
        assert_eq!(js_sys::Array::from(&get(&report, "applied")).length(), 0);
    }

    #[wasm_bindgen_test]
    fn test_cleared_view_conversion() {
        let view = ledger_view_to_js(LedgerView::Cleared);
        assert_eq!(get(&view, "cleared").as_bool(), Some(true));
    }

    #[wasm_bindgen_test]
    fn test_repeated_clobbers_queue_once() {
        setup();
        take_clobbered();
        for _ in 0..50 {
            assert_eq!(classify_script("https://maps.provider.com/tiles.js", 42), 2);
        }

        let origins = take_clobbered();
        assert_eq!(origins.length(), 1);
        assert_eq!(origins.get(0).as_string().as_deref(), Some("maps.provider.com"));
        assert_eq!(take_clobbered().length(), 0);
    }
}
