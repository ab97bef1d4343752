//! HeuristicBlocker CLI
//!
//! CLI tool for inspecting and editing rule stores, and for checking how a
//! request would be classified.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use hb_core::store::parse_origin_list;
use hb_core::{
    Interceptor, JsonFileStore, PersistentStore, PolicyEngine, RecordingStripper, RequestType,
    RuleStore, SettingsLedger, SuffixList, TabId,
};
use hb_core::types::FrameContext;

mod report;

use report::{ClassifyReport, InfoReport};

#[derive(Parser)]
#[command(name = "hb-cli")]
#[command(about = "HeuristicBlocker rule store tools")]
struct Cli {
    /// Rule store (JSON)
    #[arg(short, long, global = true, default_value = "rules.json")]
    store: PathBuf,

    /// Public suffix list file (public_suffix_list.dat)
    #[arg(long, global = true)]
    psl: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a request made from a top-level document
    Classify {
        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Top-level document URL
        #[arg(short, long)]
        top: String,

        /// Request type (script, image, sub_frame, ...)
        #[arg(long = "type", default_value = "other")]
        request_type: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Commit a user override for an origin
    Set {
        /// Origin (hostname)
        #[arg(short, long)]
        origin: String,

        /// block, cookieblock, noaction or reset
        #[arg(short, long)]
        action: String,
    },

    /// Mark a base domain as a detected tracker
    Block {
        /// Base domain
        base_domain: String,

        /// Remove instead of add
        #[arg(long)]
        remove: bool,
    },

    /// Disable or re-enable blocking on a site
    Site {
        /// Site hostname
        origin: String,

        /// Re-enable blocking
        #[arg(long)]
        enable: bool,
    },

    /// Merge a preload allowlist file into the store
    ImportPreloads {
        /// Origin list, one host per line
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Dump store info
    Info,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let result = match &cli.command {
        Commands::Classify {
            url,
            top,
            request_type,
            json,
        } => cmd_classify(&cli, url, top, request_type, *json),
        Commands::Set { origin, action } => cmd_set(&cli, origin, action),
        Commands::Block {
            base_domain,
            remove,
        } => cmd_block(&cli, base_domain, *remove),
        Commands::Site { origin, enable } => cmd_site(&cli, origin, *enable),
        Commands::ImportPreloads { input } => cmd_import_preloads(&cli, input),
        Commands::Info => cmd_info(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open_store(cli: &Cli) -> Result<(Arc<JsonFileStore>, Arc<RuleStore>), String> {
    let store = Arc::new(JsonFileStore::new(&cli.store));
    let snapshot = store.load().map_err(|e| e.to_string())?;
    Ok((store, Arc::new(RuleStore::from_snapshot(snapshot))))
}

fn load_suffixes(cli: &Cli) -> Result<SuffixList, String> {
    match &cli.psl {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            SuffixList::from_psl_text(&text).map_err(|e| e.to_string())
        }
        None => Ok(SuffixList::fallback()),
    }
}

fn save(store: &JsonFileStore, rules: &RuleStore) -> Result<(), String> {
    store.save(&rules.snapshot()).map_err(|e| e.to_string())
}

fn cmd_classify(cli: &Cli, url: &str, top: &str, request_type: &str, json: bool) -> Result<(), String> {
    let (_, rules) = open_store(cli)?;
    let suffixes = Arc::new(load_suffixes(cli)?);
    let stripper = Arc::new(RecordingStripper::new());
    let engine = PolicyEngine::new(rules.clone(), suffixes, stripper.clone());
    let hook = Interceptor::new(engine, Arc::new(SettingsLedger::new(rules, None)));

    let ctx = FrameContext::new(0, top, RequestType::parse(request_type));
    let verdict = hook.verdict(url, &ctx);
    let report = ClassifyReport::new(
        url,
        top,
        verdict,
        hook.engine().party().is_third_party(url, top),
        hook.engine().party().base_domain(url),
        hook.ledger().read(TabId(0)).entries(),
        stripper.calls(),
    );

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        report.print();
    }
    Ok(())
}

fn cmd_set(cli: &Cli, origin: &str, action: &str) -> Result<(), String> {
    let (store, rules) = open_store(cli)?;
    let ledger = SettingsLedger::new(rules, Some(store.clone()));

    ledger.stage_edit(origin, action);
    let report = ledger.commit();

    if let Some(skipped) = report.skipped.first() {
        return Err(skipped.reason.to_string());
    }
    if !report.persisted {
        return Err(format!("Failed to write '{}'", store.path().display()));
    }

    for edit in &report.applied {
        println!("{} -> {}", edit.origin, edit.action);
    }
    Ok(())
}

fn cmd_block(cli: &Cli, base_domain: &str, remove: bool) -> Result<(), String> {
    let (store, rules) = open_store(cli)?;
    let changed = if remove {
        rules.unblock_base_domain(base_domain)
    } else {
        rules.block_base_domain(base_domain)
    };
    save(&store, &rules)?;

    let verb = if remove { "Unblocked" } else { "Blocked" };
    if changed {
        println!("{} '{}'", verb, base_domain);
    } else {
        println!("'{}' unchanged", base_domain);
    }
    Ok(())
}

fn cmd_site(cli: &Cli, origin: &str, enable: bool) -> Result<(), String> {
    let (store, rules) = open_store(cli)?;
    if enable {
        rules.enable_site(origin);
        println!("Blocking enabled on '{}'", origin);
    } else {
        rules.disable_site(origin);
        println!("Blocking disabled on '{}'", origin);
    }
    save(&store, &rules)
}

fn cmd_import_preloads(cli: &Cli, input: &Path) -> Result<(), String> {
    let content = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
    let origins = parse_origin_list(&content);

    let store = JsonFileStore::new(&cli.store);
    let mut snapshot = store.load().map_err(|e| e.to_string())?;
    let before = snapshot.preloads.len();
    snapshot.preloads.extend(origins.iter().cloned());
    let added = snapshot.preloads.len() - before;
    store.save(&snapshot).map_err(|e| e.to_string())?;

    if cli.verbose {
        println!("  {} lines, {} origins", content.lines().count(), origins.len());
    }
    println!("Imported {} new preloads into '{}'", added, cli.store.display());
    Ok(())
}

fn cmd_info(cli: &Cli) -> Result<(), String> {
    let (_, rules) = open_store(cli)?;
    let suffixes = load_suffixes(cli)?;
    InfoReport::new(&cli.store, rules.counts(), suffixes.has_list()).print();
    Ok(())
}
