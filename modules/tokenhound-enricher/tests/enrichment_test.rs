use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tokenhound_common::{
    write_json_atomic, AnalysisRecord, EnricherConfig, MarketFields, ResultStore, Snapshot,
    SocialEntry, SocialFeed, SocialPost,
};
use tokenhound_enricher::testing::{market_row, memecoin_reply, not_memecoin_reply, ScriptedModel};
use tokenhound_enricher::{Classifier, EnrichmentLoop, EnrichmentOrchestrator};

fn config(dir: &tempfile::TempDir) -> EnricherConfig {
    EnricherConfig {
        social_feed_path: dir.path().join("tweets.json"),
        snapshot_path: dir.path().join("aptos_tokens.json"),
        store_path: dir.path().join("ai_analyzer.json"),
        inter_call_delay: Duration::ZERO,
        ..EnricherConfig::default()
    }
}

fn write_feed(config: &EnricherConfig, symbols: &[&str]) {
    let feed: SocialFeed = symbols
        .iter()
        .map(|s| {
            (
                s.to_string(),
                SocialEntry {
                    tweets: vec![
                        SocialPost {
                            text: format!("${s} is pumping"),
                        },
                        SocialPost {
                            text: format!("just aped into ${s}"),
                        },
                    ],
                },
            )
        })
        .collect();
    write_json_atomic(&config.social_feed_path, &feed).unwrap();
}

fn stored(symbol: &str, overall: u16) -> AnalysisRecord {
    AnalysisRecord {
        symbol: symbol.to_string(),
        risk: 5,
        investment_potential: 5,
        overall,
        rationale: "scored earlier".to_string(),
        market: MarketFields::default(),
    }
}

fn set_mtime(path: &Path, at: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(at)
        .unwrap();
}

fn open(config: EnricherConfig, model: &Arc<ScriptedModel>) -> EnrichmentOrchestrator {
    EnrichmentOrchestrator::open(Classifier::new(model.clone(), 20), config).unwrap()
}

#[tokio::test]
async fn initial_pass_only_scores_unseen_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["DOGA", "PEPEM", "WIF"]);
    ResultStore::new(vec![stored("DOGA", 60)])
        .save(&config.store_path)
        .unwrap();

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("PEPEM", 7, 6, 55))
            .reply(memecoin_reply("WIF", 4, 8, 81)),
    );
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.stored, 2);
    let prompts = model.prompts();
    assert!(prompts[0].contains("Token symbol: PEPEM"));
    assert!(prompts[1].contains("Token symbol: WIF"));
    assert!(prompts.iter().all(|p| !p.contains("Token symbol: DOGA")));

    let reloaded = ResultStore::load(&config.store_path).unwrap();
    let symbols: Vec<&str> = reloaded.records().iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, ["DOGA", "PEPEM", "WIF"]);
    assert_eq!(reloaded.get("DOGA").unwrap().overall, 60);
}

#[tokio::test]
async fn rescoring_a_symbol_replaces_its_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["DOGA"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("DOGA", 5, 5, 50))
            .reply(memecoin_reply("DOGA", 3, 9, 88)),
    );
    let mut orchestrator = open(config.clone(), &model);

    orchestrator.full_pass().await.unwrap();
    orchestrator.full_pass().await.unwrap();

    let reloaded = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(reloaded.len(), 1);
    let record = reloaded.get("DOGA").unwrap();
    assert_eq!(record.overall, 88);
    assert_eq!(record.investment_potential, 9);
}

#[tokio::test]
async fn non_memecoins_are_never_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["USDA"]);

    let model = Arc::new(ScriptedModel::new().reply(not_memecoin_reply("USDA")));
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(orchestrator.store().is_empty());
    assert!(!config.store_path.exists());
}

#[tokio::test]
async fn quota_exhaustion_halts_the_queue_and_leaves_the_store_alone() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["AAA", "BBB", "CCC"]);
    ResultStore::new(vec![stored("OLD", 42)])
        .save(&config.store_path)
        .unwrap();
    let before = std::fs::read(&config.store_path).unwrap();

    let model = Arc::new(
        ScriptedModel::new()
            .rate_limited()
            .reply(memecoin_reply("BBB", 5, 5, 50)),
    );
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert!(summary.quota_exhausted);
    assert_eq!(summary.attempted, 1);
    assert_eq!(model.prompts().len(), 1);
    assert_eq!(std::fs::read(&config.store_path).unwrap(), before);
}

#[tokio::test]
async fn quota_exhaustion_keeps_records_already_written() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["AAA", "BBB", "CCC"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("AAA", 5, 5, 50))
            .rate_limited(),
    );
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert!(summary.quota_exhausted);
    assert_eq!(model.prompts().len(), 2);
    let reloaded = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.get("AAA").is_some());
}

#[tokio::test]
async fn rejected_credentials_halt_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["AAA", "BBB", "CCC"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("AAA", 5, 5, 50))
            .unauthorized()
            .reply(memecoin_reply("CCC", 5, 5, 50)),
    );
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert!(summary.credentials_rejected);
    assert!(!summary.quota_exhausted);
    assert!(summary.halted());
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(model.prompts().len(), 2);
    let reloaded = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.get("CCC").is_none());
}

#[tokio::test]
async fn transport_errors_skip_the_symbol_and_continue() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["AAA", "BBB"]);

    let model = Arc::new(
        ScriptedModel::new()
            .unavailable()
            .reply(memecoin_reply("BBB", 6, 6, 66)),
    );
    let mut orchestrator = open(config.clone(), &model);

    let summary = orchestrator.initial_pass().await.unwrap();

    assert!(!summary.quota_exhausted);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.stored, 1);
    assert!(orchestrator.store().get("BBB").is_some());
}

#[tokio::test]
async fn undecodable_stored_record_does_not_block_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["DOGA", "BAD"]);
    let file = serde_json::json!({
        "best_token": {"symbol": "DOGA", "overall": 60, "rationale": "scored earlier"},
        "results": [
            serde_json::to_value(stored("DOGA", 60)).unwrap(),
            {"symbol": "BAD", "risk": "6", "investmentPotential": 5, "overall": 50, "rationale": "string risk"},
        ]
    });
    std::fs::write(&config.store_path, serde_json::to_vec(&file).unwrap()).unwrap();

    let model = Arc::new(ScriptedModel::new().reply(memecoin_reply("BAD", 6, 5, 50)));
    let mut orchestrator = open(config.clone(), &model);
    assert_eq!(orchestrator.store().len(), 1);

    // The dropped record is unseen again and gets re-scored.
    let summary = orchestrator.initial_pass().await.unwrap();
    assert_eq!(summary.stored, 1);
    let reloaded = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(reloaded.get("BAD").unwrap().risk, 6);
    assert_eq!(reloaded.get("DOGA").unwrap().overall, 60);
}

#[tokio::test]
async fn market_fields_rejoin_only_when_the_snapshot_changes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    ResultStore::new(vec![stored("DOGA", 60)])
        .save(&config.store_path)
        .unwrap();
    Snapshot::new(vec![market_row("DOGA", "$12K")], Utc::now())
        .save(&config.snapshot_path)
        .unwrap();
    let t0 = SystemTime::now() - Duration::from_secs(600);
    set_mtime(&config.snapshot_path, t0);

    let model = Arc::new(ScriptedModel::new());
    let mut orchestrator = open(config.clone(), &model);

    // Startup refresh joins the current snapshot and persists it.
    assert_eq!(orchestrator.store().get("DOGA").unwrap().market.volume, "$12K");
    let on_disk = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(on_disk.get("DOGA").unwrap().market.volume, "$12K");

    // New content, same mtime: nothing happens.
    Snapshot::new(vec![market_row("DOGA", "$99K")], Utc::now())
        .save(&config.snapshot_path)
        .unwrap();
    set_mtime(&config.snapshot_path, t0);
    assert!(!orchestrator.refresh_market_if_changed());
    assert_eq!(orchestrator.store().get("DOGA").unwrap().market.volume, "$12K");

    // Advanced mtime: re-joined and written, scores untouched, no inference.
    set_mtime(&config.snapshot_path, t0 + Duration::from_secs(60));
    assert!(orchestrator.refresh_market_if_changed());
    let record = orchestrator.store().get("DOGA").unwrap();
    assert_eq!(record.market.volume, "$99K");
    assert_eq!(record.overall, 60);
    let on_disk = ResultStore::load(&config.store_path).unwrap();
    assert_eq!(on_disk.get("DOGA").unwrap().market.volume, "$99K");
    assert!(model.prompts().is_empty());

    assert!(!orchestrator.refresh_market_if_changed());
}

#[tokio::test]
async fn market_row_reaches_prompt_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["PEPEM"]);
    Snapshot::new(vec![market_row("PEPEM", "$45K")], Utc::now())
        .save(&config.snapshot_path)
        .unwrap();

    let model = Arc::new(ScriptedModel::new().reply(memecoin_reply("PEPEM", 8, 7, 71)));
    let mut orchestrator = open(config.clone(), &model);

    orchestrator.initial_pass().await.unwrap();

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("Token info: "));
    assert!(prompt.contains("\"volume\":\"$45K\""));
    assert!(prompt.contains("$PEPEM is pumping | just aped into $PEPEM"));

    let record = orchestrator.store().get("PEPEM").unwrap();
    assert_eq!(record.market.volume, "$45K");
    assert_eq!(record.market.price, 0.0042);
    assert_eq!(record.market.change_24h, -7.5);
    assert_eq!(record.market.href, "https://dexscreener.com/aptos/pepem");
}

#[tokio::test]
async fn symbol_without_listing_gets_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["GHOST"]);

    let model = Arc::new(ScriptedModel::new().reply(memecoin_reply("GHOST", 9, 2, 12)));
    let mut orchestrator = open(config.clone(), &model);

    orchestrator.initial_pass().await.unwrap();

    assert!(!model.prompts()[0].contains("Token info:"));
    assert_eq!(
        orchestrator.store().get("GHOST").unwrap().market,
        MarketFields::default()
    );
}

#[tokio::test]
async fn best_token_is_the_highest_overall() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    write_feed(&config, &["AAA", "BBB", "CCC"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("AAA", 5, 5, 40))
            .reply(memecoin_reply("BBB", 3, 9, 91))
            .reply(memecoin_reply("CCC", 4, 7, 77)),
    );
    let mut orchestrator = open(config.clone(), &model);

    orchestrator.initial_pass().await.unwrap();

    let file: Value = serde_json::from_slice(&std::fs::read(&config.store_path).unwrap()).unwrap();
    assert_eq!(file["best_token"]["symbol"], "BBB");
    assert_eq!(file["best_token"]["overall"], 91);
    assert_eq!(file["results"].as_array().unwrap().len(), 3);
    assert_eq!(file["results"][1]["investmentPotential"], 9);
}

#[tokio::test]
async fn post_count_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let feed: SocialFeed = [(
        "SPAM".to_string(),
        SocialEntry {
            tweets: (0..30)
                .map(|i| SocialPost {
                    text: format!("post-{i:02}"),
                })
                .collect(),
        },
    )]
    .into_iter()
    .collect();
    write_json_atomic(&config.social_feed_path, &feed).unwrap();

    let model = Arc::new(ScriptedModel::new().reply(not_memecoin_reply("SPAM")));
    let mut orchestrator = open(config, &model);
    orchestrator.initial_pass().await.unwrap();

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("post-19"));
    assert!(!prompt.contains("post-20"));
}

#[tokio::test]
async fn daily_loop_runs_full_passes() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnricherConfig {
        full_pass_period: Duration::from_millis(40),
        ..config(&dir)
    };
    write_feed(&config, &["DOGA"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("DOGA", 5, 5, 50))
            .reply(memecoin_reply("DOGA", 5, 5, 61))
            .reply(memecoin_reply("DOGA", 5, 5, 62))
            .reply(memecoin_reply("DOGA", 5, 5, 63)),
    );
    let enrichment = EnrichmentLoop::new(open(config, &model));

    let summary = enrichment.run_initial().await.unwrap();
    assert_eq!(summary.stored, 1);

    assert!(enrichment.start_daily());
    assert!(enrichment.is_scheduled());
    tokio::time::sleep(Duration::from_millis(150)).await;
    enrichment.shutdown().await;

    assert!(model.prompts().len() >= 2);
    let overall = enrichment.orchestrator().lock().await.store().get("DOGA").unwrap().overall;
    assert!(overall > 50);
}

// --- Pacing on a paused clock ---

#[tokio::test(start_paused = true)]
async fn calls_are_spaced_by_the_inter_call_delay() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnricherConfig {
        inter_call_delay: Duration::from_secs(30),
        ..config(&dir)
    };
    write_feed(&config, &["AAA", "BBB", "CCC"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("AAA", 5, 5, 50))
            .reply(memecoin_reply("BBB", 5, 5, 50))
            .reply(memecoin_reply("CCC", 5, 5, 50)),
    );
    let mut orchestrator = open(config, &model);

    let started = Instant::now();
    let summary = orchestrator.initial_pass().await.unwrap();

    assert_eq!(summary.stored, 3);
    // Two gaps for three calls, no wait before the first.
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn halted_run_does_not_wait_for_deferred_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let config = EnricherConfig {
        inter_call_delay: Duration::from_secs(30),
        ..config(&dir)
    };
    write_feed(&config, &["AAA", "BBB", "CCC", "DDD"]);

    let model = Arc::new(
        ScriptedModel::new()
            .reply(memecoin_reply("AAA", 5, 5, 50))
            .rate_limited(),
    );
    let mut orchestrator = open(config, &model);

    let started = Instant::now();
    let summary = orchestrator.initial_pass().await.unwrap();

    assert!(summary.quota_exhausted);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}
