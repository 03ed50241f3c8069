// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::{RefreshSettings, TokenRecord, ZoneRefresher};
use crate::auth::TokenFetcher;
use crate::error::RefreshError;
use crate::test_support::{write_accounts, EchoFetcher, MapFetcher, MemoryStore, RecordingNotifier};
use crate::zone::ZoneSet;

const BR_TOKENS: &str = "tokens/token_br.json";

struct Harness {
    engine: ZoneRefresher,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(dir: &Path, fetcher: Arc<dyn TokenFetcher>, settings: RefreshSettings) -> Harness {
    let zones = ZoneSet::new(&["br".into(), "ind".into(), "bd".into()], dir, "tokens");
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = ZoneRefresher::new(
        zones,
        Arc::clone(&store) as _,
        fetcher,
        Arc::clone(&notifier) as _,
        settings,
    );
    Harness { engine, store, notifier }
}

fn published(store: &MemoryStore, path: &str) -> anyhow::Result<Vec<TokenRecord>> {
    let body = store.content(path).ok_or_else(|| anyhow::anyhow!("{path} not written"))?;
    Ok(serde_json::from_str(&body)?)
}

#[tokio::test]
async fn unknown_zone_is_rejected_without_side_effects() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let fetcher = Arc::new(EchoFetcher::default());
    let h = harness(dir.path(), Arc::clone(&fetcher) as _, RefreshSettings::default());

    let result = h.engine.refresh("us").await;

    assert_eq!(result, Err(RefreshError::UnknownZone("us".to_owned())));
    assert_eq!(h.store.call_count(), 0);
    assert_eq!(fetcher.call_count(), 0);
    assert_eq!(h.notifier.messages(), vec!["❌ Unknown zone: us".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn zone_id_is_case_insensitive() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    assert_eq!(h.engine.refresh("BR").await, Ok(1));
    assert!(h.store.content(BR_TOKENS).is_some());
    Ok(())
}

#[tokio::test]
async fn padded_zone_id_is_unknown() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    let result = h.engine.refresh(" br ").await;

    assert_eq!(result, Err(RefreshError::UnknownZone(" br ".to_owned())));
    assert_eq!(h.store.call_count(), 0);
    assert_eq!(h.notifier.messages(), vec!["❌ Unknown zone:  br ".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn non_object_account_entries_are_skipped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }, "junk", 7]))?;
    let fetcher = Arc::new(EchoFetcher::default());
    let h = harness(dir.path(), Arc::clone(&fetcher) as _, RefreshSettings::default());

    assert_eq!(h.engine.refresh("br").await, Ok(1));
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(published(&h.store, BR_TOKENS)?, vec![TokenRecord { token: "tok-1".into() }]);
    assert_eq!(h.notifier.count_containing("1 tokens OK, 0 failed"), 1);
    assert_eq!(h.notifier.count_containing("Account list unavailable"), 0);
    Ok(())
}

#[tokio::test]
async fn missing_account_list_aborts_before_touching_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    let result = h.engine.refresh("ind").await;

    assert!(matches!(result, Err(RefreshError::AccountsUnavailable(_))));
    assert_eq!(h.store.call_count(), 0);
    assert_eq!(h.notifier.count_containing("Account list unavailable for `ind`"), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_account_list_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("config_bd.json"), "{ not json")?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    let result = h.engine.refresh("bd").await;

    assert!(matches!(result, Err(RefreshError::AccountsUnavailable(_))));
    assert!(h.store.content("tokens/token_bd.json").is_none());
    Ok(())
}

#[tokio::test]
async fn end_to_end_two_valid_one_missing_password() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(
        dir.path(),
        "br",
        &json!([
            { "uid": "111", "password": "a" },
            { "uid": "222" },
            { "uid": "333", "password": "c" },
        ]),
    )?;
    let fetcher = Arc::new(MapFetcher::new([("111", "t1"), ("333", "t3")]));
    let h = harness(dir.path(), Arc::clone(&fetcher) as _, RefreshSettings::default());

    let result = h.engine.refresh("br").await;

    assert_eq!(result, Ok(2));
    assert_eq!(fetcher.calls(), vec!["111", "333"]);
    assert_eq!(
        published(&h.store, BR_TOKENS)?,
        vec![TokenRecord { token: "t1".into() }, TokenRecord { token: "t3".into() }]
    );
    assert_eq!(h.notifier.count_containing("2 tokens OK, 0 failed"), 1);
    assert_eq!(h.notifier.count_containing("updated with 2 tokens"), 1);
    assert!(h.engine.published().last_published("br").await.is_some());
    Ok(())
}

#[tokio::test]
async fn failed_fetches_are_counted_not_published() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(
        dir.path(),
        "br",
        &json!([
            { "uid": "ok", "password": "a" },
            { "uid": "bad", "password": "b" },
            { "uid": "ok2", "password": "c" },
        ]),
    )?;
    let fetcher = Arc::new(MapFetcher::new([("ok", "t1"), ("ok2", "t2")]));
    let h = harness(dir.path(), fetcher, RefreshSettings::default());

    assert_eq!(h.engine.refresh("br").await, Ok(2));
    assert_eq!(published(&h.store, BR_TOKENS)?.len(), 2);
    assert_eq!(h.notifier.count_containing("2 tokens OK, 1 failed"), 1);
    Ok(())
}

#[tokio::test]
async fn account_list_is_capped_before_fetching() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let accounts: Vec<_> =
        (0..50).map(|i| json!({ "uid": format!("u{i}"), "password": "p" })).collect();
    write_accounts(dir.path(), "br", &json!(accounts))?;
    let fetcher = Arc::new(EchoFetcher::default());
    let settings = RefreshSettings { max_tokens: 30, fetch_concurrency: 4 };
    let h = harness(dir.path(), Arc::clone(&fetcher) as _, settings);

    assert_eq!(h.engine.refresh("br").await, Ok(30));
    assert_eq!(fetcher.call_count(), 30);

    let batch = published(&h.store, BR_TOKENS)?;
    let expected: Vec<String> = (0..30).map(|i| format!("tok-u{i}")).collect();
    let got: Vec<String> = batch.into_iter().map(|r| r.token).collect();
    assert_eq!(got, expected, "batch keeps account order");
    Ok(())
}

#[tokio::test]
async fn progress_is_reported_every_twenty_processed_accounts() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut accounts: Vec<_> =
        (0..45).map(|i| json!({ "uid": format!("u{i}"), "password": "p" })).collect();
    // Skipped records do not advance the progress counter.
    accounts.insert(0, json!({ "uid": "no-password" }));
    write_accounts(dir.path(), "br", &json!(accounts))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    assert_eq!(h.engine.refresh("br").await, Ok(45));

    let progress: Vec<String> =
        h.notifier.messages().into_iter().filter(|m| m.contains("processed of")).collect();
    assert_eq!(
        progress,
        vec![
            "🔄 `br`: 20 tokens processed of 46.".to_owned(),
            "🔄 `br`: 40 tokens processed of 46.".to_owned(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn existing_file_is_replaced_using_its_revision() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());
    h.store.put(BR_TOKENS, r#"[{"token": "old-1"}, {"token": "old-2"}]"#, Utc::now());

    assert_eq!(h.engine.refresh("br").await, Ok(1));
    assert_eq!(published(&h.store, BR_TOKENS)?, vec![TokenRecord { token: "tok-1".into() }]);
    Ok(())
}

#[tokio::test]
async fn published_file_is_indented_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());

    h.engine.refresh("br").await?;
    let expected = "[\n  {\n    \"token\": \"tok-1\"\n  }\n]";
    assert_eq!(h.store.content(BR_TOKENS).as_deref(), Some(expected));
    Ok(())
}

#[tokio::test]
async fn conflicting_write_reports_failure_and_keeps_remote_content() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());
    h.store.put(BR_TOKENS, "[]", Utc::now());
    h.store.touch_before_next_write();

    let result = h.engine.refresh("br").await;

    assert_eq!(result, Err(RefreshError::PublishFailed { path: BR_TOKENS.to_owned() }));
    assert_eq!(h.store.write_count(), 1, "no retry within the cycle");
    assert_eq!(h.store.content(BR_TOKENS).as_deref(), Some("[]\n"));
    assert_eq!(h.notifier.count_containing("⚠️ Failed to update `tokens/token_br.json`."), 1);
    assert!(h.engine.published().last_published("br").await.is_none());
    Ok(())
}

#[tokio::test]
async fn failed_write_is_not_retried() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "bd", &json!([{ "uid": "1", "password": "a" }]))?;
    let h = harness(dir.path(), Arc::new(EchoFetcher::default()), RefreshSettings::default());
    h.store.fail_writes();

    assert!(h.engine.refresh("bd").await.is_err());
    assert_eq!(h.store.write_count(), 1);
    assert!(h.store.content("tokens/token_bd.json").is_none());
    Ok(())
}

#[tokio::test]
async fn empty_batch_still_publishes_empty_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_accounts(dir.path(), "br", &json!([{ "uid": "1", "password": "a" }]))?;
    let fetcher = Arc::new(MapFetcher::new(Vec::<(String, String)>::new()));
    let h = harness(dir.path(), fetcher, RefreshSettings::default());

    assert_eq!(h.engine.refresh("br").await, Ok(0));
    assert_eq!(h.store.content(BR_TOKENS).as_deref(), Some("[]"));
    assert_eq!(h.notifier.count_containing("0 tokens OK, 1 failed"), 1);
    Ok(())
}

#[test]
fn default_settings_match_service_constants() {
    let settings = RefreshSettings::default();
    assert_eq!(settings.max_tokens, 110);
    assert_eq!(settings.fetch_concurrency, 8);
}
