//! Integration tests for the complete metarev flow
//!
//! These tests drive the engine the way a host does, through its events:
//! - save → revision / autosave capture
//! - preview render → autosave redirection
//! - restore → live record rollback
//! - compare → meta diff section
//!
//! Run with: cargo test --test integration_tests

use metarev::{
    FieldSet, IdentitySanitizer, MetaReader, Revisions, RevisionsConfig, SaveContext,
    TrackedField, AGGREGATE_KEY, AGGREGATE_LABEL,
};
use metarev_store::{AttributeStore, MemoryHost, StoreConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;

const CONFIG: &str = r#"{
    "record_types": {
        "post": {
            "subtitle": "Subtitle",
            "byline": { "label": "Byline", "source_path": ["meta", "byline"] }
        },
        "product": {
            "price": { "label": "Price" }
        }
    }
}"#;

fn setup() -> (Arc<MemoryHost>, Revisions<MemoryHost>) {
    let host = Arc::new(MemoryHost::new());
    let config = RevisionsConfig::from_json_str(CONFIG).unwrap();
    let revisions = Revisions::from_config(Arc::clone(&host), &config).unwrap();
    (host, revisions)
}

/// Save `incoming` on `record` and capture it on a fresh revision, like a host save does.
fn save(host: &MemoryHost, revisions: &Revisions<MemoryHost>, record: u64, incoming: &Value) -> u64 {
    revisions
        .record_saved(record, incoming, SaveContext::default())
        .unwrap();
    let rev = host.create_revision(record).unwrap();
    revisions.snapshot_created(rev, incoming).unwrap();
    rev
}

// ============================================================================
// Write path
// ============================================================================

#[test]
fn test_snapshot_of_incoming_and_fallback_values() {
    let host = Arc::new(MemoryHost::new());
    let fields = FieldSet::new(vec![
        TrackedField::new("subtitle").with_label("Subtitle"),
        TrackedField::new("byline").with_label("Byline"),
    ])
    .unwrap();
    let mut revisions = Revisions::new(Arc::clone(&host)).with_sanitizer(Arc::new(IdentitySanitizer));
    revisions.register("post", fields).unwrap();

    let post = host.create_record("post");
    host.set(post, "subtitle", json!("Old")).unwrap();
    host.set(post, "byline", json!("Jane")).unwrap();

    let rev = host.create_revision(post).unwrap();
    revisions
        .snapshot_created(rev, &json!({"subtitle": "New"}))
        .unwrap();

    assert_eq!(host.get_single(rev, "subtitle").unwrap(), Some(json!("New")));
    assert_eq!(host.get_single(rev, "byline").unwrap(), Some(json!("Jane")));

    let aggregate = host.get_single(rev, AGGREGATE_KEY).unwrap().unwrap();
    let parsed: Value = serde_json::from_str(aggregate.as_str().unwrap()).unwrap();
    assert_eq!(parsed, json!({"subtitle": "New", "byline": "Jane"}));
}

#[test]
fn test_live_save_keeps_aggregate_current() {
    let (host, revisions) = setup();
    let post = host.create_record("post");

    revisions
        .record_saved(post, &json!({"subtitle": "First"}), SaveContext::default())
        .unwrap();
    revisions
        .record_saved(
            post,
            &json!({"meta": {"byline": "Jane"}}),
            SaveContext::default(),
        )
        .unwrap();

    let aggregate = host.get_single(post, AGGREGATE_KEY).unwrap().unwrap();
    let parsed: Value = serde_json::from_str(aggregate.as_str().unwrap()).unwrap();
    assert_eq!(parsed, json!({"subtitle": "First", "byline": "Jane"}));
}

#[test]
fn test_incoming_markup_is_sanitized() {
    let (host, revisions) = setup();
    let post = host.create_record("post");

    let rev = save(
        &host,
        &revisions,
        post,
        &json!({"subtitle": "<em>Hi</em><script>alert(1)</script><img src=x onerror=\"steal()\">"}),
    );
    let stored = host.get_single(rev, "subtitle").unwrap().unwrap();
    let stored = stored.as_str().unwrap();
    assert!(stored.starts_with("<em>Hi</em>"));
    assert!(!stored.contains("script"));
    assert!(!stored.contains("onerror"));
}

// ============================================================================
// Preview
// ============================================================================

#[test]
fn test_preview_reads_autosave_only_while_rendering() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    save(&host, &revisions, post, &json!({"subtitle": "Published"}));

    let draft = json!({"subtitle": "Draft"});
    revisions
        .record_saved(post, &draft, SaveContext::autosave())
        .unwrap();
    let auto = host.create_autosave(post).unwrap();
    revisions.snapshot_created(auto, &draft).unwrap();

    // the autosave cycle did not touch the live record
    assert_eq!(host.get_single(post, "subtitle").unwrap(), Some(json!("Published")));

    let (preview_subtitle, preview_byline) = revisions
        .render_preview(post, |meta| {
            (
                meta.get_meta_single(post, "subtitle").unwrap(),
                meta.get_meta(post, "byline").unwrap(),
            )
        })
        .unwrap();
    assert_eq!(preview_subtitle, Some(json!("Draft")));
    assert!(preview_byline.is_empty());

    let outside = MetaReader::plain(host.as_ref());
    assert_eq!(
        outside.get_meta_single(post, "subtitle").unwrap(),
        Some(json!("Published"))
    );
}

#[test]
fn test_preview_of_other_type_is_plain() {
    let (host, revisions) = setup();
    let page = host.create_record("page");
    host.set(page, "subtitle", json!("Live")).unwrap();
    let auto = host.create_autosave(page).unwrap();
    host.set(auto, "subtitle", json!("Draft")).unwrap();

    let seen = revisions
        .render_preview(page, |meta| {
            assert!(!meta.has_overrides());
            meta.get_meta_single(page, "subtitle").unwrap()
        })
        .unwrap();
    assert_eq!(seen, Some(json!("Live")));
}

// ============================================================================
// Restore
// ============================================================================

#[test]
fn test_restore_round_trip_through_history() {
    let (host, revisions) = setup();
    let post = host.create_record("post");

    let first = save(&host, &revisions, post, &json!({"subtitle": "One"}));
    save(
        &host,
        &revisions,
        post,
        &json!({"subtitle": "Two", "meta": {"byline": "Jane"}}),
    );
    assert_eq!(host.get_single(post, "byline").unwrap(), Some(json!("Jane")));

    let report = revisions.snapshot_restored(post, first).unwrap().unwrap();
    assert_eq!(report.restored, vec!["subtitle".to_string(), AGGREGATE_KEY.to_string()]);
    assert_eq!(report.deleted, vec!["byline".to_string()]);

    assert_eq!(host.get_single(post, "subtitle").unwrap(), Some(json!("One")));
    assert_eq!(host.get_single(post, "byline").unwrap(), None);
    assert_eq!(
        host.get_single(post, AGGREGATE_KEY).unwrap(),
        host.get_single(first, AGGREGATE_KEY).unwrap()
    );
}

#[test]
fn test_restore_deletes_unrecorded_key() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    let rev = host.create_revision(post).unwrap();
    host.set(post, "byline", json!("Jane")).unwrap();

    revisions.snapshot_restored(post, rev).unwrap();
    assert!(host.get_all(post, "byline").unwrap().is_empty());
}

#[test]
fn test_restore_twice_is_stable() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    let rev = save(&host, &revisions, post, &json!({"subtitle": "Kept"}));
    host.add(post, "subtitle", json!("extra")).unwrap();

    revisions.snapshot_restored(post, rev).unwrap();
    let once = host.attributes_of(post);
    revisions.snapshot_restored(post, rev).unwrap();
    assert_eq!(host.attributes_of(post), once);
}

// ============================================================================
// Compare
// ============================================================================

#[test]
fn test_compare_identical_snapshots_is_empty() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    let a = save(&host, &revisions, post, &json!({"subtitle": "Same"}));
    let b = save(&host, &revisions, post, &json!({"subtitle": "Same"}));

    let mut sections = Vec::new();
    revisions.compare_snapshots(Some(a), b, &mut sections).unwrap();
    assert!(sections.is_empty());
}

#[test]
fn test_compare_reports_changed_fields() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    let a = save(&host, &revisions, post, &json!({"subtitle": "Before"}));
    let b = save(
        &host,
        &revisions,
        post,
        &json!({"subtitle": "After", "meta": {"byline": "Jane"}}),
    );

    let mut sections = Vec::new();
    revisions.compare_snapshots(Some(a), b, &mut sections).unwrap();
    assert_eq!(sections.len(), 1);

    let section = &sections[0];
    assert_eq!(section.name, AGGREGATE_LABEL);
    let labels: Vec<_> = section.fields.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["Subtitle", "Byline"]);
    assert!(section.fields[0].rendered.contains("diff-deletedline\">Before"));
    assert!(section.fields[0].rendered.contains("diff-addedline\">After"));
    assert_eq!(section.fields[1].from, "");
}

#[test]
fn test_compare_first_revision_against_nothing() {
    let (host, revisions) = setup();
    let post = host.create_record("post");
    let first = save(&host, &revisions, post, &json!({"subtitle": "Hello"}));

    let mut sections = Vec::new();
    revisions.compare_snapshots(None, first, &mut sections).unwrap();
    assert_eq!(sections[0].fields.len(), 1);
    assert_eq!(sections[0].fields[0].to, "Hello");
}

// ============================================================================
// Shared hooks
// ============================================================================

#[test]
fn test_revision_field_registration_is_shared() {
    let (host, revisions) = setup();
    let mut fields = Vec::new();
    revisions.revision_fields(&mut fields);
    revisions.revision_fields(&mut fields);
    assert_eq!(fields, vec![(AGGREGATE_KEY.to_string(), AGGREGATE_LABEL.to_string())]);

    let product = host.create_record("product");
    let rev = save(&host, &revisions, product, &json!({"price": 12}));
    assert_eq!(
        revisions.revision_field_value(rev).unwrap().as_deref(),
        Some("{\n  \"price\": 12\n}")
    );
    assert!(!revisions.check_for_changes("product", true));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("state.json"));
    let rev;
    let post;
    {
        let host = Arc::new(MemoryHost::open(&config).unwrap());
        let revisions = Revisions::from_config(
            Arc::clone(&host),
            &RevisionsConfig::from_json_str(CONFIG).unwrap(),
        )
        .unwrap();
        post = host.create_record("post");
        rev = save(&host, &revisions, post, &json!({"subtitle": "Stored"}));
        host.save().unwrap();
    }

    let host = Arc::new(MemoryHost::open(&config).unwrap());
    let revisions = Revisions::from_config(
        Arc::clone(&host),
        &RevisionsConfig::from_json_str(CONFIG).unwrap(),
    )
    .unwrap();
    host.set(post, "subtitle", json!("Changed")).unwrap();
    revisions.snapshot_restored(post, rev).unwrap();
    assert_eq!(host.get_single(post, "subtitle").unwrap(), Some(json!("Stored")));
}
