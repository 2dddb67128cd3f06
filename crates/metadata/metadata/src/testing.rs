use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use vanish_core::{Binding, ObjectId};

use crate::error::MetadataError;
use crate::store::MetadataStore;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed test date is valid")
}

fn binding(hex_suffix: &str, ttl_secs: u64) -> Binding {
    let raw = format!("{hex_suffix:0>32}");
    let id = ObjectId::parse(&raw).expect("conformance ids are valid");
    Binding::new(
        id,
        "report.pdf",
        "application/pdf",
        42,
        epoch(),
        Duration::from_secs(ttl_secs),
    )
}

/// Run the full metadata store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store.
///
/// # Errors
///
/// Returns an error if a store call fails unexpectedly. Assertion failures
/// panic.
pub async fn run_metadata_store_conformance_tests(
    store: &dyn MetadataStore,
) -> Result<(), MetadataError> {
    test_save_and_find(store).await?;
    test_find_missing(store).await?;
    test_duplicate_save_conflicts(store).await?;
    test_delete_is_idempotent(store).await?;
    test_expired_before_is_strict(store).await?;
    test_expired_paging(store).await?;
    Ok(())
}

async fn test_save_and_find(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let b = binding("a1", 60);
    store.save(&b).await?;
    let found = store.find_by_id(&b.id).await?;
    assert_eq!(found.as_ref(), Some(&b), "saved binding should round-trip");
    store.delete_by_id(&b.id).await?;
    Ok(())
}

async fn test_find_missing(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let b = binding("a2", 60);
    assert!(
        store.find_by_id(&b.id).await?.is_none(),
        "find on missing id should return None"
    );
    Ok(())
}

async fn test_duplicate_save_conflicts(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let b = binding("a3", 60);
    store.save(&b).await?;

    let mut other = binding("a3", 3600);
    other.original_name = "other.bin".to_owned();
    let result = store.save(&other).await;
    assert!(
        matches!(result, Err(MetadataError::Conflict(_))),
        "saving an existing id should conflict"
    );
    let found = store.find_by_id(&b.id).await?;
    assert_eq!(found.as_ref(), Some(&b), "original record should remain");
    store.delete_by_id(&b.id).await?;
    Ok(())
}

async fn test_delete_is_idempotent(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let b = binding("a4", 60);
    store.save(&b).await?;
    assert!(store.delete_by_id(&b.id).await?, "first delete removes");
    assert!(store.find_by_id(&b.id).await?.is_none());
    assert!(
        !store.delete_by_id(&b.id).await?,
        "second delete should succeed and report nothing removed"
    );
    Ok(())
}

async fn test_expired_before_is_strict(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    let short = binding("b1", 10);
    let long = binding("b2", 1000);
    store.save(&short).await?;
    store.save(&long).await?;

    // Exactly at the deadline the binding is not yet expired.
    let at_deadline = store
        .find_expired_before(short.expires_at, None, 100)
        .await?;
    assert!(
        at_deadline.iter().all(|b| b.id != short.id),
        "expires_at == before must not match"
    );

    let after_deadline = store
        .find_expired_before(short.expires_at + chrono::Duration::seconds(1), None, 100)
        .await?;
    let ids: Vec<_> = after_deadline.iter().map(|b| b.id.clone()).collect();
    assert_eq!(ids, vec![short.id.clone()], "only the short binding expired");

    store.delete_by_id(&short.id).await?;
    store.delete_by_id(&long.id).await?;
    Ok(())
}

async fn test_expired_paging(store: &dyn MetadataStore) -> Result<(), MetadataError> {
    // Saved out of order; pages must come back ordered by id.
    let suffixes = ["c5", "c1", "c4", "c2", "c3"];
    for s in suffixes {
        store.save(&binding(s, 5)).await?;
    }
    let now = epoch() + chrono::Duration::seconds(60);

    let first = store.find_expired_before(now, None, 2).await?;
    let second = store
        .find_expired_before(now, first.last().map(|b| &b.id), 2)
        .await?;
    let third = store
        .find_expired_before(now, second.last().map(|b| &b.id), 2)
        .await?;
    let fourth = store
        .find_expired_before(now, third.last().map(|b| &b.id), 2)
        .await?;

    let seen: Vec<String> = first
        .iter()
        .chain(&second)
        .chain(&third)
        .map(|b| b.id.as_str()[30..].to_owned())
        .collect();
    assert_eq!(seen, vec!["c1", "c2", "c3", "c4", "c5"]);
    assert_eq!(first.len(), 2);
    assert_eq!(third.len(), 1);
    assert!(fourth.is_empty(), "paging past the end yields nothing");

    for s in suffixes {
        store.delete_by_id(&binding(s, 5).id).await?;
    }
    Ok(())
}
