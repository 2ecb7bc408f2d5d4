use super::account::Account;
use super::gist::{GistStore, SnippetFields};
use crate::codec::{Codec, Compression};
use crate::error::AppError;
use crate::keys;
use crate::store::{Command, KeyValueStore, MemoryStore, Reply, SharedStore, StoreError};
use crate::test_support::{memory_store, FaultyStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const GUARD_TTL: Duration = Duration::from_secs(3600);
const COST: u32 = 4;

fn fields(lang: &str, paste: &str) -> SnippetFields {
    let mut fields = SnippetFields::new();
    fields.insert("lang".to_string(), lang.to_string());
    fields.insert("paste".to_string(), paste.to_string());
    fields
}

fn codec() -> Codec {
    Codec::new(Compression::Snappy)
}

fn gist_store(current: SharedStore, legacy: Option<SharedStore>) -> GistStore {
    GistStore::new(current, legacy, codec(), GUARD_TTL)
}

/// Put a snippet only in the legacy store, with the gist membership recorded
/// in the current store.
async fn seed_legacy(current: &SharedStore, legacy: &SharedStore, gist: &str, snippet: &str) {
    let payload = codec()
        .encode(&serde_json::to_vec(&fields("go", "package main")).expect("json"))
        .expect("encode");
    legacy
        .set(&keys::legacy_snippet(snippet), &payload, None)
        .await
        .expect("seed legacy");
    current
        .sadd(&keys::gist(gist), snippet)
        .await
        .expect("seed membership");
}

#[tokio::test]
async fn snippets_round_trip_through_a_gist() {
    let store = gist_store(memory_store(), None);
    let gist = store
        .add_snippets(
            None,
            &[fields("ruby", "puts 1"), fields("go", "package main")],
            None,
        )
        .await
        .expect("add");

    let snippets = store.get_snippets(&gist).await.expect("get");
    assert_eq!(snippets.len(), 2);
    let mut langs: Vec<&str> = snippets.values().map(|f| f["lang"].as_str()).collect();
    langs.sort_unstable();
    assert_eq!(langs, vec!["go", "ruby"]);
    assert!(store.exists(&gist).await.expect("exists"));
}

#[tokio::test]
async fn appending_keeps_the_gist_id() {
    let store = gist_store(memory_store(), None);
    let gist = store
        .add_snippets(None, &[fields("c", "int main;")], None)
        .await
        .expect("add");
    let again = store
        .add_snippets(Some(&gist), &[fields("sh", "echo")], None)
        .await
        .expect("append");
    assert_eq!(gist, again);
    assert_eq!(store.get_snippets(&gist).await.expect("get").len(), 2);
}

#[tokio::test]
async fn empty_payload_list_is_rejected() {
    let store = gist_store(memory_store(), None);
    let err = store.add_snippets(None, &[], None).await.expect_err("empty");
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn unknown_gist_is_empty() {
    let store = gist_store(memory_store(), None);
    assert!(store.get_snippets("nope").await.expect("get").is_empty());
    assert!(!store.exists("nope").await.expect("exists"));
}

#[tokio::test]
async fn legacy_snippets_are_promoted_on_first_read() {
    let current = memory_store();
    let legacy = memory_store();
    seed_legacy(&current, &legacy, "g1", "s1").await;
    let store = gist_store(current.clone(), Some(legacy.clone()));

    let snippets = store.get_snippets("g1").await.expect("get");
    assert_eq!(snippets["s1"]["paste"], "package main");

    assert!(current.get(&keys::snippet("s1")).await.expect("get").is_some());
    assert!(current.exists(&keys::snippet_guard("s1")).await.expect("guard"));
    assert!(legacy
        .get(&keys::legacy_snippet("s1"))
        .await
        .expect("legacy")
        .is_none());

    // Second read is served from the current store alone.
    let again = store.get_snippets("g1").await.expect("get again");
    assert_eq!(again, snippets);
}

#[tokio::test]
async fn concurrent_readers_converge_on_one_copy() {
    let current = memory_store();
    let legacy = memory_store();
    seed_legacy(&current, &legacy, "g2", "s2").await;
    let store = Arc::new(gist_store(current.clone(), Some(legacy.clone())));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_snippets("g2").await })
        })
        .collect();
    for reader in readers {
        let snippets = reader.await.expect("join").expect("get");
        assert_eq!(snippets.len(), 1);
    }

    assert!(current.get(&keys::snippet("s2")).await.expect("get").is_some());
    assert!(legacy
        .get(&keys::legacy_snippet("s2"))
        .await
        .expect("legacy")
        .is_none());
    assert_eq!(store.get_snippets("g2").await.expect("get").len(), 1);
}

/// Legacy store that lets another reader finish promoting a snippet right
/// before answering the first read.
struct PromotedElsewhere {
    inner: MemoryStore,
    current: SharedStore,
    snippet_id: &'static str,
    fired: AtomicBool,
}

#[async_trait]
impl KeyValueStore for PromotedElsewhere {
    async fn pipeline(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError> {
        let legacy_key = keys::legacy_snippet(self.snippet_id);
        let reads_snippet = commands
            .iter()
            .any(|command| matches!(command, Command::Get { key } if *key == legacy_key));
        if reads_snippet && !self.fired.swap(true, Ordering::SeqCst) {
            let payload = self.inner.get(&legacy_key).await?.unwrap_or_default();
            self.current
                .set(&keys::snippet_guard(self.snippet_id), b"", Some(GUARD_TTL))
                .await?;
            self.current
                .set(&keys::snippet(self.snippet_id), &payload, None)
                .await?;
            self.inner.del(&legacy_key).await?;
        }
        self.inner.pipeline(commands).await
    }
}

#[tokio::test]
async fn snippet_promoted_by_another_reader_is_still_returned() {
    let current = memory_store();
    let racing = Arc::new(PromotedElsewhere {
        inner: MemoryStore::new(),
        current: current.clone(),
        snippet_id: "s-race",
        fired: AtomicBool::new(false),
    });
    let payload = codec()
        .encode(&serde_json::to_vec(&fields("go", "package main")).expect("json"))
        .expect("encode");
    racing
        .inner
        .set(&keys::legacy_snippet("s-race"), &payload, None)
        .await
        .expect("seed legacy");
    current
        .sadd(&keys::gist("g-race"), "s-race")
        .await
        .expect("seed membership");
    let legacy: SharedStore = racing.clone();
    let store = gist_store(current.clone(), Some(legacy));

    let snippets = store.get_snippets("g-race").await.expect("get");
    assert_eq!(snippets.len(), 1);
    assert_eq!(snippets["s-race"]["lang"], "go");
    assert!(racing.fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn guarded_miss_never_consults_the_legacy_store() {
    let current = memory_store();
    let legacy = memory_store();
    seed_legacy(&current, &legacy, "g3", "s3").await;
    current
        .set(&keys::snippet_guard("s3"), b"", Some(GUARD_TTL))
        .await
        .expect("guard");
    let store = gist_store(current.clone(), Some(legacy.clone()));

    assert!(store.get_snippets("g3").await.expect("get").is_empty());
    assert!(legacy
        .get(&keys::legacy_snippet("s3"))
        .await
        .expect("legacy")
        .is_some());
    assert!(current.get(&keys::snippet("s3")).await.expect("get").is_none());
}

#[tokio::test]
async fn unreadable_legacy_payload_stays_in_place() {
    let current = memory_store();
    let legacy = memory_store();
    legacy
        .set(&keys::legacy_snippet("s4"), b"\xff\x00garbage", None)
        .await
        .expect("seed");
    current.sadd(&keys::gist("g4"), "s4").await.expect("member");
    let store = gist_store(current.clone(), Some(legacy.clone()));

    assert!(store.get_snippets("g4").await.expect("get").is_empty());
    assert!(legacy
        .get(&keys::legacy_snippet("s4"))
        .await
        .expect("legacy")
        .is_some());
    assert!(!current.exists(&keys::snippet_guard("s4")).await.expect("guard"));
}

#[tokio::test]
async fn corrupt_payloads_are_left_out() {
    let current = memory_store();
    let store = gist_store(current.clone(), None);
    let gist = store
        .add_snippets(None, &[fields("rust", "fn main() {}")], None)
        .await
        .expect("add");
    current
        .set(&keys::snippet("broken"), b"not snappy at all", None)
        .await
        .expect("seed");
    current.sadd(&keys::gist(&gist), "broken").await.expect("member");

    let snippets = store.get_snippets(&gist).await.expect("get");
    assert_eq!(snippets.len(), 1);
    assert!(!snippets.contains_key("broken"));
}

#[tokio::test]
async fn store_outage_surfaces_as_an_error() {
    let faulty = FaultyStore::new();
    let store = gist_store(faulty.clone(), None);
    faulty.fail_all(true);

    let err = store.get_snippets("g").await.expect_err("outage");
    assert!(matches!(err, AppError::Store(_)));
    let err = store
        .add_snippets(None, &[fields("x", "y")], None)
        .await
        .expect_err("outage");
    assert!(matches!(err, AppError::Store(_)));
}

#[tokio::test]
async fn owned_gists_are_listed_for_the_account() {
    let shared = memory_store();
    let store = gist_store(shared.clone(), None);
    let mut account = Account::register(shared.clone(), "owner", "pw", COST)
        .await
        .expect("register");
    let owner = account.id().await.expect("id");

    let gist = store
        .add_snippets(None, &[fields("md", "# hi")], Some(&owner))
        .await
        .expect("add");
    assert_eq!(account.created_gists().await.expect("created"), vec![gist]);
}

#[tokio::test]
async fn names_are_unique() {
    let store = memory_store();
    let mut first = Account::register(store.clone(), "moo", "one", COST)
        .await
        .expect("register");
    let id = first.id().await.expect("id");

    let err = Account::register(store.clone(), "moo", "two", COST)
        .await
        .err()
        .expect("duplicate");
    assert!(matches!(err, AppError::Conflict(_)));

    let stored = store
        .get(&keys::account_name("moo"))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored, id.as_bytes());

    let mut found = Account::find_by_name(store.clone(), "moo")
        .await
        .expect("find");
    assert!(found.verify_password("one").await.expect("verify"));
    assert!(!found.verify_password("two").await.expect("verify"));
}

#[tokio::test]
async fn lookups_of_missing_accounts_fail() {
    let store = memory_store();
    assert!(matches!(
        Account::find_by_name(store.clone(), "ghost").await.err(),
        Some(AppError::NotFound(_))
    ));
    assert!(matches!(
        Account::find_by_id(store, "ghost-id").await.err(),
        Some(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn attributes_are_fetched_once() {
    let faulty = FaultyStore::new();
    let registered = Account::register(faulty.clone(), "cow", "pw", COST)
        .await
        .expect("register");
    drop(registered);

    let mut account = Account::by_name(faulty.clone(), "cow");
    let before = faulty.round_trips();
    let id = account.id().await.expect("id");
    assert!(!id.is_empty());
    assert_eq!(account.id().await.expect("id again"), id);
    assert_eq!(faulty.round_trips(), before + 1);

    let mut by_id = Account::by_id(faulty.clone(), id);
    let before = faulty.round_trips();
    assert_eq!(by_id.name().await.expect("name"), "cow");
    assert_eq!(by_id.name().await.expect("name again"), "cow");
    assert_eq!(faulty.round_trips(), before + 1);
}

#[tokio::test]
async fn misses_are_not_remembered() {
    let faulty = FaultyStore::new();
    let mut account = Account::by_name(faulty.clone(), "nobody");
    let before = faulty.round_trips();
    assert_eq!(account.id().await.expect("id"), "");
    assert_eq!(account.id().await.expect("id again"), "");
    assert_eq!(faulty.round_trips(), before + 2);
    assert!(!account.exists().await.expect("exists"));
}

#[tokio::test]
async fn reset_id_repoints_the_name() {
    let store = memory_store();
    let mut account = Account::register(store.clone(), "bull", "pw", COST)
        .await
        .expect("register");
    let old_id = account.id().await.expect("id");

    let new_id = account.reset_id().await.expect("reset");
    assert_ne!(old_id, new_id);
    assert_eq!(account.id().await.expect("id"), new_id);

    let mut reloaded = Account::by_name(store.clone(), "bull");
    assert_eq!(reloaded.id().await.expect("id"), new_id);
    assert!(store
        .get(&keys::account_id(&old_id))
        .await
        .expect("old")
        .is_none());
    assert!(Account::find_by_id(store, &new_id).await.is_ok());
}

#[tokio::test]
async fn failed_reset_keeps_the_old_id() {
    let faulty = FaultyStore::new();
    let mut account = Account::register(faulty.clone(), "ox", "pw", COST)
        .await
        .expect("register");
    let old_id = account.id().await.expect("id");

    faulty.fail_keys_with_prefix("user::id::");
    assert!(account.reset_id().await.is_err());
    assert_eq!(account.id().await.expect("id"), old_id);
    assert_eq!(
        faulty
            .inner()
            .get(&keys::account_name("ox"))
            .await
            .expect("get"),
        Some(old_id.into_bytes())
    );
}

#[tokio::test]
async fn marking_requires_an_existing_gist() {
    let shared = memory_store();
    let gists = gist_store(shared.clone(), None);
    let mut account = Account::register(shared.clone(), "yak", "pw", COST)
        .await
        .expect("register");
    let gist = gists
        .add_snippets(None, &[fields("py", "print()")], None)
        .await
        .expect("add");

    assert!(account.mark_gist(&gists, &gist).await.expect("mark"));
    assert!(!account.mark_gist(&gists, "missing").await.expect("mark"));
    assert_eq!(account.marked_gists().await.expect("marked"), vec![gist]);
}
