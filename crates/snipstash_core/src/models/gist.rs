//! Gist and snippet storage.
//!
//! Snippets are written compressed under `snippets::<id>` next to a
//! `shadow::snippets::<id>` guard. Snippets that only exist in the legacy store
//! are promoted into the current store the first time a reader misses them.
//!
//! The guard is a de-duplication hint, not a lock: two readers racing on the
//! same unmigrated snippet may both promote it, which converges on the same
//! final state because promotion rewrites identical bytes and deleting an
//! absent legacy key is a no-op.

use super::new_id;
use crate::batch::{read_keys, Batch, KeyOutcome};
use crate::codec::Codec;
use crate::config::Config;
use crate::error::AppError;
use crate::keys;
use crate::store::{KeyValueStore, SharedStore};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Flat string record stored for one snippet (for example `lang` and `paste`).
pub type SnippetFields = BTreeMap<String, String>;

/// Request payload for creating a gist or appending snippets to one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGistRequest {
    #[serde(default)]
    pub snippets: Vec<SnippetFields>,
    /// Id of the account that owns the new snippets.
    #[serde(default)]
    pub account: Option<String>,
}

/// Accessor for gist and snippet keys.
pub struct GistStore {
    current: SharedStore,
    legacy: Option<SharedStore>,
    codec: Codec,
    guard_ttl: Duration,
}

impl GistStore {
    /// Build a gist store.
    ///
    /// # Arguments
    /// - `current`: Store receiving all writes.
    /// - `legacy`: Store consulted on misses, if a legacy deployment exists.
    /// - `codec`: Payload codec for both stores.
    /// - `guard_ttl`: Lifetime of migration guards.
    pub fn new(
        current: SharedStore,
        legacy: Option<SharedStore>,
        codec: Codec,
        guard_ttl: Duration,
    ) -> Self {
        Self {
            current,
            legacy,
            codec,
            guard_ttl,
        }
    }

    /// Build a gist store using codec and guard settings from `config`.
    pub fn from_config(current: SharedStore, legacy: Option<SharedStore>, config: &Config) -> Self {
        Self::new(
            current,
            legacy,
            Codec::new(config.compression),
            config.guard_ttl,
        )
    }

    /// Whether the gist has at least one snippet recorded.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn exists(&self, gist_id: &str) -> Result<bool, AppError> {
        Ok(self.current.exists(&keys::gist(gist_id)).await?)
    }

    /// Append snippets to a gist, creating the gist id when none is given.
    ///
    /// All writes go out in one batch. A failure is reported as a whole; some
    /// of the writes may still have landed.
    ///
    /// # Arguments
    /// - `gist_id`: Existing gist to extend, or `None` for a new gist.
    /// - `snippets`: Snippet payloads, at least one.
    /// - `owner`: Account id recorded as creator of the gist.
    ///
    /// # Returns
    /// The gist id.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] for an empty payload list, otherwise
    /// store, serialization or codec failures.
    pub async fn add_snippets(
        &self,
        gist_id: Option<&str>,
        snippets: &[SnippetFields],
        owner: Option<&str>,
    ) -> Result<String, AppError> {
        if snippets.is_empty() {
            return Err(AppError::BadRequest(
                "At least one snippet is required".to_string(),
            ));
        }
        let gist_id = gist_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_id);

        let mut batch = Batch::new();
        for fields in snippets {
            let snippet_id = new_id();
            let payload = self.codec.encode(&serde_json::to_vec(fields)?)?;
            batch
                .set_with_ttl(keys::snippet_guard(&snippet_id), "", self.guard_ttl)
                .set(keys::snippet(&snippet_id), payload)
                .sadd(keys::gist(&gist_id), snippet_id);
        }
        if let Some(owner) = owner {
            batch.sadd(keys::account_gists(owner), gist_id.as_str());
        }

        batch.write(self.current.as_ref()).await.map_err(|err| {
            tracing::error!("Error on setting snippets for gist {}: {}", gist_id, err);
            AppError::from(err)
        })?;
        Ok(gist_id)
    }

    /// Load every snippet of a gist, keyed by snippet id.
    ///
    /// Snippets missing from the current store are looked up in the legacy
    /// store and promoted. Snippets found nowhere, or whose payload fails to
    /// decode, are left out.
    ///
    /// # Errors
    /// Returns an error only when the gist's member set cannot be read.
    pub async fn get_snippets(
        &self,
        gist_id: &str,
    ) -> Result<HashMap<String, SnippetFields>, AppError> {
        let snippet_ids = self.current.smembers(&keys::gist(gist_id)).await?;
        if snippet_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut lookup = Batch::new();
        for id in &snippet_ids {
            lookup
                .get(keys::snippet(id))
                .exists(keys::snippet_guard(id));
        }
        let mut replies = lookup.execute(self.current.as_ref()).await;

        let mut encoded: HashMap<String, Vec<u8>> = HashMap::with_capacity(snippet_ids.len());
        let mut guarded = Vec::new();
        let mut unguarded = Vec::new();
        for id in snippet_ids {
            let value = replies.value(&keys::snippet(&id));
            let guard = replies.flag(&keys::snippet_guard(&id));
            match value {
                KeyOutcome::Found(bytes) => {
                    encoded.insert(id, bytes);
                }
                KeyOutcome::Missing => match guard {
                    Ok(false) => unguarded.push(id),
                    Ok(true) => guarded.push(id),
                    Err(err) => {
                        // An unreadable guard counts as set.
                        tracing::warn!("Guard for snippet {} unreadable: {}", id, err);
                        guarded.push(id);
                    }
                },
                KeyOutcome::Failed(err) => {
                    tracing::warn!("Failed to read snippet {}: {}", id, err);
                }
            }
        }

        let (migrated, vanished) = self.migrate_from_legacy(unguarded).await;
        encoded.extend(migrated);
        // A legacy miss may mean another reader promoted the snippet meanwhile.
        guarded.extend(vanished);
        encoded.extend(self.reread_promoted(guarded).await);

        let mut snippets = HashMap::with_capacity(encoded.len());
        for (id, bytes) in encoded {
            match self.decode_fields(&bytes) {
                Ok(fields) => {
                    snippets.insert(id, fields);
                }
                Err(err) => tracing::warn!("Snippet loading failed - {}: {}", id, err),
            }
        }
        Ok(snippets)
    }

    fn decode_fields(&self, bytes: &[u8]) -> Result<SnippetFields, serde_json::Error> {
        serde_json::from_slice(&self.codec.decode(bytes))
    }

    /// Second look at the current store for snippets that were promoted while
    /// this reader was looking elsewhere. Never touches the legacy store.
    async fn reread_promoted(&self, snippet_ids: Vec<String>) -> HashMap<String, Vec<u8>> {
        if snippet_ids.is_empty() {
            return HashMap::new();
        }
        let mut outcomes = read_keys(
            self.current.as_ref(),
            snippet_ids.iter().map(|id| keys::snippet(id)),
        )
        .await;
        snippet_ids
            .into_iter()
            .filter_map(|id| match outcomes.remove(&keys::snippet(&id)) {
                Some(KeyOutcome::Found(bytes)) => Some((id, bytes)),
                _ => {
                    tracing::debug!("Snippet {} has no payload in either store; omitting", id);
                    None
                }
            })
            .collect()
    }

    /// Promote snippets from the legacy store.
    ///
    /// Returns current-store payloads for every snippet that was found,
    /// whether or not the promotion write succeeded, and the ids the legacy
    /// store did not hold. The legacy copy is only deleted after the promotion
    /// batch succeeded.
    async fn migrate_from_legacy(
        &self,
        snippet_ids: Vec<String>,
    ) -> (HashMap<String, Vec<u8>>, Vec<String>) {
        let Some(legacy) = self.legacy.as_ref() else {
            return (HashMap::new(), Vec::new());
        };
        if snippet_ids.is_empty() {
            return (HashMap::new(), Vec::new());
        }

        let mut outcomes = read_keys(
            legacy.as_ref(),
            snippet_ids.iter().map(|id| keys::legacy_snippet(id)),
        )
        .await;

        let mut promote = Batch::new();
        let mut retire = Batch::new();
        let mut promoted = HashMap::new();
        let mut missing = Vec::new();
        for id in snippet_ids {
            let legacy_key = keys::legacy_snippet(&id);
            let raw = match outcomes.remove(&legacy_key) {
                Some(KeyOutcome::Found(raw)) => raw,
                Some(KeyOutcome::Failed(err)) => {
                    tracing::warn!("Legacy lookup for snippet {} failed: {}", id, err);
                    continue;
                }
                Some(KeyOutcome::Missing) | None => {
                    missing.push(id);
                    continue;
                }
            };

            let plain = self.codec.decode(&raw);
            if let Err(err) = serde_json::from_slice::<SnippetFields>(&plain) {
                tracing::warn!("Legacy snippet {} is unreadable, leaving it in place: {}", id, err);
                continue;
            }
            let payload = match self.codec.encode(&plain) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!("Failed to re-encode legacy snippet {}: {}", id, err);
                    continue;
                }
            };

            promote
                .set_with_ttl(keys::snippet_guard(&id), "", self.guard_ttl)
                .set(keys::snippet(&id), payload.clone());
            retire.del(legacy_key);
            promoted.insert(id, payload);
        }
        if promote.is_empty() {
            return (promoted, missing);
        }

        if let Err(err) = promote.write(self.current.as_ref()).await {
            tracing::error!(
                "Failed to promote {} legacy snippet(s): {}",
                promoted.len(),
                err
            );
            return (promoted, missing);
        }
        if let Err(err) = retire.write(legacy.as_ref()).await {
            tracing::warn!("Promoted snippets but could not remove legacy copies: {}", err);
        }
        tracing::debug!("Migrated {} snippet(s) from the legacy store", promoted.len());
        (promoted, missing)
    }
}
