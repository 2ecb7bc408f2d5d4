//! Account model.
//!
//! Each attribute lives under its own key, addressed by the other identifying
//! attribute: `user::id::<id>` holds the name, `user::name::<b64 name>` holds
//! the id and `user::pass::<b64 name>` holds the password digest. An
//! [`Account`] fetches each attribute at most once and keeps it for the rest
//! of its (request-scoped) lifetime.

use super::gist::GistStore;
use super::new_id;
use crate::batch::Batch;
use crate::credentials;
use crate::error::AppError;
use crate::keys;
use crate::store::{KeyValueStore, SharedStore};
use serde::Deserialize;

/// Request payload for registering an account.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub password: String,
}

/// An account handle with lazily fetched attributes.
pub struct Account {
    store: SharedStore,
    id: Option<String>,
    name: Option<String>,
    password_digest: Option<String>,
}

impl Account {
    /// Handle addressing an account by id. Nothing is read yet.
    pub fn by_id(store: SharedStore, id: impl Into<String>) -> Self {
        Self {
            store,
            id: Some(id.into()),
            name: None,
            password_digest: None,
        }
    }

    /// Handle addressing an account by name. Nothing is read yet.
    pub fn by_name(store: SharedStore, name: impl Into<String>) -> Self {
        Self {
            store,
            id: None,
            name: Some(name.into()),
            password_digest: None,
        }
    }

    /// Register a new account under a unique name.
    ///
    /// # Returns
    /// The saved account with a freshly generated id.
    ///
    /// # Errors
    /// Returns [`AppError::Conflict`] when the name is taken,
    /// [`AppError::BadRequest`] for a blank name, or store/hashing failures.
    pub async fn register(
        store: SharedStore,
        name: &str,
        password: &str,
        password_cost: u32,
    ) -> Result<Self, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Account name is required".to_string()));
        }
        if store.get(&keys::account_name(name)).await?.is_some() {
            return Err(AppError::Conflict("Account already available".to_string()));
        }

        let digest = credentials::hash_password(password.to_string(), password_cost).await?;
        let mut account = Self {
            store,
            id: Some(new_id()),
            name: Some(name.to_string()),
            password_digest: Some(digest),
        };
        account.save().await?;
        Ok(account)
    }

    /// Look up an existing account by name.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no such account exists.
    pub async fn find_by_name(store: SharedStore, name: &str) -> Result<Self, AppError> {
        Self::found(Self::by_name(store, name)).await
    }

    /// Look up an existing account by id.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no such account exists.
    pub async fn find_by_id(store: SharedStore, id: &str) -> Result<Self, AppError> {
        Self::found(Self::by_id(store, id)).await
    }

    async fn found(account: Self) -> Result<Self, AppError> {
        if account.exists().await? {
            Ok(account)
        } else {
            Err(AppError::NotFound("Account".to_string()))
        }
    }

    /// Whether the lookup entry for the known attribute exists.
    ///
    /// Checks key existence only, so an entry holding an empty value still
    /// counts even though the matching getter would return an empty string.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn exists(&self) -> Result<bool, AppError> {
        let key = match (&self.name, &self.id) {
            (Some(name), _) => keys::account_name(name),
            (None, Some(id)) => keys::account_id(id),
            (None, None) => return Ok(false),
        };
        Ok(self.store.exists(&key).await?)
    }

    async fn fetch(&self, key: &str) -> Result<String, AppError> {
        Ok(self
            .store
            .get(key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default())
    }

    /// Account id, read through the name on first use.
    ///
    /// A miss yields an empty string and is retried on the next call.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn id(&mut self) -> Result<String, AppError> {
        if let Some(id) = &self.id {
            return Ok(id.clone());
        }
        let Some(name) = self.name.as_deref() else {
            return Ok(String::new());
        };
        let id = self.fetch(&keys::account_name(name)).await?;
        if !id.is_empty() {
            self.id = Some(id.clone());
        }
        Ok(id)
    }

    /// Account name, read through the id on first use.
    ///
    /// A miss yields an empty string and is retried on the next call.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn name(&mut self) -> Result<String, AppError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let Some(id) = self.id.as_deref() else {
            return Ok(String::new());
        };
        let name = self.fetch(&keys::account_id(id)).await?;
        if !name.is_empty() {
            self.name = Some(name.clone());
        }
        Ok(name)
    }

    /// Password digest, read through the name on first use.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn password_digest(&mut self) -> Result<String, AppError> {
        if let Some(digest) = &self.password_digest {
            return Ok(digest.clone());
        }
        let name = self.name().await?;
        if name.is_empty() {
            return Ok(String::new());
        }
        let digest = self.fetch(&keys::account_password(&name)).await?;
        if !digest.is_empty() {
            self.password_digest = Some(digest.clone());
        }
        Ok(digest)
    }

    /// Whether `password` matches the stored digest.
    ///
    /// # Errors
    /// Returns an error when the digest cannot be read.
    pub async fn verify_password(&mut self, password: &str) -> Result<bool, AppError> {
        let digest = self.password_digest().await?;
        Ok(credentials::verify_password(password.to_string(), digest).await)
    }

    /// Write id, name and digest entries in one batch.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] when id or name cannot be resolved,
    /// otherwise the batch failure.
    pub async fn save(&mut self) -> Result<(), AppError> {
        let id = self.id().await?;
        let name = self.name().await?;
        if id.is_empty() || name.is_empty() {
            return Err(AppError::BadRequest(
                "An account needs both an id and a name".to_string(),
            ));
        }
        let digest = self.password_digest().await?;

        let mut batch = Batch::new();
        batch
            .set(keys::account_id(&id), name.as_str())
            .set(keys::account_name(&name), id.as_str())
            .set(keys::account_password(&name), digest);
        batch.write(self.store.as_ref()).await?;
        Ok(())
    }

    /// Rotate the account id.
    ///
    /// Points the name at a new id and drops the old id entry in one batch.
    /// On failure the in-memory id is left as it was; whatever part of the
    /// batch reached the store is not rolled back.
    ///
    /// # Returns
    /// The new id.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when the account cannot be resolved, or
    /// the batch failure.
    pub async fn reset_id(&mut self) -> Result<String, AppError> {
        let old_id = self.id().await?;
        let name = self.name().await?;
        if old_id.is_empty() || name.is_empty() {
            return Err(AppError::NotFound("Account".to_string()));
        }

        let new_id = new_id();
        let mut batch = Batch::new();
        batch
            .set(keys::account_id(&new_id), name.as_str())
            .set(keys::account_name(&name), new_id.as_str())
            .del(keys::account_id(&old_id));
        batch.write(self.store.as_ref()).await?;

        tracing::info!("Rotated account id {} -> {}", old_id, new_id);
        self.id = Some(new_id.clone());
        Ok(new_id)
    }

    /// Bookmark a gist. Returns `false` when the gist does not exist.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn mark_gist(&mut self, gists: &GistStore, gist_id: &str) -> Result<bool, AppError> {
        if !gists.exists(gist_id).await? {
            return Ok(false);
        }
        let id = self.resolved_id().await?;
        self.store
            .sadd(&keys::account_marked_gists(&id), gist_id)
            .await?;
        Ok(true)
    }

    /// Ids of gists this account created.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn created_gists(&mut self) -> Result<Vec<String>, AppError> {
        let id = self.resolved_id().await?;
        Ok(self.store.smembers(&keys::account_gists(&id)).await?)
    }

    /// Ids of gists this account bookmarked.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    pub async fn marked_gists(&mut self) -> Result<Vec<String>, AppError> {
        let id = self.resolved_id().await?;
        Ok(self.store.smembers(&keys::account_marked_gists(&id)).await?)
    }

    async fn resolved_id(&mut self) -> Result<String, AppError> {
        let id = self.id().await?;
        if id.is_empty() {
            return Err(AppError::NotFound("Account".to_string()));
        }
        Ok(id)
    }
}
