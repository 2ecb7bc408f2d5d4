//! Data models: gists with their snippets, and accounts.

/// Account model with lazily fetched attributes.
pub mod account;
/// Gist/snippet storage with lazy legacy migration.
pub mod gist;

use uuid::Uuid;

/// Fresh opaque identifier for gists, snippets and accounts.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests;
