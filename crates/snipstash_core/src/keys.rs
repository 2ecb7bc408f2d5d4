//! Store key naming.
//!
//! Keys are flat strings composed as `<entity-type>::<id>[::<sub-collection>]`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encoded snippet payload in the current store.
pub fn snippet(snippet_id: &str) -> String {
    format!("snippets::{}", snippet_id)
}

/// Snippet payload location in the legacy store.
pub fn legacy_snippet(snippet_id: &str) -> String {
    format!("snippets::{}", snippet_id)
}

/// Migration guard marking a snippet as promoted to the current store.
pub fn snippet_guard(snippet_id: &str) -> String {
    format!("shadow::snippets::{}", snippet_id)
}

/// Set of snippet ids belonging to a gist.
pub fn gist(gist_id: &str) -> String {
    format!("gists::{}", gist_id)
}

/// Set of gist ids created by an account.
pub fn account_gists(account_id: &str) -> String {
    format!("users::{}::gists", account_id)
}

/// Set of gist ids bookmarked by an account.
pub fn account_marked_gists(account_id: &str) -> String {
    format!("users::{}::marked_gists", account_id)
}

/// id -> name lookup entry.
pub fn account_id(account_id: &str) -> String {
    format!("user::id::{}", account_id)
}

/// name -> id lookup entry.
pub fn account_name(name: &str) -> String {
    format!("user::name::{}", encode_name(name))
}

/// Password digest, addressed by name.
pub fn account_password(name: &str) -> String {
    format!("user::pass::{}", encode_name(name))
}

/// Hit counter for a client address.
pub fn ratelimit_hits(client: &str) -> String {
    format!("ratelimit::hits::{}", client)
}

/// Byte counter for a client address.
pub fn ratelimit_bytes(client: &str) -> String {
    format!("ratelimit::bytes::{}", client)
}

/// Account names are base64-encoded so any name yields a well-formed key.
pub fn encode_name(name: &str) -> String {
    STANDARD.encode(name.as_bytes())
}
