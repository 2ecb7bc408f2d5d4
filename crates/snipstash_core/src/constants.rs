//! Shared constants used across SnipStash crates.

use std::time::Duration;

/// Default API port for SnipStash.
pub const DEFAULT_PORT: u16 = 38480;

/// Default store URL when none is configured.
pub const DEFAULT_STORE_URL: &str = "memory://";

/// Default lifetime of a migration guard marker.
pub const DEFAULT_GUARD_TTL: Duration = Duration::from_secs(60 * 60);

/// Default bcrypt cost for account password digests.
pub const DEFAULT_PASSWORD_COST: u32 = 10;

/// Default maximum request body accepted by the API layer.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;
