//! Root crate facade for the SnipStash server and core library.

pub use snipstash_core::{
    batch, codec, keys, ratelimit, Account, Codec, Compression, KeyValueStore, RateLimiter,
    RateLimits, StoreError,
};
pub use snipstash_server::{
    config, create_app, error, handlers, models, resolve_bind_address, serve_router, store,
    AppError, AppState, Config, GistStore, SharedStore, DEFAULT_PORT,
};
