//! # configs
//!
//! Startup configuration for the forum API, layered lowest to highest:
//!
//! 1. compiled-in defaults (the `Default` impls below)
//! 2. `config/default.toml`, if present
//! 3. `config/{APP_ENV}.toml`, if present (`APP_ENV` defaults to `development`)
//! 4. `APP__SECTION__KEY` environment variables, after loading `.env`
//!
//! `FORUM_DB_DSN` is accepted as a fallback for `APP__DATABASE__URL`.

mod settings;

pub use settings::*;
