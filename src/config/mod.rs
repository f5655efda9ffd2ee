//! Config & Platform Layer (C9): the process-wide `AppConfig`, loaded
//! once behind a `Lazy<Mutex<_>>` in `commands::config`, and its
//! load/save/deep-merge persistence.

pub mod persistence;
pub mod schema;
