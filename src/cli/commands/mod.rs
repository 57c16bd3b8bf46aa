//! CLI command implementations.

mod config;
mod domains;
mod entries;
mod record;
mod serve;

pub use config::run_config;
pub use domains::run_domains;
pub use entries::run_entries;
pub use record::run_record;
pub use serve::{router, run_serve, AppState};
