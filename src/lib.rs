pub mod config;
pub mod constants;
#[cfg(feature = "db")]
pub mod db;
pub mod dedupe;
pub mod error;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;
