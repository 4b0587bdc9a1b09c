pub mod config;
pub mod models;
pub mod monitor;
pub mod plugins;
pub mod policy;
pub mod reconciler;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use monitor::{CycleSummary, Monitor};
pub use reconciler::{CycleContext, CycleOutcome, Reconciler};
pub use scheduler::CycleScheduler;
pub use store::{MemoryStore, SqliteStore, StateStore};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
