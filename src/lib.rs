pub mod clock;
pub mod config;
pub mod dump;
pub mod error;
pub mod service;
pub mod store;
pub mod tokens;
mod utils;

pub use error::BackupError;
pub use service::BackupService;
pub use store::{BackupRecord, BackupStore};
