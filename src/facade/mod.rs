pub mod config;
pub mod service;
pub mod stats;

pub use config::StoreConfig;
pub use service::PersistenceService;
pub use stats::Statistics;
