pub mod persistence;
pub mod store;

pub use persistence::{DocumentFile, ReadOutcome};
pub use store::{LoadOutcome, Store, StoreSnapshot};
