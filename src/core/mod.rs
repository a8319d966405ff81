pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{Document, ItemKey, Record};
