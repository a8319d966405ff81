pub mod cache;
pub mod rules;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, ValidationCache};
pub use rules::{RuleViolation, UploadRule, UploadRules};
