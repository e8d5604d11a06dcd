pub mod identity;

pub use identity::{BitcoinKey, IdentityRecord, IdentityRegistry};
