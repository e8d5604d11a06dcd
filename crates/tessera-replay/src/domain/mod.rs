pub mod blocks;
pub mod commits;
pub mod errors;
pub mod identity;
pub mod ledger;
pub mod metrics;
pub mod missing;
pub mod pipeline;
pub mod state;

pub use blocks::*;
pub use commits::*;
pub use errors::*;
pub use identity::*;
pub use ledger::*;
pub use metrics::ReplayMetrics;
pub use missing::*;
pub use state::*;
