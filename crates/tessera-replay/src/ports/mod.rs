pub mod hooks;
pub mod identity;

pub use hooks::{BlockSetHooks, NoopHooks};
pub use identity::IdentityOps;
