pub mod harness;

mod expiration;
mod replay_flows;
