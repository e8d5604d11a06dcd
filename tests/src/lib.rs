//! # Tessera Test Suite
//!
//! Unified test crate for the replay engine.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/       # Multi-block replay choreography
//!     ├── harness.rs     # Block-set builder over a live chain state
//!     ├── replay_flows.rs
//!     ├── rejection.rs
//!     ├── expiration.rs
//!     └── identity_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tessera-tests
//!
//! # By category
//! cargo test -p tessera-tests integration::
//!
//! # Benchmarks
//! cargo bench -p tessera-tests
//! ```

#![allow(dead_code)]

pub mod integration;
