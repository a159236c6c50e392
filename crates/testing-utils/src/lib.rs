//! # dcron Testing Utils
//!
//! Shared testing utilities for the workspace: in-memory mocks of the
//! container runtime and the subscriber transport, task configuration
//! builders, and async test helpers.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! dcron-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
