//! Common infrastructure for the mock transport.
//!
//! - **errors**: Fault injection
//! - **rng**: Seeded random number generator

pub mod errors;
pub mod rng;

// Re-export commonly used types
pub use errors::{ErrorConfig, ErrorScenario, MockOp};
pub use rng::MockRng;
