//! Top-level facade crate for modelserve.
//!
//! Re-exports the core types, the serving gateway and the training job so
//! users can depend on a single crate.

pub mod core {
    pub use modelserve_core::*;
}

pub mod gateway {
    pub use modelserve_gateway::*;
}

pub mod train {
    pub use modelserve_train::*;
}
