//! Host list storage and shared types for the pscan engine.

mod hosts;

pub use hosts::{HostsError, HostsList};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
