//! Dispatch module: the device-side binding to a bundle's frozen constants.
//!
//! Depends on `constant` and `bundle`.

pub mod binding;

pub use binding::{DispatchTarget, KernelHandler};
