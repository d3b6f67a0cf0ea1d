//! Constant module: declared identities, their descriptors, and the value store.
//!
//! This is the foundational layer. No other kernel module is imported here
//! except the shared error type.

pub mod descriptor;
pub mod identity;
pub mod store;

pub use descriptor::{ConstantDescriptor, ConstantToken, TypeDescriptor};
pub use identity::SpecializationId;
pub use store::ConstantStore;
