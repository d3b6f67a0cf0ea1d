//! Errors surfaced by queue submission and event completion.

use speck_kernel::bundle::DeviceId;
use speck_kernel::SpecConstError;

/// Failure of a submit or of the dispatched kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A constant, bundle, or build operation failed.
    Spec(SpecConstError),
    /// The command group finished without enqueuing a kernel.
    NoKernel,
    /// The queue's device is not part of its context.
    UnknownDevice { device: DeviceId },
    /// The dispatch thread could not be started.
    Spawn { detail: String },
    /// The kernel body panicked.
    KernelPanicked { kernel: String, detail: String },
}

impl From<SpecConstError> for DispatchError {
    fn from(e: SpecConstError) -> Self {
        Self::Spec(e)
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spec(e) => write!(f, "{e}"),
            Self::NoKernel => write!(f, "command group did not enqueue a kernel"),
            Self::UnknownDevice { device } => {
                write!(f, "device {device} is not part of the queue's context")
            }
            Self::Spawn { detail } => write!(f, "failed to start dispatch: {detail}"),
            Self::KernelPanicked { kernel, detail } => {
                write!(f, "kernel {kernel:?} panicked: {detail}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spec(e) => Some(e),
            _ => None,
        }
    }
}
