//! Bundle stage machine: the single gate for stage-dependent operations.
//!
//! ```text
//! Input ──compile──▶ Object ──link──▶ Executable
//! ```
//!
//! Transitions are strictly forward, one stage at a time. `Executable` is
//! terminal. Every bundle operation whose legality depends on the stage calls
//! [`BundleStateMachine::guard`]; no call site inspects the stage directly.

use std::fmt;

use crate::error::SpecConstError;

/// Compilation stage of a kernel bundle. Ordered by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BundleState {
    /// Not yet compiled; constants mutable.
    Input,
    /// Compiled to an intermediate form; constants frozen.
    Object,
    /// Linked for the bundle's devices; ready for dispatch.
    Executable,
}

impl BundleState {
    /// Canonical string for manifests and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Object => "object",
            Self::Executable => "executable",
        }
    }

    /// The stage directly after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Input => Some(Self::Object),
            Self::Object => Some(Self::Executable),
            Self::Executable => None,
        }
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations whose legality depends on the bundle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleOp {
    SetConstant,
    ResetConstant,
    Compile,
    Link,
    Dispatch,
}

impl BundleOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetConstant => "set_constant",
            Self::ResetConstant => "reset_constant",
            Self::Compile => "compile",
            Self::Link => "link",
            Self::Dispatch => "dispatch",
        }
    }

    /// The only stages in which this operation is legal.
    const fn permitted_in(self, state: BundleState) -> bool {
        matches!(
            (self, state),
            (
                Self::SetConstant | Self::ResetConstant | Self::Compile,
                BundleState::Input
            ) | (Self::Link, BundleState::Object)
                | (Self::Dispatch, BundleState::Executable)
        )
    }
}

/// Tracks one bundle's stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleStateMachine {
    state: BundleState,
}

impl BundleStateMachine {
    /// A machine in the `Input` stage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: BundleState::Input,
        }
    }

    #[must_use]
    pub const fn state(&self) -> BundleState {
        self.state
    }

    /// Check that `op` is legal in the current stage.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] naming the operation and stage.
    pub fn guard(&self, op: BundleOp) -> Result<(), SpecConstError> {
        if op.permitted_in(self.state) {
            Ok(())
        } else {
            Err(SpecConstError::invalid_state(format!(
                "{} is not permitted in the {} stage",
                op.as_str(),
                self.state
            )))
        }
    }

    /// Move to `to`, which must be the immediate successor stage.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] for skips, regressions, and
    /// any transition out of `Executable`. The machine is unchanged on error.
    pub fn advance(&mut self, to: BundleState) -> Result<(), SpecConstError> {
        if self.state.next() == Some(to) {
            self.state = to;
            Ok(())
        } else {
            Err(SpecConstError::invalid_state(format!(
                "illegal stage transition {} -> {to}",
                self.state
            )))
        }
    }
}

impl Default for BundleStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
