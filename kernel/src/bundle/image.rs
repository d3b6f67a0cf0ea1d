//! Device images and the devices they target.
//!
//! A [`DeviceImage`] is one module of device code as the runtime sees it:
//! the kernels it defines, the constants it declares in its metadata table,
//! and the device kinds it can run on. The metadata table is what makes a
//! constant "present" in a bundle.

use std::fmt;

use crate::constant::{ConstantDescriptor, ConstantToken};

/// Class of device an image can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Accelerator,
}

impl DeviceKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Accelerator => "accelerator",
        }
    }
}

/// Opaque device identifier, unique within a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// A device a bundle can be built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub name: String,
}

impl DeviceDescriptor {
    #[must_use]
    pub fn new(id: u32, kind: DeviceKind, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId(id),
            kind,
            name: name.into(),
        }
    }
}

/// A kernel defined by an image, with the constants its code reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelEntry {
    pub name: String,
    /// Tokens referenced by the kernel body. The backend resolves each one
    /// against the constant blob.
    pub references: Vec<ConstantToken>,
}

/// One module of device code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceImage {
    name: String,
    kernels: Vec<KernelEntry>,
    constants: Vec<ConstantDescriptor>,
    targets: Vec<DeviceKind>,
}

impl DeviceImage {
    /// An image with no kernels, no constants, and no targets.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kernels: Vec::new(),
            constants: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Add a kernel that reads `uses`. Each used constant is also added to
    /// the image's metadata table.
    #[must_use]
    pub fn with_kernel(mut self, name: impl Into<String>, uses: &[ConstantDescriptor]) -> Self {
        let references = uses.iter().map(ConstantDescriptor::token).collect();
        for descriptor in uses {
            self = self.with_constant(descriptor.clone());
        }
        self.kernels.push(KernelEntry {
            name: name.into(),
            references,
        });
        self
    }

    /// Add a kernel whose references are given by token only. Tokens not in
    /// the metadata table will fail to resolve at build time.
    #[must_use]
    pub fn with_raw_kernel(mut self, name: impl Into<String>, references: Vec<ConstantToken>) -> Self {
        self.kernels.push(KernelEntry {
            name: name.into(),
            references,
        });
        self
    }

    /// Declare a constant in the metadata table without a kernel reference.
    #[must_use]
    pub fn with_constant(mut self, descriptor: ConstantDescriptor) -> Self {
        if !self.constants.iter().any(|c| c.token() == descriptor.token()) {
            self.constants.push(descriptor);
        }
        self
    }

    #[must_use]
    pub fn with_target(mut self, kind: DeviceKind) -> Self {
        if !self.targets.contains(&kind) {
            self.targets.push(kind);
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kernels(&self) -> &[KernelEntry] {
        &self.kernels
    }

    #[must_use]
    pub fn constants(&self) -> &[ConstantDescriptor] {
        &self.constants
    }

    #[must_use]
    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.iter().any(|k| k.name == name)
    }

    /// True if the image can run on every device in `devices`.
    #[must_use]
    pub fn supports_all(&self, devices: &[DeviceDescriptor]) -> bool {
        devices.iter().all(|d| self.targets.contains(&d.kind))
    }
}
