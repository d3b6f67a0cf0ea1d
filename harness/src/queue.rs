//! Queue and command groups: the host-side dispatch surface.
//!
//! A command group either names an executable bundle to run from
//! ([`CommandGroup::use_kernel_bundle`]) or sets constants directly
//! ([`CommandGroup::set_specialization_constant`]), never both. In the second
//! case the queue acquires an input bundle for the enqueued kernel, applies
//! the pending values, and builds it before dispatch.
//!
//! Kernels run on their own thread. The returned [`Event`] joins it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytemuck::Pod;
use tracing::{debug, info, warn};

use speck_kernel::build::{BuildOptions, BuildPipeline, DeviceCompiler};
use speck_kernel::bundle::{BundleOp, DeviceDescriptor, DeviceId, KernelBundle};
use speck_kernel::constant::{ConstantToken, SpecializationId, TypeDescriptor};
use speck_kernel::dispatch::{DispatchTarget, KernelHandler};
use speck_kernel::SpecConstError;

use crate::context::{acquire_bundle_for_kernels, Context};
use crate::error::DispatchError;

type KernelBody<R> = Box<dyn FnOnce(&KernelHandler<'_>) -> R + Send + 'static>;

/// Queue configuration.
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Device to submit to. `None` selects the context's first device.
    pub device: Option<DeviceId>,
    /// Options for bundles the queue builds implicitly.
    pub build: BuildOptions,
}

/// An in-order submission point bound to one device.
pub struct Queue {
    context: Arc<Context>,
    device: DeviceDescriptor,
    compiler: Arc<dyn DeviceCompiler>,
    build: BuildOptions,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("device", &self.device)
            .field("backend", &self.compiler.backend_id())
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Bind a queue to a device of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownDevice`] if the configured device is
    /// not in `context`, or [`DispatchError::Spec`] if the context has no
    /// devices at all.
    pub fn new(
        context: Arc<Context>,
        compiler: Arc<dyn DeviceCompiler>,
        config: QueueConfig,
    ) -> Result<Self, DispatchError> {
        let device = match config.device {
            Some(id) => context
                .device(id)
                .cloned()
                .ok_or(DispatchError::UnknownDevice { device: id })?,
            None => context
                .devices()
                .first()
                .cloned()
                .ok_or_else(|| SpecConstError::invalid_state("context has no devices"))?,
        };
        debug!(device = %device.id, backend = compiler.backend_id(), "queue created");
        Ok(Self {
            context,
            device,
            compiler,
            build: config.build,
        })
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Record a command group and dispatch the kernel it enqueues.
    ///
    /// # Errors
    ///
    /// - Any [`SpecConstError`] returned by `group`, wrapped in
    ///   [`DispatchError::Spec`].
    /// - [`DispatchError::NoKernel`] if `group` did not call
    ///   [`CommandGroup::single_task`].
    /// - [`DispatchError::Spec`] with `InvalidState` if an explicit bundle
    ///   was not built for this queue's device.
    /// - Any build error from the implicit bundle.
    pub fn submit<R, F>(&self, group: F) -> Result<Event<R>, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce(&mut CommandGroup<R>) -> Result<(), SpecConstError>,
    {
        let mut cgh = CommandGroup::new();
        group(&mut cgh)?;
        let (kernel, body) = cgh.task.ok_or(DispatchError::NoKernel)?;

        let _span = tracing::info_span!("submit", kernel = %kernel, device = %self.device.id).entered();
        let executable = match cgh.bundle {
            Some(bundle) => {
                if !bundle.devices().contains(&self.device) {
                    return Err(SpecConstError::invalid_state(format!(
                        "{} was not built for device {}",
                        bundle.id(),
                        self.device.id
                    ))
                    .into());
                }
                bundle
            }
            None => self.specialize(&kernel, &cgh.pending)?,
        };

        let target = DispatchTarget::new(&executable, &kernel)?;
        info!(bundle = %target.bundle(), "dispatching");
        let handle = thread::Builder::new()
            .name(format!("speck-{kernel}"))
            .spawn(move || target.run(body))
            .map_err(|e| DispatchError::Spawn {
                detail: e.to_string(),
            })?;
        Ok(Event { kernel, handle })
    }

    fn specialize(
        &self,
        kernel: &str,
        pending: &BTreeMap<ConstantToken, PendingValue>,
    ) -> Result<KernelBundle, SpecConstError> {
        let mut input =
            acquire_bundle_for_kernels(&self.context, std::slice::from_ref(&self.device), &[kernel])?;
        for (&token, value) in pending {
            input.set_raw(token, &value.ty, &value.bytes)?;
        }
        debug!(bundle = %input.id(), overrides = pending.len(), "building implicit bundle");
        BuildPipeline::with_options(self.compiler.as_ref(), self.build.clone()).build(&input)
    }
}

#[derive(Debug, Clone)]
struct PendingValue {
    ty: TypeDescriptor,
    bytes: Vec<u8>,
}

/// Host-side recording of one submission.
pub struct CommandGroup<R> {
    bundle: Option<KernelBundle>,
    pending: BTreeMap<ConstantToken, PendingValue>,
    task: Option<(String, KernelBody<R>)>,
}

impl<R> CommandGroup<R> {
    fn new() -> Self {
        Self {
            bundle: None,
            pending: BTreeMap::new(),
            task: None,
        }
    }

    /// Run this group's kernel from `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] if `bundle` is not
    /// `Executable`, or if constants were already set on this group.
    pub fn use_kernel_bundle(&mut self, bundle: &KernelBundle) -> Result<(), SpecConstError> {
        if !self.pending.is_empty() {
            return Err(SpecConstError::invalid_state(
                "use_kernel_bundle after set_specialization_constant in one command group",
            ));
        }
        bundle.machine().guard(BundleOp::Dispatch)?;
        self.bundle = Some(bundle.clone());
        Ok(())
    }

    /// Set a constant for the implicit bundle this group will build.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] if an explicit bundle is in
    /// use.
    pub fn set_specialization_constant<T: Pod>(
        &mut self,
        id: &SpecializationId<T>,
        value: T,
    ) -> Result<(), SpecConstError> {
        if let Some(bundle) = &self.bundle {
            return Err(SpecConstError::invalid_state(format!(
                "cannot set constants while {} is in use",
                bundle.id()
            )));
        }
        self.pending.insert(
            id.token(),
            PendingValue {
                ty: TypeDescriptor::of::<T>(),
                bytes: bytemuck::bytes_of(&value).to_vec(),
            },
        );
        Ok(())
    }

    /// Host-visible value of `id` for this group.
    ///
    /// The explicit bundle's value if one is in use, else the value set on
    /// this group, else the declared default.
    ///
    /// # Errors
    ///
    /// Any error of [`KernelBundle::get`] for an explicit bundle.
    pub fn get_specialization_constant<T: Pod>(
        &self,
        id: &SpecializationId<T>,
    ) -> Result<T, SpecConstError> {
        if let Some(bundle) = &self.bundle {
            return bundle.get(id);
        }
        match self.pending.get(&id.token()) {
            Some(v) => Ok(bytemuck::pod_read_unaligned(&v.bytes)),
            None => Ok(id.default_value()),
        }
    }

    /// Enqueue `body` as this group's kernel.
    ///
    /// # Errors
    ///
    /// Returns [`SpecConstError::InvalidState`] if a kernel was already
    /// enqueued.
    pub fn single_task<K>(&mut self, kernel: &str, body: K) -> Result<(), SpecConstError>
    where
        K: FnOnce(&KernelHandler<'_>) -> R + Send + 'static,
    {
        if let Some((existing, _)) = &self.task {
            return Err(SpecConstError::invalid_state(format!(
                "command group already enqueued {existing:?}"
            )));
        }
        self.task = Some((kernel.to_string(), Box::new(body)));
        Ok(())
    }
}

/// Completion handle for a dispatched kernel.
#[derive(Debug)]
pub struct Event<R> {
    kernel: String,
    handle: JoinHandle<R>,
}

impl<R> Event<R> {
    #[must_use]
    pub fn kernel_name(&self) -> &str {
        &self.kernel
    }

    /// Block until the kernel finishes and return its result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::KernelPanicked`] if the kernel body panicked.
    pub fn wait(self) -> Result<R, DispatchError> {
        self.handle.join().map_err(|payload| {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(kernel = %self.kernel, %detail, "kernel panicked");
            DispatchError::KernelPanicked {
                kernel: self.kernel,
                detail,
            }
        })
    }
}
