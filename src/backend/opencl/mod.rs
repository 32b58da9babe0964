//! OpenCL backend built on `opencl3`.
//!
//! The backend binds one context to the selected device of the selected
//! platform. Command queues are created on demand, one per device, and only
//! the device the context was created for can get one.

mod buffer;
mod device;
mod kernel;
mod program;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use log::{debug, info};
use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::Device;
use opencl3::kernel::Kernel as ClKernel;
use opencl3::memory::Buffer as ClBuffer;
use opencl3::program::Program as ClProgram;

use super::DeviceTarget;
use super::traits::{ArgValue, Backend, DeviceInfo, PlatformInfo, WorkSize, sealed};
use crate::error::{Result, RuntimeError, SelectionKind};
use crate::handle::{
    HandleId, Kernel, Memory, MemoryAccess, MemoryKind, Program, ProgramOrigin, Registry,
    next_backend_id,
};

/// Native state that only exists between `initialize` and `shutdown`.
struct ContextState {
    device_index: usize,
    device: Device,
    queues: HashMap<usize, CommandQueue>,
    context: Context,
}

impl ContextState {
    /// Returns the in-order queue of `device`, creating it on first use.
    fn queue(&mut self, device: usize) -> Result<&CommandQueue> {
        if device != self.device_index {
            return Err(RuntimeError::QueueUnavailable(device));
        }
        match self.queues.entry(device) {
            Entry::Occupied(entry) => Ok(&*entry.into_mut()),
            Entry::Vacant(entry) => {
                #[allow(deprecated)]
                let queue = CommandQueue::create_default(&self.context, 0).map_err(|e| {
                    debug!("Failed to create queue for device {}: {:?}", device, e);
                    RuntimeError::QueueUnavailable(device)
                })?;
                debug!("Created command queue for device {}", device);
                Ok(&*entry.insert(queue))
            }
        }
    }
}

/// A native kernel and the memory objects bound to its slots.
///
/// The driver does not retain memory bound to a kernel, so a dispatch is
/// refused while any bound memory object has been freed.
struct KernelEntry {
    kernel: ClKernel,
    memory_args: HashMap<u32, HandleId>,
}

/// OpenCL implementation of [`Backend`].
///
/// Creating the value makes no native call; everything native happens in
/// [`initialize`](Backend::initialize).
pub struct OpenClBackend {
    target: DeviceTarget,
    verbose: bool,
    platforms: Vec<PlatformInfo>,
    devices: Vec<DeviceInfo>,
    kernels: Registry<KernelEntry>,
    programs: Registry<ClProgram>,
    buffers: Registry<ClBuffer<u8>>,
    state: Option<ContextState>,
}

impl OpenClBackend {
    pub fn new(target: DeviceTarget) -> Self {
        let id = next_backend_id();
        Self {
            target,
            verbose: false,
            platforms: Vec::new(),
            devices: Vec::new(),
            kernels: Registry::new(id, "kernel"),
            programs: Registry::new(id, "program"),
            buffers: Registry::new(id, "memory"),
            state: None,
        }
    }

    pub fn target(&self) -> DeviceTarget {
        self.target
    }

    fn state(&self) -> Result<&ContextState> {
        self.state.as_ref().ok_or(RuntimeError::NotInitialized)
    }

    /// Registers a freshly built program and provisions the current
    /// device's queue.
    fn finish_build(&mut self, built: ClProgram, origin: ProgramOrigin) -> Result<Program> {
        let state = self.state.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let device_index = state.device_index;
        state.queue(device_index)?;
        Ok(Program::new(self.programs.insert(built), origin))
    }
}

impl Default for OpenClBackend {
    fn default() -> Self {
        Self::new(DeviceTarget::default())
    }
}

impl sealed::Sealed for OpenClBackend {}

impl Backend for OpenClBackend {
    fn name(&self) -> &str {
        "OpenCL"
    }

    fn initialize(&mut self, platform: usize, device: usize, verbose: bool) -> Result<()> {
        if self.state.is_some() {
            debug!("Re-initializing: shutting down the previous context");
            self.shutdown()?;
        }
        self.verbose = verbose;

        let mut discovery = device::discover(platform, verbose)?;
        device::check_index(SelectionKind::Device, device, discovery.devices.len())?;
        let selected = discovery.devices.swap_remove(device);
        let context = device::create_context(&selected, self.target)?;

        self.platforms = discovery.platforms;
        self.devices = discovery.device_infos;
        let message = format!(
            "[OCL] Using platform {} device {} ({})",
            platform, device, self.devices[device].name
        );
        if verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }

        self.state = Some(ContextState {
            device_index: device,
            device: selected,
            queues: HashMap::new(),
            context,
        });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn platforms(&self) -> &[PlatformInfo] {
        &self.platforms
    }

    fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    fn current_device(&self) -> Option<usize> {
        self.state.as_ref().map(|state| state.device_index)
    }

    fn estimate_mflops(&self, device: usize) -> Result<u64> {
        device::check_index(SelectionKind::Device, device, self.devices.len())?;
        Ok(self.devices[device].estimated_mflops())
    }

    fn shutdown(&mut self) -> Result<()> {
        debug!(
            "Shutting down: {} kernel(s), {} program(s), {} buffer(s)",
            self.kernels.len(),
            self.programs.len(),
            self.buffers.len()
        );
        self.kernels.clear();
        self.programs.clear();
        self.buffers.clear();
        self.state = None;
        self.platforms.clear();
        self.devices.clear();
        Ok(())
    }

    fn compile_source(
        &mut self,
        path: &Path,
        headers: &[String],
        options: &str,
    ) -> Result<Program> {
        let state = self.state()?;
        let built =
            program::build_from_source(&state.context, state.device.id(), path, headers, options)?;
        if self.verbose {
            info!("Built program from {}", path.display());
        }
        self.finish_build(built, ProgramOrigin::Source)
    }

    fn compile_binary(&mut self, path: &Path) -> Result<Program> {
        let state = self.state()?;
        let built = program::build_from_binary(&state.context, state.device.id(), path)?;
        if self.verbose {
            info!("Loaded program binary {}", path.display());
        }
        self.finish_build(built, ProgramOrigin::Binary)
    }

    fn extract_module(&self, program: &Program) -> Result<Vec<u8>> {
        self.state()?;
        let built = self.programs.get(&program.id)?;
        program::binary_of(built)
    }

    fn release_program(&mut self, program: Program) -> Result<()> {
        self.programs.remove(&program.id).map(drop)
    }

    fn create_kernel(&mut self, program: &Program, name: &str) -> Result<Kernel> {
        self.state()?;
        let built = self.programs.get(&program.id)?;
        let created = kernel::create(built, name)?;
        let entry = KernelEntry {
            kernel: created,
            memory_args: HashMap::new(),
        };
        Ok(Kernel::new(self.kernels.insert(entry), name))
    }

    fn release_kernel(&mut self, kernel: Kernel) -> Result<()> {
        self.kernels.remove(&kernel.id).map(drop)
    }

    fn allocate(&mut self, kind: MemoryKind, access: MemoryAccess, size: usize) -> Result<Memory> {
        let state = self.state()?;
        let created = buffer::create(&state.context, access, size)?;
        debug!("Allocated {} bytes ({:?}, {:?})", size, access, kind);
        Ok(Memory::new(self.buffers.insert(created), size, access, kind))
    }

    fn free(&mut self, memory: Memory) -> Result<()> {
        self.buffers.remove(&memory.id).map(drop)
    }

    fn write(&mut self, device: usize, memory: &Memory, data: &[u8]) -> Result<()> {
        let state = self.state.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let target = self.buffers.get_mut(&memory.id)?;
        buffer::check_transfer(data.len(), memory.size())?;
        if data.is_empty() {
            return Ok(());
        }
        let queue = state.queue(device)?;
        buffer::enqueue_write(queue, target, data)?
            .wait()
            .map_err(RuntimeError::Transfer)
    }

    fn read(&mut self, device: usize, memory: &Memory, out: &mut [u8]) -> Result<()> {
        let state = self.state.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let source = self.buffers.get(&memory.id)?;
        buffer::check_transfer(out.len(), memory.size())?;
        if out.is_empty() {
            return Ok(());
        }
        let queue = state.queue(device)?;
        buffer::enqueue_read(queue, source, out)?
            .wait()
            .map_err(RuntimeError::Transfer)
    }

    fn bind_memory_argument(&mut self, kernel: &Kernel, slot: u32, memory: &Memory) -> Result<()> {
        self.state()?;
        let target = self.kernels.get_mut(&kernel.id)?;
        let bound = self.buffers.get(&memory.id)?;
        kernel::bind_buffer(&target.kernel, slot, bound)?;
        target.memory_args.insert(slot, memory.id.clone());
        Ok(())
    }

    fn bind_value_argument(&mut self, kernel: &Kernel, slot: u32, value: ArgValue) -> Result<()> {
        self.state()?;
        let target = self.kernels.get_mut(&kernel.id)?;
        kernel::bind_value(&target.kernel, slot, &value)?;
        target.memory_args.remove(&slot);
        Ok(())
    }

    fn execute(&mut self, device: usize, kernel: &Kernel, work: &WorkSize) -> Result<()> {
        let state = self.state.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let target = self.kernels.get(&kernel.id)?;
        work.validate()?;
        if let Some((slot, _)) = target
            .memory_args
            .iter()
            .find(|(_, id)| !self.buffers.contains(id))
        {
            return Err(RuntimeError::ArgumentBinding {
                slot: *slot,
                reason: "bound memory object was freed".into(),
            });
        }
        let queue = state.queue(device)?;
        kernel::enqueue(queue, &target.kernel, work)?
            .wait()
            .map_err(RuntimeError::Execution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_is_uninitialized() {
        let backend = OpenClBackend::new(DeviceTarget::OpenClCpu);
        assert_eq!(backend.name(), "OpenCL");
        assert_eq!(backend.target(), DeviceTarget::OpenClCpu);
        assert!(!backend.is_initialized());
        assert_eq!(backend.num_devices(), 0);
        assert!(backend.platforms().is_empty());
        assert_eq!(backend.current_device(), None);
    }

    #[test]
    fn test_operations_require_initialize() {
        let mut backend = OpenClBackend::default();
        assert!(matches!(
            backend.allocate(MemoryKind::DeviceGlobal, MemoryAccess::ReadWrite, 64),
            Err(RuntimeError::NotInitialized)
        ));
        assert!(matches!(
            backend.compile_source(Path::new("missing.cl"), &[], ""),
            Err(RuntimeError::NotInitialized)
        ));
        assert!(matches!(
            backend.compile_binary(Path::new("kernel.clbin")),
            Err(RuntimeError::NotInitialized)
        ));
    }

    #[test]
    fn test_estimate_before_initialize_is_out_of_range() {
        let backend = OpenClBackend::default();
        assert!(matches!(
            backend.estimate_mflops(0),
            Err(RuntimeError::DeviceSelectionOutOfRange {
                kind: SelectionKind::Device,
                index: 0,
                available: 0,
            })
        ));
    }

    #[test]
    fn test_shutdown_without_initialize_is_harmless() {
        let mut backend = OpenClBackend::default();
        assert!(backend.shutdown().is_ok());
        assert!(!backend.is_initialized());
    }
}
