//! The runtime facade.

use std::path::Path;

use bytemuck::Pod;

use crate::backend::{
    ArgValue, Backend, DeviceInfo, DeviceTarget, PlatformInfo, WorkSize, create_backend,
};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::handle::{Kernel, Memory, MemoryAccess, MemoryKind, Program};

/// Single entry point to a device backend.
///
/// Every call forwards to the backend chosen at construction.
pub struct Runtime {
    backend: Box<dyn Backend>,
}

impl Runtime {
    /// Creates an uninitialized runtime for `target`. No native call is made.
    pub fn new(target: DeviceTarget) -> Self {
        Self {
            backend: create_backend(target),
        }
    }

    /// Creates a runtime and initializes it with the selection in `config`.
    pub fn from_config(target: DeviceTarget, config: &RuntimeConfig) -> Result<Self> {
        let mut runtime = Self::new(target);
        runtime.initialize(config.platform, config.device, config.verbose)?;
        Ok(runtime)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn initialize(&mut self, platform: usize, device: usize, verbose: bool) -> Result<()> {
        self.backend.initialize(platform, device, verbose)
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_initialized()
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.backend.shutdown()
    }

    pub fn num_devices(&self) -> usize {
        self.backend.num_devices()
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        self.backend.devices()
    }

    pub fn platforms(&self) -> &[PlatformInfo] {
        self.backend.platforms()
    }

    pub fn current_device(&self) -> Option<usize> {
        self.backend.current_device()
    }

    /// Peak throughput estimate of `device` in MFLOPS.
    pub fn estimate_mflops(&self, device: usize) -> Result<u64> {
        self.backend.estimate_mflops(device)
    }

    pub fn compile_source(
        &mut self,
        path: impl AsRef<Path>,
        headers: &[String],
        options: &str,
    ) -> Result<Program> {
        self.backend.compile_source(path.as_ref(), headers, options)
    }

    pub fn compile_binary(&mut self, path: impl AsRef<Path>) -> Result<Program> {
        self.backend.compile_binary(path.as_ref())
    }

    pub fn extract_module(&self, program: &Program) -> Result<Vec<u8>> {
        self.backend.extract_module(program)
    }

    pub fn release_program(&mut self, program: Program) -> Result<()> {
        self.backend.release_program(program)
    }

    pub fn create_kernel(&mut self, program: &Program, name: &str) -> Result<Kernel> {
        self.backend.create_kernel(program, name)
    }

    pub fn release_kernel(&mut self, kernel: Kernel) -> Result<()> {
        self.backend.release_kernel(kernel)
    }

    pub fn allocate(
        &mut self,
        kind: MemoryKind,
        access: MemoryAccess,
        size: usize,
    ) -> Result<Memory> {
        self.backend.allocate(kind, access, size)
    }

    pub fn free(&mut self, memory: Memory) -> Result<()> {
        self.backend.free(memory)
    }

    pub fn write(&mut self, device: usize, memory: &Memory, data: &[u8]) -> Result<()> {
        self.backend.write(device, memory, data)
    }

    pub fn read(&mut self, device: usize, memory: &Memory, out: &mut [u8]) -> Result<()> {
        self.backend.read(device, memory, out)
    }

    /// Writes the bytes of `values` to the start of `memory`.
    pub fn write_slice<T: Pod>(
        &mut self,
        device: usize,
        memory: &Memory,
        values: &[T],
    ) -> Result<()> {
        self.write(device, memory, bytemuck::cast_slice(values))
    }

    /// Reads the first `len` elements of `memory`.
    pub fn read_vec<T: Pod>(
        &mut self,
        device: usize,
        memory: &Memory,
        len: usize,
    ) -> Result<Vec<T>> {
        let mut values = vec![T::zeroed(); len];
        self.read(device, memory, bytemuck::cast_slice_mut(&mut values))?;
        Ok(values)
    }

    pub fn bind_memory_argument(
        &mut self,
        kernel: &Kernel,
        slot: u32,
        memory: &Memory,
    ) -> Result<()> {
        self.backend.bind_memory_argument(kernel, slot, memory)
    }

    pub fn bind_value_argument(
        &mut self,
        kernel: &Kernel,
        slot: u32,
        value: impl Into<ArgValue>,
    ) -> Result<()> {
        self.backend.bind_value_argument(kernel, slot, value.into())
    }

    /// Binds the bytes of a plain-data value, e.g. `[f32; 4]` for a `float4`.
    pub fn bind_pod_argument<T: Pod>(
        &mut self,
        kernel: &Kernel,
        slot: u32,
        value: &T,
    ) -> Result<()> {
        self.backend
            .bind_value_argument(kernel, slot, ArgValue::from_pod(value))
    }

    pub fn execute(&mut self, device: usize, kernel: &Kernel, work: &WorkSize) -> Result<()> {
        self.backend.execute(device, kernel, work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::handle::Registry;

    fn detached_memory() -> Memory {
        let mut registry = Registry::new(usize::MAX, "memory");
        Memory::new(registry.insert(()), 16, MemoryAccess::ReadWrite, MemoryKind::Host)
    }

    #[test]
    fn test_typed_calls_require_initialize() {
        let mut runtime = Runtime::new(DeviceTarget::default());
        assert!(matches!(
            runtime.read_vec::<f32>(0, &detached_memory(), 0),
            Err(RuntimeError::NotInitialized)
        ));
        assert!(matches!(
            runtime.write_slice(0, &detached_memory(), &[1u16, 2, 3]),
            Err(RuntimeError::NotInitialized)
        ));
    }

    #[test]
    fn test_new_runtime_is_uninitialized() {
        let mut runtime = Runtime::new(DeviceTarget::OpenClGpu);
        #[cfg(feature = "opencl")]
        assert_eq!(runtime.backend_name(), "OpenCL");
        assert!(!runtime.is_initialized());
        assert_eq!(runtime.num_devices(), 0);
        assert!(matches!(
            runtime.allocate(MemoryKind::DeviceGlobal, MemoryAccess::ReadWrite, 16),
            Err(RuntimeError::NotInitialized)
        ));
    }
}
