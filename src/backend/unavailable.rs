//! Stand-in backend for builds without the `opencl` feature.

use std::path::Path;

use super::DeviceTarget;
use super::traits::{ArgValue, Backend, DeviceInfo, PlatformInfo, WorkSize, sealed};
use crate::error::{Result, RuntimeError, SelectionKind};
use crate::handle::{Kernel, Memory, MemoryAccess, MemoryKind, Program};

/// Backend that never finds a platform.
///
/// `initialize` always fails with `PlatformEnumeration`; every other
/// operation reports `NotInitialized`.
pub struct UnavailableBackend {
    target: DeviceTarget,
}

impl UnavailableBackend {
    pub fn new(target: DeviceTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> DeviceTarget {
        self.target
    }
}

impl sealed::Sealed for UnavailableBackend {}

impl Backend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn initialize(&mut self, _platform: usize, _device: usize, _verbose: bool) -> Result<()> {
        Err(RuntimeError::PlatformEnumeration(format!(
            "muda was built without the opencl feature ({} target)",
            self.target
        )))
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn platforms(&self) -> &[PlatformInfo] {
        &[]
    }

    fn devices(&self) -> &[DeviceInfo] {
        &[]
    }

    fn current_device(&self) -> Option<usize> {
        None
    }

    fn estimate_mflops(&self, device: usize) -> Result<u64> {
        Err(RuntimeError::DeviceSelectionOutOfRange {
            kind: SelectionKind::Device,
            index: device,
            available: 0,
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn compile_source(
        &mut self,
        _path: &Path,
        _headers: &[String],
        _options: &str,
    ) -> Result<Program> {
        Err(RuntimeError::NotInitialized)
    }

    fn compile_binary(&mut self, _path: &Path) -> Result<Program> {
        Err(RuntimeError::NotInitialized)
    }

    fn extract_module(&self, _program: &Program) -> Result<Vec<u8>> {
        Err(RuntimeError::NotInitialized)
    }

    fn release_program(&mut self, _program: Program) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn create_kernel(&mut self, _program: &Program, _name: &str) -> Result<Kernel> {
        Err(RuntimeError::NotInitialized)
    }

    fn release_kernel(&mut self, _kernel: Kernel) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn allocate(
        &mut self,
        _kind: MemoryKind,
        _access: MemoryAccess,
        _size: usize,
    ) -> Result<Memory> {
        Err(RuntimeError::NotInitialized)
    }

    fn free(&mut self, _memory: Memory) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn write(&mut self, _device: usize, _memory: &Memory, _data: &[u8]) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn read(&mut self, _device: usize, _memory: &Memory, _out: &mut [u8]) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn bind_memory_argument(
        &mut self,
        _kernel: &Kernel,
        _slot: u32,
        _memory: &Memory,
    ) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn bind_value_argument(
        &mut self,
        _kernel: &Kernel,
        _slot: u32,
        _value: ArgValue,
    ) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }

    fn execute(&mut self, _device: usize, _kernel: &Kernel, _work: &WorkSize) -> Result<()> {
        Err(RuntimeError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_reports_missing_platform() {
        let mut backend = UnavailableBackend::new(DeviceTarget::OpenClCpu);
        let err = backend.initialize(0, 0, true).unwrap_err();
        assert!(matches!(err, RuntimeError::PlatformEnumeration(_)));
        assert!(err.is_fatal());
        assert!(!backend.is_initialized());
        assert_eq!(backend.num_devices(), 0);
    }

    #[test]
    fn test_operations_are_refused() {
        let mut backend = UnavailableBackend::new(DeviceTarget::default());
        assert!(matches!(
            backend.allocate(MemoryKind::DeviceGlobal, MemoryAccess::ReadWrite, 64),
            Err(RuntimeError::NotInitialized)
        ));
        assert!(matches!(
            backend.compile_source(Path::new("kernel.cl"), &[], ""),
            Err(RuntimeError::NotInitialized)
        ));
        assert!(backend.shutdown().is_ok());
    }
}
