//! Backend contract and the value types shared by every backend.
//!
//! A backend owns all native state (device list, context, queues and every
//! object it issued a handle for). The [`Runtime`](crate::Runtime) facade
//! holds exactly one backend behind this trait and forwards to it.

use std::path::Path;

use bytemuck::Pod;

use crate::error::{Result, RuntimeError};
use crate::handle::{Kernel, Memory, MemoryAccess, MemoryKind, Program};

/// The first global extent of every dispatch must be a multiple of this.
pub const GLOBAL_SIZE_GRANULARITY: usize = 8;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Description of an enumerated platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    pub index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub profile: String,
    pub extensions: String,
}

/// Capabilities of an enumerated device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Index within the selected platform
    pub index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub driver_version: String,
    pub opencl_c_version: String,
    pub profile: String,
    pub extensions: String,
    /// Global memory size in bytes
    pub global_mem_size: u64,
    pub max_work_group_size: usize,
    pub max_work_item_dimensions: u32,
    pub max_work_item_sizes: Vec<usize>,
    pub compute_units: u32,
    /// Maximum clock frequency in MHz
    pub max_clock_mhz: u32,
    /// Maximum 2D image width and height, when images are supported
    pub image2d_max: Option<(usize, usize)>,
}

impl DeviceInfo {
    /// Rough peak throughput estimate in MFLOPS.
    pub fn estimated_mflops(&self) -> u64 {
        3 * 8 * u64::from(self.compute_units) * u64::from(self.max_clock_mhz)
    }

    pub fn image_support(&self) -> bool {
        self.image2d_max.is_some()
    }
}

/// A by-value or local-memory kernel argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw bytes of any plain-data value (vector types, structs, `size_t`)
    Bytes(Vec<u8>),
    /// Local memory of the given size in bytes
    Local(usize),
}

impl ArgValue {
    /// Copies the bytes of a plain-data value, e.g. `[f32; 4]` for a `float4`.
    pub fn from_pod<T: Pod>(value: &T) -> Self {
        ArgValue::Bytes(bytemuck::bytes_of(value).to_vec())
    }

    /// Number of bytes bound to the argument slot.
    pub fn size_bytes(&self) -> usize {
        match self {
            ArgValue::I32(_) | ArgValue::U32(_) | ArgValue::F32(_) => 4,
            ArgValue::I64(_) | ArgValue::U64(_) | ArgValue::F64(_) => 8,
            ArgValue::Bytes(bytes) => bytes.len(),
            ArgValue::Local(size) => *size,
        }
    }
}

macro_rules! impl_arg_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::$variant(value)
                }
            }
        )*
    };
}

impl_arg_from!(
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
);

/// Dispatch geometry: 1 to 3 dimensions, a global extent and an optional
/// work-group extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub dimension: u32,
    pub global: [usize; 3],
    pub local: Option<[usize; 3]>,
}

impl WorkSize {
    pub fn new(dimension: u32, global: [usize; 3]) -> Self {
        Self {
            dimension,
            global,
            local: None,
        }
    }

    /// One-dimensional dispatch over `n` work items.
    pub fn linear(n: usize) -> Self {
        Self::new(1, [n, 1, 1])
    }

    /// Set the work-group size
    pub fn with_local(mut self, local: [usize; 3]) -> Self {
        self.local = Some(local);
        self
    }

    /// Checks the geometry before anything is submitted.
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.dimension) {
            return Err(RuntimeError::InvalidWorkSize(format!(
                "dimension must be 1, 2 or 3 (got {})",
                self.dimension
            )));
        }

        let dims = self.dimension as usize;
        if self.global[..dims].contains(&0) {
            return Err(RuntimeError::InvalidWorkSize(format!(
                "global size {:?} has an empty dimension",
                &self.global[..dims]
            )));
        }
        if let Some(local) = &self.local {
            if local[..dims].contains(&0) {
                return Err(RuntimeError::InvalidWorkSize(format!(
                    "local size {:?} has an empty dimension",
                    &local[..dims]
                )));
            }
        }

        if self.global[0] % GLOBAL_SIZE_GRANULARITY != 0 {
            return Err(RuntimeError::GlobalSizeGranularity {
                extent: self.global[0],
                granularity: GLOBAL_SIZE_GRANULARITY,
            });
        }
        Ok(())
    }
}

/// Capability interface every accelerator backend implements.
///
/// Operations that touch the device block until the native operation has
/// completed. A backend is not meant to be shared between threads.
pub trait Backend: sealed::Sealed {
    /// Short backend name, e.g. `"OpenCL"`.
    fn name(&self) -> &str;

    /// Enumerates platforms and devices, selects one device and creates the
    /// context bound to it.
    ///
    /// Re-initializing shuts the backend down first, invalidating every
    /// handle issued so far.
    fn initialize(&mut self, platform: usize, device: usize, verbose: bool) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Platforms seen by the last `initialize`.
    fn platforms(&self) -> &[PlatformInfo];

    /// Devices of the selected platform.
    fn devices(&self) -> &[DeviceInfo];

    fn num_devices(&self) -> usize {
        self.devices().len()
    }

    /// Index of the device the context is bound to.
    fn current_device(&self) -> Option<usize>;

    /// Peak throughput estimate of an enumerated device, in MFLOPS.
    fn estimate_mflops(&self, device: usize) -> Result<u64>;

    /// Releases every native object and the context.
    fn shutdown(&mut self) -> Result<()>;

    /// Compiles `headers` followed by the source at `path` for the current
    /// device. `options` is passed to the native compiler verbatim.
    fn compile_source(&mut self, path: &Path, headers: &[String], options: &str)
    -> Result<Program>;

    /// Builds a program from a binary previously returned by
    /// [`extract_module`](Backend::extract_module).
    fn compile_binary(&mut self, path: &Path) -> Result<Program>;

    /// Returns the compiled binary of a built program.
    fn extract_module(&self, program: &Program) -> Result<Vec<u8>>;

    fn release_program(&mut self, program: Program) -> Result<()>;

    /// Creates a kernel for the entry point `name` of a built program.
    fn create_kernel(&mut self, program: &Program, name: &str) -> Result<Kernel>;

    fn release_kernel(&mut self, kernel: Kernel) -> Result<()>;

    /// Allocates `size` bytes of device memory. Contents are unspecified.
    fn allocate(&mut self, kind: MemoryKind, access: MemoryAccess, size: usize) -> Result<Memory>;

    fn free(&mut self, memory: Memory) -> Result<()>;

    /// Copies `data` into the start of `memory`, blocking until done.
    fn write(&mut self, device: usize, memory: &Memory, data: &[u8]) -> Result<()>;

    /// Fills `out` from the start of `memory`, blocking until done.
    fn read(&mut self, device: usize, memory: &Memory, out: &mut [u8]) -> Result<()>;

    /// Binds a memory object to argument `slot`, replacing the previous binding.
    fn bind_memory_argument(&mut self, kernel: &Kernel, slot: u32, memory: &Memory)
    -> Result<()>;

    /// Binds a value to argument `slot`, replacing the previous binding.
    fn bind_value_argument(&mut self, kernel: &Kernel, slot: u32, value: ArgValue) -> Result<()>;

    /// Dispatches `kernel` on `device` and waits for it to finish.
    fn execute(&mut self, device: usize, kernel: &Kernel, work: &WorkSize) -> Result<()>;
}
