//! Muda: a unified device-execution runtime
//!
//! Muda hides the native accelerator API behind one facade: pick a platform
//! and device, compile kernel programs from source or from a persisted
//! binary, move data in and out of device memory and dispatch kernels over a
//! 1 to 3 dimensional index space.
//!
//! # Architecture
//!
//! - **runtime**: the [`Runtime`] facade, the only type callers need
//! - **backend**: the [`Backend`] contract and its OpenCL implementation,
//!   built with the default `opencl` feature
//! - **handle**: opaque [`Program`], [`Kernel`] and [`Memory`] handles
//! - **config**: [`RuntimeConfig`], read from `MUDA_*` environment variables
//! - **error**: [`RuntimeError`]
//!
//! # Example
//!
//! ```no_run
//! use muda::{DeviceTarget, MemoryAccess, MemoryKind, Runtime, WorkSize};
//!
//! # fn main() -> muda::Result<()> {
//! let mut rt = Runtime::new(DeviceTarget::OpenClGpu);
//! rt.initialize(0, 0, false)?;
//!
//! let program = rt.compile_source("increment.cl", &[], "")?;
//! let kernel = rt.create_kernel(&program, "increment")?;
//! let data = rt.allocate(MemoryKind::DeviceGlobal, MemoryAccess::ReadWrite, 256 * 4)?;
//! rt.write_slice(0, &data, &[0.0f32; 256])?;
//! rt.bind_memory_argument(&kernel, 0, &data)?;
//! rt.execute(0, &kernel, &WorkSize::linear(256))?;
//! let out: Vec<f32> = rt.read_vec(0, &data, 256)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Core Modules
// ============================================================================

pub mod backend;
pub mod config;
pub mod error;
pub mod handle;
pub mod runtime;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{
    ArgValue, Backend, DeviceInfo, DeviceTarget, GLOBAL_SIZE_GRANULARITY, PlatformInfo, WorkSize,
};
#[cfg(feature = "opencl")]
pub use backend::OpenClBackend;
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError, SelectionKind};
pub use handle::{Kernel, Memory, MemoryAccess, MemoryKind, Program, ProgramOrigin};
pub use runtime::Runtime;

/// File extension of persisted program binaries.
pub const BINARY_EXTENSION: &str = "clbin";

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::backend::{ArgValue, Backend, DeviceTarget, WorkSize};
    pub use crate::handle::{Kernel, Memory, MemoryAccess, MemoryKind, Program};
    pub use crate::runtime::Runtime;
}
