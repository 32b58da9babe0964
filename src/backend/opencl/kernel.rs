//! Kernel creation, argument binding and dispatch.

use std::ptr;

use log::trace;
use opencl3::command_queue::CommandQueue;
use opencl3::error_codes::ClError;
use opencl3::kernel::{Kernel as ClKernel, set_kernel_arg};
use opencl3::memory::Buffer as ClBuffer;
use opencl3::program::Program as ClProgram;
use opencl3::types::cl_uint;

use super::buffer::Completion;
use super::program;
use crate::backend::traits::{ArgValue, WorkSize};
use crate::error::{Result, RuntimeError};

pub(crate) fn create(program: &ClProgram, name: &str) -> Result<ClKernel> {
    ClKernel::create(program, name).map_err(|e| {
        let available = program::kernel_names(program);
        let reason = if available.is_empty() {
            format!("{:?}", e)
        } else {
            format!("{:?} (entry points: {})", e, available.join(", "))
        };
        RuntimeError::KernelCreation {
            name: name.to_string(),
            reason,
        }
    })
}

pub(crate) fn bind_buffer(kernel: &ClKernel, slot: u32, buffer: &ClBuffer<u8>) -> Result<()> {
    unsafe {
        kernel
            .set_arg(slot as cl_uint, buffer)
            .map_err(|e| binding_error(slot, e))
    }
}

pub(crate) fn bind_value(kernel: &ClKernel, slot: u32, value: &ArgValue) -> Result<()> {
    trace!("arg {} <- {:?}", slot, value);
    let slot_index = slot as cl_uint;
    if matches!(value, ArgValue::Bytes(bytes) if bytes.is_empty()) {
        return Err(RuntimeError::ArgumentBinding {
            slot,
            reason: "empty value".into(),
        });
    }
    let bound = unsafe {
        match value {
            ArgValue::I32(v) => kernel.set_arg(slot_index, v),
            ArgValue::U32(v) => kernel.set_arg(slot_index, v),
            ArgValue::I64(v) => kernel.set_arg(slot_index, v),
            ArgValue::U64(v) => kernel.set_arg(slot_index, v),
            ArgValue::F32(v) => kernel.set_arg(slot_index, v),
            ArgValue::F64(v) => kernel.set_arg(slot_index, v),
            ArgValue::Local(size) => kernel.set_arg_local_buffer(slot_index, *size),
            ArgValue::Bytes(bytes) => {
                set_kernel_arg(kernel.get(), slot_index, bytes.len(), bytes.as_ptr().cast())
                    .map_err(ClError)
            }
        }
    };
    bound.map_err(|e| binding_error(slot, e))
}

/// Enqueues the dispatch of an already validated `work`.
pub(crate) fn enqueue(
    queue: &CommandQueue,
    kernel: &ClKernel,
    work: &WorkSize,
) -> Result<Completion> {
    trace!(
        "dispatch dim={} global={:?} local={:?}",
        work.dimension, work.global, work.local
    );

    let local_ptr = match &work.local {
        Some(local) => local.as_ptr(),
        None => ptr::null(),
    };
    let event = unsafe {
        queue
            .enqueue_nd_range_kernel(
                kernel.get(),
                work.dimension as cl_uint,
                ptr::null(),
                work.global.as_ptr(),
                local_ptr,
                &[],
            )
            .map_err(|e| RuntimeError::Execution(format!("{:?}", e)))?
    };
    Ok(event.into())
}

fn binding_error(slot: u32, e: impl std::fmt::Debug) -> RuntimeError {
    RuntimeError::ArgumentBinding {
        slot,
        reason: format!("{:?}", e),
    }
}
