//! Device memory objects and blocking transfers.

use std::ptr;

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::event::Event;
use opencl3::memory::{Buffer as ClBuffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY};
use opencl3::types::{CL_NON_BLOCKING, cl_mem_flags};

use crate::error::{Result, RuntimeError};
use crate::handle::MemoryAccess;

/// Completion signal of an enqueued command.
///
/// Dropping it releases the native event without waiting.
#[must_use]
pub(crate) struct Completion(Event);

impl Completion {
    /// Blocks until the command has finished.
    pub fn wait(self) -> std::result::Result<(), String> {
        self.0.wait().map_err(|e| format!("{:?}", e))
    }
}

impl From<Event> for Completion {
    fn from(event: Event) -> Self {
        Completion(event)
    }
}

pub(crate) fn access_flags(access: MemoryAccess) -> cl_mem_flags {
    match access {
        MemoryAccess::ReadOnly => CL_MEM_READ_ONLY,
        MemoryAccess::WriteOnly => CL_MEM_WRITE_ONLY,
        MemoryAccess::ReadWrite => CL_MEM_READ_WRITE,
    }
}

/// Rejects a transfer of `len` bytes into or out of a `capacity` byte buffer.
pub(crate) fn check_transfer(len: usize, capacity: usize) -> Result<()> {
    if len > capacity {
        return Err(RuntimeError::Transfer(format!(
            "{} bytes requested but the buffer holds {}",
            len, capacity
        )));
    }
    Ok(())
}

pub(crate) fn create(context: &Context, access: MemoryAccess, size: usize) -> Result<ClBuffer<u8>> {
    if size == 0 {
        return Err(RuntimeError::Allocation(
            "cannot allocate a zero-sized buffer".into(),
        ));
    }
    unsafe {
        ClBuffer::<u8>::create(context, access_flags(access), size, ptr::null_mut())
            .map_err(|e| RuntimeError::Allocation(format!("{} bytes: {:?}", size, e)))
    }
}

pub(crate) fn enqueue_write(
    queue: &CommandQueue,
    buffer: &mut ClBuffer<u8>,
    data: &[u8],
) -> Result<Completion> {
    let event = unsafe {
        queue
            .enqueue_write_buffer(buffer, CL_NON_BLOCKING, 0, data, &[])
            .map_err(|e| RuntimeError::Transfer(format!("write: {:?}", e)))?
    };
    Ok(event.into())
}

pub(crate) fn enqueue_read(
    queue: &CommandQueue,
    buffer: &ClBuffer<u8>,
    out: &mut [u8],
) -> Result<Completion> {
    let event = unsafe {
        queue
            .enqueue_read_buffer(buffer, CL_NON_BLOCKING, 0, out, &[])
            .map_err(|e| RuntimeError::Transfer(format!("read: {:?}", e)))?
    };
    Ok(event.into())
}
