//! Backend-issued resource handles.
//!
//! A handle is an opaque ticket for a native object owned by the backend
//! that issued it. Handles are neither `Clone` nor `Copy`: operations that
//! destroy the native object take the handle by value, and lookups through a
//! released or foreign handle fail with [`RuntimeError::InvalidHandle`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, RuntimeError};

static NEXT_BACKEND_ID: AtomicUsize = AtomicUsize::new(0);

/// Returns a process-unique id for a new backend instance.
pub(crate) fn next_backend_id() -> usize {
    NEXT_BACKEND_ID.fetch_add(1, Ordering::SeqCst)
}

/// Identity of a native object: the issuing backend and its slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct HandleId {
    owner: usize,
    slot: usize,
}

/// Access mode of a memory object, fixed at allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryAccess {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// Placement hint for a memory object.
///
/// Backends without distinct memory spaces place every kind in global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryKind {
    Host,
    #[default]
    DeviceGlobal,
    DeviceCachedGlobal,
    DeviceConstant,
    DeviceTexture,
}

/// How a program was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramOrigin {
    Source,
    Binary,
}

/// A built program.
#[derive(Debug)]
pub struct Program {
    pub(crate) id: HandleId,
    origin: ProgramOrigin,
}

impl Program {
    pub(crate) fn new(id: HandleId, origin: ProgramOrigin) -> Self {
        Self { id, origin }
    }

    pub fn origin(&self) -> ProgramOrigin {
        self.origin
    }
}

/// A kernel entry point with positional argument slots.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) id: HandleId,
    name: String,
}

impl Kernel {
    pub(crate) fn new(id: HandleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Entry point name the kernel was created from.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A device-resident buffer.
#[derive(Debug)]
pub struct Memory {
    pub(crate) id: HandleId,
    size: usize,
    access: MemoryAccess,
    kind: MemoryKind,
}

impl Memory {
    pub(crate) fn new(id: HandleId, size: usize, access: MemoryAccess, kind: MemoryKind) -> Self {
        Self {
            id,
            size,
            access,
            kind,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn access(&self) -> MemoryAccess {
        self.access
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }
}

/// Slot table of native objects owned by one backend instance.
///
/// Slots are never reused, so a stale id cannot alias a newer object.
pub(crate) struct Registry<T> {
    owner: usize,
    what: &'static str,
    next_slot: usize,
    entries: HashMap<usize, T>,
}

impl<T> Registry<T> {
    pub fn new(owner: usize, what: &'static str) -> Self {
        Self {
            owner,
            what,
            next_slot: 0,
            entries: HashMap::new(),
        }
    }

    /// Stores a native object and returns its id.
    pub fn insert(&mut self, value: T) -> HandleId {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(slot, value);
        HandleId {
            owner: self.owner,
            slot,
        }
    }

    pub fn get(&self, id: &HandleId) -> Result<&T> {
        self.check_owner(id)?;
        self.entries
            .get(&id.slot)
            .ok_or(RuntimeError::InvalidHandle(self.what))
    }

    pub fn get_mut(&mut self, id: &HandleId) -> Result<&mut T> {
        self.check_owner(id)?;
        self.entries
            .get_mut(&id.slot)
            .ok_or(RuntimeError::InvalidHandle(self.what))
    }

    pub fn remove(&mut self, id: &HandleId) -> Result<T> {
        self.check_owner(id)?;
        self.entries
            .remove(&id.slot)
            .ok_or(RuntimeError::InvalidHandle(self.what))
    }

    /// Returns true while `id` refers to a live object of this registry.
    pub fn contains(&self, id: &HandleId) -> bool {
        id.owner == self.owner && self.entries.contains_key(&id.slot)
    }

    /// Drops every stored object. Previously issued ids stay invalid.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn check_owner(&self, id: &HandleId) -> Result<()> {
        if id.owner != self.owner {
            log::warn!(
                "{} handle issued by backend {} used with backend {}",
                self.what,
                id.owner,
                self.owner
            );
            return Err(RuntimeError::InvalidHandle(self.what));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_insert_get_remove() {
        let mut registry = Registry::new(7, "memory");
        let a = registry.insert("a");
        let b = registry.insert("b");
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert_eq!(*registry.get(&a).unwrap(), "a");
        *registry.get_mut(&b).unwrap() = "c";
        assert_eq!(registry.remove(&b).unwrap(), "c");

        assert!(matches!(
            registry.get(&b),
            Err(RuntimeError::InvalidHandle("memory"))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&a));
        assert!(!registry.contains(&b));
    }

    #[test]
    fn test_registry_rejects_foreign_ids() {
        let mut first = Registry::new(1, "kernel");
        let mut second = Registry::new(2, "kernel");
        let id = first.insert(10);
        second.insert(20);

        assert!(matches!(
            second.get(&id),
            Err(RuntimeError::InvalidHandle("kernel"))
        ));
        assert!(second.remove(&id).is_err());
        assert!(!second.contains(&id));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_registry_slots_not_reused_after_clear() {
        let mut registry = Registry::new(0, "program");
        let old = registry.insert(1);
        registry.clear();
        let new = registry.insert(2);

        assert!(registry.get(&old).is_err());
        assert_eq!(*registry.get(&new).unwrap(), 2);
    }

    #[test]
    fn test_backend_ids_are_unique() {
        let a = next_backend_id();
        let b = next_backend_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_memory_attributes() {
        let mut registry = Registry::new(0, "memory");
        let memory = Memory::new(
            registry.insert(()),
            1024,
            MemoryAccess::ReadOnly,
            MemoryKind::DeviceConstant,
        );
        assert_eq!(memory.size(), 1024);
        assert_eq!(memory.access(), MemoryAccess::ReadOnly);
        assert_eq!(memory.kind(), MemoryKind::DeviceConstant);
    }
}
