/// Buffer and device-memory types
///
/// Flag bits match the Vulkan bit values so backends convert with `from_raw`.

use std::ptr::NonNull;
use bitflags::bitflags;
use crate::error::{Error, Result};

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 0x0000_0001;
        const TRANSFER_DST = 0x0000_0002;
        const UNIFORM = 0x0000_0010;
        const STORAGE = 0x0000_0020;
        const INDEX = 0x0000_0040;
        const VERTEX = 0x0000_0080;
    }
}

bitflags! {
    /// Memory property flags of a memory type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryProperty: u32 {
        const DEVICE_LOCAL = 0x0000_0001;
        const HOST_VISIBLE = 0x0000_0002;
        const HOST_COHERENT = 0x0000_0004;
        const HOST_CACHED = 0x0000_0008;
    }
}

/// One memory type reported by the physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub property_flags: MemoryProperty,
    pub heap_index: u32,
}

/// Memory types reported by the physical device, in driver order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    pub memory_types: Vec<MemoryType>,
}

/// Driver-reported requirements of a buffer or image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Allocation size; may exceed the requested object size
    pub size: u64,
    pub alignment: u64,
    /// Bit `i` set when memory type `i` may back the object
    pub memory_type_bits: u32,
}

/// Descriptor for creating a buffer (exclusive sharing mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCreateDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
}

/// Region of a buffer-to-buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Select a memory type: the first index whose bit is set in `type_filter`
/// and whose property flags contain all of `required`.
///
/// No scoring is done; driver order decides between equally valid types.
pub fn find_memory_type(
    properties: &MemoryProperties,
    type_filter: u32,
    required: MemoryProperty,
) -> Result<u32> {
    properties
        .memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, memory_type)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
        .ok_or(Error::NoSuitableMemoryType {
            type_filter,
            properties: required,
        })
}

/// Host pointer to a mapped range of device memory
///
/// Valid only while the memory stays mapped; the owner of the mapping
/// (a `GpuBuffer`) is responsible for not using it after unmapping.
#[derive(Debug, Clone, Copy)]
pub struct MappedMemory {
    ptr: NonNull<u8>,
    len: u64,
}

// Moving the mapping to another thread is fine; sharing it is not. Host
// reads and writes through it are unsynchronized, so `MappedMemory` (and
// every `GpuBuffer`) stays `!Sync`.
unsafe impl Send for MappedMemory {}

impl MappedMemory {
    /// Wrap a pointer returned by a map call
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `len` bytes that stay valid until the
    /// memory is unmapped.
    pub unsafe fn new(ptr: *mut u8, len: u64) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::InvalidResource(format!(
                "mapped range {}..{} exceeds mapping of {} bytes",
                offset,
                offset.saturating_add(len as u64),
                self.len
            ))),
        }
    }

    /// Copy `data` into the mapping at `offset`
    ///
    /// # Safety
    ///
    /// The memory must still be mapped and not concurrently accessed by the GPU.
    pub unsafe fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset as usize), data.len());
        Ok(())
    }

    /// Copy `len` bytes out of the mapping at `offset`
    ///
    /// # Safety
    ///
    /// The memory must still be mapped and not concurrently written by the GPU.
    pub unsafe fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mut out = vec![0u8; len];
        std::ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset as usize), out.as_mut_ptr(), len);
        Ok(out)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
