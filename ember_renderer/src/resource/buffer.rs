/// GPU buffer bound to its own device memory allocation
///
/// A `GpuBuffer` exclusively owns one buffer object and the memory backing it.
/// Memory is allocated with the size the driver reports, from the first memory
/// type that satisfies the requested properties. Host-visible buffers can be
/// written by map/copy/unmap or through a persistent mapping; device-local
/// buffers are filled by copying from a staging buffer on the GPU.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::device::{
    find_memory_type, BufferCreateDesc, BufferHandle, BufferUsage, DeviceMemoryHandle,
    GraphicsDevice, MappedMemory, MemoryProperty,
};
use crate::command::TransientCommandExecutor;
use crate::{engine_error, engine_trace};

/// Owned buffer plus memory
///
/// A buffer may be moved to another thread but never shared between
/// threads: host reads and writes through `&self` are unsynchronized.
///
/// ```compile_fail
/// fn shared_across_threads<T: Sync>() {}
/// shared_across_threads::<ember_renderer::ember::resource::GpuBuffer>();
/// ```
pub struct GpuBuffer {
    device: Arc<dyn GraphicsDevice>,
    buffer: BufferHandle,
    memory: DeviceMemoryHandle,
    size: u64,
    /// Bytes actually allocated (driver-reported requirement)
    allocation_size: u64,
    usage: BufferUsage,
    properties: MemoryProperty,
    mapped: Option<MappedMemory>,
}

impl GpuBuffer {
    /// Create a buffer of `size` bytes backed by memory with `properties`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        size: u64,
        usage: BufferUsage,
        properties: MemoryProperty,
    ) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidResource("Buffer size must be non-zero".to_string()));
        }

        let buffer = device
            .create_buffer(&BufferCreateDesc { size, usage })
            .inspect_err(|e| engine_error!("ember::GpuBuffer", "Failed to create buffer: {}", e))?;

        let requirements = device.buffer_memory_requirements(buffer);
        let memory = match find_memory_type(device.memory_properties(), requirements.memory_type_bits, properties)
            .and_then(|type_index| device.allocate_memory(requirements.size, type_index))
        {
            Ok(memory) => memory,
            Err(e) => {
                engine_error!("ember::GpuBuffer", "Failed to allocate {} bytes: {}", requirements.size, e);
                device.destroy_buffer(buffer);
                return Err(e);
            }
        };

        if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
            engine_error!("ember::GpuBuffer", "Failed to bind buffer memory: {}", e);
            device.destroy_buffer(buffer);
            device.free_memory(memory);
            return Err(e);
        }

        engine_trace!("ember::GpuBuffer", "Created {} byte buffer ({:?}, {:?})", size, usage, properties);

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            allocation_size: requirements.size,
            usage,
            properties,
            mapped: None,
        })
    }

    /// Device-local buffer filled from `bytes` through a temporary staging buffer
    pub fn new_staged(
        device: Arc<dyn GraphicsDevice>,
        executor: &TransientCommandExecutor,
        bytes: &[u8],
        usage: BufferUsage,
    ) -> Result<Self> {
        let staging = Self::new(
            Arc::clone(&device),
            bytes.len() as u64,
            BufferUsage::TRANSFER_SRC,
            MemoryProperty::HOST_VISIBLE | MemoryProperty::HOST_COHERENT,
        )?;
        staging.upload(bytes)?;

        let buffer = Self::new(
            device,
            bytes.len() as u64,
            usage | BufferUsage::TRANSFER_DST,
            MemoryProperty::DEVICE_LOCAL,
        )?;
        buffer.copy_from(executor, &staging)?;
        Ok(buffer)
    }

    // ===== ACCESSORS =====

    pub fn handle(&self) -> BufferHandle {
        self.buffer
    }

    pub fn memory(&self) -> DeviceMemoryHandle {
        self.memory
    }

    /// Requested size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn allocation_size(&self) -> u64 {
        self.allocation_size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn properties(&self) -> MemoryProperty {
        self.properties
    }

    pub fn is_host_visible(&self) -> bool {
        self.properties.contains(MemoryProperty::HOST_VISIBLE)
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    // ===== HOST ACCESS =====

    fn check_host_range(&self, offset: u64, len: u64) -> Result<()> {
        if !self.is_host_visible() {
            return Err(Error::InvalidState("Buffer memory is not HOST_VISIBLE".to_string()));
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::InvalidResource(format!(
                "Range {}+{} exceeds buffer size {}",
                offset, len, self.size
            ))),
        }
    }

    /// Copy `data` to the start of the buffer
    pub fn upload(&self, data: &[u8]) -> Result<()> {
        self.upload_at(0, data)
    }

    /// Copy `data` into the buffer at `offset`
    pub fn upload_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_host_range(offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }

        if let Some(mapped) = &self.mapped {
            // SAFETY: the persistent mapping lives until unmap in Drop
            return unsafe { mapped.write(offset, data) };
        }

        let mapped = self.device.map_memory(self.memory, offset, data.len() as u64)?;
        // SAFETY: freshly mapped range of exactly data.len() bytes
        let written = unsafe { mapped.write(0, data) };
        self.device.unmap_memory(self.memory);
        written
    }

    /// Read `len` bytes from the start of the buffer
    pub fn read_back(&self, len: u64) -> Result<Vec<u8>> {
        self.check_host_range(0, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }

        if let Some(mapped) = &self.mapped {
            // SAFETY: the persistent mapping lives until unmap in Drop
            return unsafe { mapped.read(0, len as usize) };
        }

        let mapped = self.device.map_memory(self.memory, 0, len)?;
        // SAFETY: freshly mapped range of exactly len bytes
        let bytes = unsafe { mapped.read(0, len as usize) };
        self.device.unmap_memory(self.memory);
        bytes
    }

    /// Keep the whole buffer mapped until it is destroyed
    pub fn map_persistent(&mut self) -> Result<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        self.check_host_range(0, self.size)?;
        self.mapped = Some(self.device.map_memory(self.memory, 0, self.size)?);
        Ok(())
    }

    /// Write through the persistent mapping
    pub fn write_mapped(&self, offset: u64, data: &[u8]) -> Result<()> {
        match &self.mapped {
            // SAFETY: the persistent mapping lives until unmap in Drop
            Some(mapped) => unsafe { mapped.write(offset, data) },
            None => Err(Error::InvalidState("Buffer is not persistently mapped".to_string())),
        }
    }

    // ===== DEVICE COPY =====

    /// Copy all of `src` into the start of this buffer and wait for completion
    pub fn copy_from(&self, executor: &TransientCommandExecutor, src: &GpuBuffer) -> Result<()> {
        if src.size > self.size {
            return Err(Error::InvalidResource(format!(
                "Source buffer ({} bytes) larger than destination ({} bytes)",
                src.size, self.size
            )));
        }
        executor.copy_buffer(src.buffer, self.buffer, src.size)
    }

    /// Release the buffer now instead of at end of scope
    pub fn destroy(self) {}
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if self.mapped.take().is_some() {
            self.device.unmap_memory(self.memory);
        }
        self.device.destroy_buffer(self.buffer);
        self.device.free_memory(self.memory);
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
