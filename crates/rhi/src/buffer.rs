//! Host-visible staging buffers.
//!
//! Images are filled from the host by writing into a [`StagingBuffer`] and
//! recording a buffer-to-image copy. The buffer lives in `CpuToGpu` memory,
//! which gpu-allocator keeps persistently mapped.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Transfer-source buffer with mapped memory.
pub struct StagingBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// Mapped allocation, taken on drop.
    allocation: Option<Allocation>,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
}

impl StagingBuffer {
    /// Creates a staging buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or creation/allocation fails.
    pub fn new(device: Arc<Device>, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: "staging",
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let mut this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
        };

        if let Some(allocation) = &this.allocation {
            unsafe {
                this.device.handle().bind_buffer_memory(
                    this.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        debug!("Created staging buffer: {} bytes", size);
        this.size = size;
        Ok(this)
    }

    /// Creates a staging buffer holding a copy of `data`.
    pub fn with_data(device: Arc<Device>, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, data.len() as vk::DeviceSize)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the buffer at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write would exceed the buffer or the memory is
    /// not mapped.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_range(self.size, offset, data.len())?;

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free staging allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking staging allocation: {e}"),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed staging buffer ({} bytes)", self.size);
    }
}

/// Rejects writes of `len` bytes at `offset` that do not fit in `size`.
fn check_write_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {offset} + data {len} > buffer {size}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_range_accepts_exact_fit() {
        assert!(check_write_range(16, 0, 16).is_ok());
        assert!(check_write_range(16, 8, 8).is_ok());
    }

    #[test]
    fn test_write_range_rejects_overflow() {
        assert!(check_write_range(16, 8, 9).is_err());
        assert!(check_write_range(16, u64::MAX, 1).is_err());
    }

    #[test]
    fn test_staging_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<StagingBuffer>();
    }
}
