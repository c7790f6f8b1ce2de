//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator initialization.
//!
//! # Overview
//!
//! The [`Device`] struct wraps the logical device created against the selected
//! adapter:
//! - The swapchain extension is required; a small set of optional extensions
//!   is enabled only when the adapter advertises them
//! - One queue is requested per distinct queue family
//! - Memory allocation goes through gpu-allocator
//!
//! Every resource wrapper in this crate holds an `Arc<Device>`, so the device
//! is destroyed only after all of its dependents.
//!
//! # Example
//!
//! ```no_run
//! use lightfield_rhi::device::Device;
//! use lightfield_rhi::instance::Instance;
//! use lightfield_rhi::physical_device::PhysicalDeviceInfo;
//!
//! # fn demo(instance: &Instance, info: &PhysicalDeviceInfo) {
//! let device = Device::new(instance, info).expect("Failed to create logical device");
//! let graphics_queue = device.graphics_queue();
//! # }
//! ```

use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info, warn};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Extensions the device cannot be created without.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Extensions enabled only when advertised by the adapter.
pub const OPTIONAL_DEVICE_EXTENSIONS: &[&CStr] = &[
    ash::khr::get_memory_requirements2::NAME,
    ash::khr::dedicated_allocation::NAME,
];

/// Resolves the extension list to enable.
///
/// Returns the missing required extension as the error.
pub fn resolve_extensions<'a>(
    available: &[&CStr],
    required: &[&'a CStr],
    optional: &[&'a CStr],
) -> Result<Vec<&'a CStr>, &'a CStr> {
    let mut enabled = Vec::with_capacity(required.len() + optional.len());

    for &ext in required {
        if !available.contains(&ext) {
            return Err(ext);
        }
        enabled.push(ext);
    }

    for &ext in optional {
        if available.contains(&ext) {
            enabled.push(ext);
        } else {
            warn!("Optional device extension {:?} not available, skipping", ext);
        }
    }

    Ok(enabled)
}

/// Distinct queue family indices in graphics, compute, transfer order.
///
/// One queue-create entry is issued per element.
pub fn queue_create_families(indices: &QueueFamilyIndices) -> Vec<u32> {
    let mut families = Vec::with_capacity(3);
    families.push(indices.graphics_family);

    if !families.contains(&indices.compute_family) {
        families.push(indices.compute_family);
    }
    if !families.contains(&indices.transfer_family) {
        families.push(indices.transfer_family);
    }

    families
}

/// Vulkan logical device wrapper.
///
/// # Thread Safety
///
/// The [`Device`] is designed to be shared across threads using `Arc`. The internal
/// allocator is protected by a `Mutex` for thread-safe memory allocation.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator. `None` only during drop.
    allocator: Option<Mutex<Allocator>>,
    /// Graphics queue handle, also used for presentation.
    graphics_queue: vk::Queue,
    /// Compute queue handle (may be the graphics queue).
    compute_queue: vk::Queue,
    /// Transfer queue handle (may be the graphics queue).
    transfer_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
    /// Memory properties of the adapter.
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The swapchain extension is not advertised
    /// - Device creation fails
    /// - Allocator initialization fails
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = physical_device_info.queue_families;

        let available_properties = unsafe {
            instance
                .handle()
                .enumerate_device_extension_properties(physical_device_info.device)?
        };
        let available: Vec<&CStr> = available_properties
            .iter()
            .filter_map(|props| props.extension_name_as_c_str().ok())
            .collect();

        let enabled_extensions = resolve_extensions(
            &available,
            REQUIRED_DEVICE_EXTENSIONS,
            OPTIONAL_DEVICE_EXTENSIONS,
        )
        .map_err(|missing| RhiError::MissingExtension(missing.to_string_lossy().into_owned()))?;

        let unique_families = queue_create_families(&queue_families);
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let supported = &physical_device_info.features;
        let features = vk::PhysicalDeviceFeatures::default()
            .shader_float64(supported.shader_float64 == vk::TRUE)
            .shader_storage_image_read_without_format(
                supported.shader_storage_image_read_without_format == vk::TRUE,
            );

        let extension_names: Vec<*const std::ffi::c_char> =
            enabled_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s): {:?}",
            enabled_extensions.len(),
            enabled_extensions
        );

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics_family, 0) };
        let compute_queue = unsafe { device.get_device_queue(queue_families.compute_family, 0) };
        let transfer_queue = unsafe { device.get_device_queue(queue_families.transfer_family, 0) };
        debug!(
            "Queues retrieved: graphics={}, compute={} (dedicated: {}), transfer={} (dedicated: {})",
            queue_families.graphics_family,
            queue_families.compute_family,
            queue_families.has_dedicated_compute(),
            queue_families.transfer_family,
            queue_families.has_dedicated_transfer()
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: Some(Mutex::new(allocator)),
            graphics_queue,
            compute_queue,
            transfer_queue,
            queue_families,
            memory_properties: physical_device_info.memory_properties,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue, which is the graphics queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the compute queue handle.
    #[inline]
    pub fn compute_queue(&self) -> vk::Queue {
        self.compute_queue
    }

    /// Returns the transfer queue handle.
    #[inline]
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns the adapter's memory properties.
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::LockPoisoned`] if another thread panicked while
    /// holding the lock.
    pub fn allocator(&self) -> Result<MutexGuard<'_, Allocator>, RhiError> {
        self.allocator
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("allocator already destroyed".to_string()))?
            .lock()
            .map_err(|_| RhiError::LockPoisoned)
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Waits for a single queue to become idle.
    pub fn queue_wait_idle(&self, queue: vk::Queue) -> Result<(), RhiError> {
        unsafe { self.device.queue_wait_idle(queue)? };
        Ok(())
    }

    /// Submits command buffers to the graphics queue.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - All command buffers are valid and recorded
    /// - Synchronization is properly handled
    /// - The fence (if provided) is not in use
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // All allocations are freed by now; the allocator must go before the device.
            drop(self.allocator.take());

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, queue handles are plain handles and the
// allocator is behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical_device::QueueFamilyIndices;

    #[test]
    fn test_required_extensions_defined() {
        assert_eq!(REQUIRED_DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
        assert!(!OPTIONAL_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_resolve_extensions_all_available() {
        let available = [
            ash::khr::swapchain::NAME,
            ash::khr::get_memory_requirements2::NAME,
            ash::khr::dedicated_allocation::NAME,
        ];
        let enabled = resolve_extensions(
            &available,
            REQUIRED_DEVICE_EXTENSIONS,
            OPTIONAL_DEVICE_EXTENSIONS,
        )
        .unwrap();
        assert_eq!(enabled.len(), 3);
        assert_eq!(enabled[0], ash::khr::swapchain::NAME);
    }

    #[test]
    fn test_resolve_extensions_omits_missing_optional() {
        let available = [ash::khr::swapchain::NAME, ash::khr::dedicated_allocation::NAME];
        let enabled = resolve_extensions(
            &available,
            REQUIRED_DEVICE_EXTENSIONS,
            OPTIONAL_DEVICE_EXTENSIONS,
        )
        .unwrap();
        assert_eq!(
            enabled,
            vec![ash::khr::swapchain::NAME, ash::khr::dedicated_allocation::NAME]
        );
    }

    #[test]
    fn test_resolve_extensions_missing_required() {
        let available = [ash::khr::get_memory_requirements2::NAME];
        let result = resolve_extensions(
            &available,
            REQUIRED_DEVICE_EXTENSIONS,
            OPTIONAL_DEVICE_EXTENSIONS,
        );
        assert_eq!(result, Err(ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_queue_create_count_matches_distinct_families() {
        let shared = QueueFamilyIndices {
            graphics_family: 0,
            compute_family: 0,
            transfer_family: 0,
        };
        assert_eq!(queue_create_families(&shared).len(), 1);

        let partial = QueueFamilyIndices {
            graphics_family: 0,
            compute_family: 2,
            transfer_family: 0,
        };
        assert_eq!(queue_create_families(&partial), vec![0, 2]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
