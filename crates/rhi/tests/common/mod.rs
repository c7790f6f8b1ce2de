//! Shared setup for tests that need a Vulkan driver.

#![allow(dead_code)]

use std::sync::Arc;

use lightfield_rhi::device::Device;
use lightfield_rhi::instance::Instance;
use lightfield_rhi::physical_device::{PhysicalDeviceInfo, assign_queue_families};

/// Creates a headless instance, or `None` when no Vulkan driver is present.
pub fn headless_instance() -> Option<Instance> {
    // Skip test if the machine has no Vulkan loader (CI environment)
    if unsafe { ash::Entry::load() }.is_err() {
        println!("Skipping test: Vulkan loader not found");
        return None;
    }

    match Instance::new(None, false) {
        Ok(instance) => Some(instance),
        Err(e) => {
            println!("Skipping test: no usable Vulkan driver ({})", e);
            None
        }
    }
}

/// Creates a logical device on the first adapter with a graphics family.
///
/// The instance is returned alongside and must outlive the device.
pub fn headless_device() -> Option<(Instance, Arc<Device>)> {
    let instance = headless_instance()?;
    let handle = instance.handle();

    let devices = unsafe { handle.enumerate_physical_devices() }.ok()?;
    let info = devices.into_iter().find_map(|device| {
        let families = unsafe { handle.get_physical_device_queue_family_properties(device) };
        // Without a surface, assume every family can present.
        let queue_families = assign_queue_families(&families, |_| true)?;
        Some(PhysicalDeviceInfo {
            device,
            properties: unsafe { handle.get_physical_device_properties(device) },
            features: unsafe { handle.get_physical_device_features(device) },
            memory_properties: unsafe { handle.get_physical_device_memory_properties(device) },
            queue_family_properties: families,
            queue_families,
        })
    });
    let Some(info) = info else {
        println!("Skipping test: no adapter with a graphics queue");
        return None;
    };

    match Device::new(&instance, &info) {
        Ok(device) => Some((instance, device)),
        Err(e) => {
            println!("Skipping test: device creation failed ({})", e);
            None
        }
    }
}
