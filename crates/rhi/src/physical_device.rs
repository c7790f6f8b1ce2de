//! Physical device (GPU) selection.
//!
//! Selection runs once at startup and produces an owned [`PhysicalDeviceInfo`]
//! that is passed to every component that needs it.
//!
//! # Overview
//!
//! 1. Enumerate all adapters
//! 2. Assign graphics, compute and transfer queue families per adapter
//! 3. Query the surface format and present-mode lists
//! 4. Score each adapter and keep the best valid one
//!
//! Scoring and queue assignment are pure functions over snapshots so they
//! can be exercised without a GPU.
//!
//! # Example
//!
//! ```no_run
//! use lightfield_rhi::physical_device::select_physical_device;
//! # fn demo(instance: &ash::Instance, surface: ash::vk::SurfaceKHR,
//! #         loader: &ash::khr::surface::Instance) {
//! let info = select_physical_device(instance, surface, loader)
//!     .expect("Failed to select physical device");
//! println!("Selected GPU: {}", info.device_name());
//! # }
//! ```

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Score bonus applied to discrete GPUs.
pub const DISCRETE_GPU_BONUS: u32 = 1000;

/// Queue family assignment for one adapter.
///
/// Graphics also drives presentation. Compute and transfer alias graphics
/// when the adapter has no dedicated family for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family supporting both graphics and presentation.
    pub graphics_family: u32,
    /// Dedicated compute family, or the graphics family.
    pub compute_family: u32,
    /// Dedicated transfer family, or the graphics family.
    pub transfer_family: u32,
}

impl QueueFamilyIndices {
    /// Returns true if compute runs on its own family.
    #[inline]
    pub fn has_dedicated_compute(&self) -> bool {
        self.compute_family != self.graphics_family
    }

    /// Returns true if transfer runs on its own family.
    #[inline]
    pub fn has_dedicated_transfer(&self) -> bool {
        self.transfer_family != self.graphics_family
    }
}

/// Assigns graphics, compute and transfer families from a family list.
///
/// `present_support` answers whether family `i` can present to the target
/// surface. Returns `None` if no family supports both graphics and present.
pub fn assign_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: impl Fn(u32) -> bool,
) -> Option<QueueFamilyIndices> {
    let usable = || {
        families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_count > 0)
            .map(|(i, family)| (i as u32, family.queue_flags))
    };

    let graphics_family = usable()
        .find(|&(i, flags)| flags.contains(vk::QueueFlags::GRAPHICS) && present_support(i))
        .map(|(i, _)| i)?;

    let compute_family = usable()
        .find(|(_, flags)| {
            flags.contains(vk::QueueFlags::COMPUTE) && !flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|(i, _)| i)
        .unwrap_or_else(|| {
            warn!("No dedicated compute queue family, sharing graphics family {graphics_family}");
            graphics_family
        });

    let transfer_family = usable()
        .find(|(_, flags)| {
            flags.contains(vk::QueueFlags::TRANSFER)
                && !flags.intersects(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
        .map(|(i, _)| i)
        .unwrap_or_else(|| {
            warn!("No dedicated transfer queue family, sharing graphics family {graphics_family}");
            graphics_family
        });

    Some(QueueFamilyIndices {
        graphics_family,
        compute_family,
        transfer_family,
    })
}

/// Snapshot of the properties that decide an adapter's score.
#[derive(Clone, Copy, Debug)]
pub struct AdapterCandidate {
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub queue_families: Option<QueueFamilyIndices>,
    pub format_count: usize,
    pub present_mode_count: usize,
}

/// Scores an adapter. `None` marks it invalid.
///
/// An adapter is invalid without a graphics+present family or with an empty
/// surface format or present mode list.
pub fn score_adapter(candidate: &AdapterCandidate) -> Option<u32> {
    if candidate.queue_families.is_none()
        || candidate.format_count == 0
        || candidate.present_mode_count == 0
    {
        return None;
    }

    let bonus = if candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        DISCRETE_GPU_BONUS
    } else {
        0
    };

    Some(candidate.max_image_dimension_2d.saturating_add(bonus))
}

/// Returns the index of the highest-scoring valid adapter.
///
/// Ties resolve to the first candidate in enumeration order.
pub fn select_best_adapter(candidates: &[AdapterCandidate]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (i, candidate) in candidates.iter().enumerate() {
        let Some(score) = score_adapter(candidate) else {
            continue;
        };
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((i, score));
        }
    }

    best.map(|(i, _)| i)
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Raw queue family list.
    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
    /// Assigned queue families.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        device_name(&self.properties)
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> &str {
    properties
        .device_name_as_c_str()
        .ok()
        .and_then(|name| name.to_str().ok())
        .unwrap_or("Unknown Device")
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

/// Selects the most suitable physical device for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if there are no adapters or every
/// adapter scores invalid.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut candidates = Vec::with_capacity(devices.len());
    let mut family_lists = Vec::with_capacity(devices.len());

    for &device in &devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = assign_queue_families(&families, |i| unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        });

        let format_count = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map(|formats| formats.len())
                .unwrap_or(0)
        };
        let present_mode_count = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map(|modes| modes.len())
                .unwrap_or(0)
        };

        let candidate = AdapterCandidate {
            device_type: properties.device_type,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            queue_families,
            format_count,
            present_mode_count,
        };

        match score_adapter(&candidate) {
            Some(score) => debug!(
                "GPU '{}' ({}) - Score: {}",
                device_name(&properties),
                device_type_name(properties.device_type),
                score
            ),
            None => debug!(
                "GPU '{}' skipped: graphics+present={}, formats={}, present modes={}",
                device_name(&properties),
                queue_families.is_some(),
                format_count,
                present_mode_count
            ),
        }

        candidates.push(candidate);
        family_lists.push(families);
    }

    let Some(best) = select_best_adapter(&candidates) else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let device = devices[best];
    let queue_families = candidates[best]
        .queue_families
        .ok_or(RhiError::NoSuitableGpu)?;

    let selected = PhysicalDeviceInfo {
        device,
        properties: unsafe { instance.get_physical_device_properties(device) },
        features: unsafe { instance.get_physical_device_features(device) },
        memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
        queue_family_properties: family_lists.swap_remove(best),
        queue_families,
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, queues: graphics={}, compute={}, transfer={}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        queue_families.graphics_family,
        queue_families.compute_family,
        queue_families.transfer_family
    );

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::queue_create_families;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn candidate(device_type: vk::PhysicalDeviceType, max_dim: u32) -> AdapterCandidate {
        AdapterCandidate {
            device_type,
            max_image_dimension_2d: max_dim,
            queue_families: Some(QueueFamilyIndices {
                graphics_family: 0,
                compute_family: 0,
                transfer_family: 0,
            }),
            format_count: 2,
            present_mode_count: 1,
        }
    }

    #[test]
    fn test_assign_dedicated_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = assign_queue_families(&families, |_| true).unwrap();
        assert_eq!(indices.graphics_family, 0);
        assert_eq!(indices.compute_family, 1);
        assert_eq!(indices.transfer_family, 2);
        assert_eq!(queue_create_families(&indices), vec![0, 1, 2]);
    }

    #[test]
    fn test_assign_falls_back_to_graphics() {
        let families =
            [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let indices = assign_queue_families(&families, |_| true).unwrap();
        assert_eq!(indices.compute_family, indices.graphics_family);
        assert_eq!(indices.transfer_family, indices.graphics_family);
        assert!(!indices.has_dedicated_compute());
        assert!(!indices.has_dedicated_transfer());
        assert_eq!(queue_create_families(&indices).len(), 1);
    }

    #[test]
    fn test_assign_requires_present_on_graphics_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = assign_queue_families(&families, |i| i == 1).unwrap();
        assert_eq!(indices.graphics_family, 1);

        assert!(assign_queue_families(&families, |_| false).is_none());
    }

    #[test]
    fn test_assign_skips_empty_families() {
        let mut empty = family(vk::QueueFlags::COMPUTE);
        empty.queue_count = 0;
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE), empty];
        let indices = assign_queue_families(&families, |_| true).unwrap();
        assert_eq!(indices.compute_family, 0);
    }

    #[test]
    fn test_transfer_with_compute_is_not_dedicated() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let indices = assign_queue_families(&families, |_| true).unwrap();
        assert_eq!(indices.compute_family, 1);
        assert_eq!(indices.transfer_family, 0);
        assert_eq!(queue_create_families(&indices), vec![0, 1]);
    }

    #[test]
    fn test_score_discrete_bonus() {
        let discrete = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        let integrated = candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        assert_eq!(score_adapter(&discrete), Some(16384 + DISCRETE_GPU_BONUS));
        assert_eq!(score_adapter(&integrated), Some(16384));
    }

    #[test]
    fn test_score_invalid_adapters() {
        let mut no_queues = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        no_queues.queue_families = None;
        let mut no_formats = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        no_formats.format_count = 0;
        let mut no_modes = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        no_modes.present_mode_count = 0;

        assert_eq!(score_adapter(&no_queues), None);
        assert_eq!(score_adapter(&no_formats), None);
        assert_eq!(score_adapter(&no_modes), None);
        assert_eq!(select_best_adapter(&[no_queues, no_formats, no_modes]), None);
    }

    #[test]
    fn test_select_highest_score() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384),
            candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 16384),
            candidate(vk::PhysicalDeviceType::CPU, 4096),
        ];
        assert_eq!(select_best_adapter(&candidates), Some(1));
    }

    #[test]
    fn test_select_ties_resolve_to_first() {
        let candidates = [
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 8192),
            candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 8192),
        ];
        assert_eq!(select_best_adapter(&candidates), Some(0));
        // Repeated selection over the same list is stable.
        assert_eq!(select_best_adapter(&candidates), Some(0));
    }

    #[test]
    fn test_select_skips_invalid_even_if_larger() {
        let mut invalid = candidate(vk::PhysicalDeviceType::DISCRETE_GPU, 32768);
        invalid.present_mode_count = 0;
        let candidates = [invalid, candidate(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096)];
        assert_eq!(select_best_adapter(&candidates), Some(1));
    }

    #[test]
    fn test_select_empty_list() {
        assert_eq!(select_best_adapter(&[]), None);
    }
}
