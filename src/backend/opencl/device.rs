//! Platform and device discovery, device selection and context creation.

use log::{Level, debug, log};
use opencl3::context::Context;
use opencl3::device::{CL_DEVICE_TYPE_ALL, Device};
use opencl3::platform::{Platform, get_platforms};

use crate::backend::DeviceTarget;
use crate::backend::traits::{DeviceInfo, PlatformInfo};
use crate::error::{Result, RuntimeError, SelectionKind};

/// Everything `initialize` learned before the context exists.
pub(crate) struct Discovery {
    pub platforms: Vec<PlatformInfo>,
    pub devices: Vec<Device>,
    pub device_infos: Vec<DeviceInfo>,
}

/// Rejects an index outside `0..available`.
pub(crate) fn check_index(kind: SelectionKind, index: usize, available: usize) -> Result<()> {
    if index >= available {
        return Err(RuntimeError::DeviceSelectionOutOfRange {
            kind,
            index,
            available,
        });
    }
    Ok(())
}

/// Enumerates platforms, validates `platform_index` and enumerates every
/// device of the chosen platform.
pub(crate) fn discover(platform_index: usize, verbose: bool) -> Result<Discovery> {
    let level = if verbose { Level::Info } else { Level::Debug };

    let platforms = get_platforms()
        .map_err(|e| RuntimeError::PlatformEnumeration(format!("{:?}", e)))?;
    if platforms.is_empty() {
        return Err(RuntimeError::PlatformEnumeration(
            "No OpenCL platforms found".into(),
        ));
    }
    log!(level, "[OCL] Num platforms: {}", platforms.len());

    let platform_infos: Vec<PlatformInfo> = platforms
        .iter()
        .enumerate()
        .map(|(index, platform)| query_platform(index, platform))
        .collect();
    for info in &platform_infos {
        log_platform(level, info);
    }

    check_index(SelectionKind::Platform, platform_index, platforms.len())?;
    let platform = &platforms[platform_index];

    let device_ids = platform.get_devices(CL_DEVICE_TYPE_ALL).map_err(|e| {
        RuntimeError::DeviceEnumeration(format!(
            "Failed to get devices of platform {}: {:?}",
            platform_index, e
        ))
    })?;
    if device_ids.is_empty() {
        return Err(RuntimeError::DeviceEnumeration(format!(
            "Platform {} has no devices",
            platform_index
        )));
    }
    log!(level, "[OCL] # of devices = {}", device_ids.len());

    let devices: Vec<Device> = device_ids.into_iter().map(Device::new).collect();
    let device_infos: Vec<DeviceInfo> = devices
        .iter()
        .enumerate()
        .map(|(index, device)| query_device(index, device))
        .collect();
    for info in &device_infos {
        log_device(level, info);
    }

    Ok(Discovery {
        platforms: platform_infos,
        devices,
        device_infos,
    })
}

/// Creates the context bound to the selected device.
pub(crate) fn create_context(device: &Device, target: DeviceTarget) -> Result<Context> {
    Context::from_device(device).map_err(|e| {
        let hint = match target {
            DeviceTarget::OpenClCpu => "the CPU target does not work on this platform",
            DeviceTarget::OpenClGpu | DeviceTarget::OpenClAccelerator => {
                "unsupported device? try the CPU target"
            }
        };
        RuntimeError::ContextCreation(format!("{:?} ({})", e, hint))
    })
}

fn query_platform(index: usize, platform: &Platform) -> PlatformInfo {
    PlatformInfo {
        index,
        name: platform.name().unwrap_or_else(|_| "Unknown".into()),
        vendor: platform.vendor().unwrap_or_default(),
        version: platform.version().unwrap_or_default(),
        profile: platform.profile().unwrap_or_default(),
        extensions: platform.extensions().unwrap_or_default(),
    }
}

fn query_device(index: usize, device: &Device) -> DeviceInfo {
    let image2d_max = if device.image_support().unwrap_or(false) {
        Some((
            device.image2d_max_width().unwrap_or(0),
            device.image2d_max_height().unwrap_or(0),
        ))
    } else {
        None
    };

    DeviceInfo {
        index,
        name: device.name().unwrap_or_else(|_| "Unknown".into()),
        vendor: device.vendor().unwrap_or_default(),
        version: device.version().unwrap_or_default(),
        driver_version: device.driver_version().unwrap_or_default(),
        opencl_c_version: device.opencl_c_version().unwrap_or_default(),
        profile: device.profile().unwrap_or_default(),
        extensions: device.extensions().unwrap_or_default(),
        global_mem_size: device.global_mem_size().unwrap_or(0),
        max_work_group_size: device.max_work_group_size().unwrap_or(0),
        max_work_item_dimensions: device.max_work_item_dimensions().unwrap_or(0),
        max_work_item_sizes: device.max_work_item_sizes().unwrap_or_default(),
        compute_units: device.max_compute_units().unwrap_or(0),
        max_clock_mhz: device.max_clock_frequency().unwrap_or(0),
        image2d_max,
    }
}

fn log_platform(level: Level, info: &PlatformInfo) {
    log!(level, "==> Platform [{}]", info.index);
    log!(level, "CL_PLATFORM_NAME:       {}", info.name);
    log!(level, "CL_PLATFORM_PROFILE:    {}", info.profile);
    log!(level, "CL_PLATFORM_VERSION:    {}", info.version);
    log!(level, "CL_PLATFORM_VENDOR:     {}", info.vendor);
    log!(level, "CL_PLATFORM_EXTENSIONS: {}", info.extensions);
}

fn log_device(level: Level, info: &DeviceInfo) {
    log!(level, "==> Device [{}] ========================", info.index);
    log!(level, "CL_DEVICE_NAME: {}", info.name);
    log!(level, "CL_DEVICE_VENDOR: {}", info.vendor);
    log!(level, "CL_DEVICE_OPENCL_C_VERSION: {}", info.opencl_c_version);
    log!(level, "CL_DEVICE_PROFILE: {}", info.profile);
    log!(level, "CL_DEVICE_VERSION: {}", info.version);
    log!(level, "CL_DRIVER_VERSION: {}", info.driver_version);
    log!(level, "CL_DEVICE_EXTENSIONS: {}", info.extensions);
    log!(level, "CL_DEVICE_IMAGE_SUPPORT: {}", info.image_support());
    if let Some((width, height)) = info.image2d_max {
        log!(level, "CL_DEVICE_IMAGE2D_MAX_WIDTH: {}", width);
        log!(level, "CL_DEVICE_IMAGE2D_MAX_HEIGHT: {}", height);
    }
    log!(level, "CL_DEVICE_GLOBAL_MEM_SIZE: {}", info.global_mem_size);
    log!(level, "CL_DEVICE_MAX_WORK_GROUP_SIZE: {}", info.max_work_group_size);
    log!(
        level,
        "CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS: {}",
        info.max_work_item_dimensions
    );
    log!(
        level,
        "CL_DEVICE_MAX_WORK_ITEM_SIZES: {:?}",
        info.max_work_item_sizes
    );
    debug!(
        "device {} estimated peak: {} MFLOPS",
        info.index,
        info.estimated_mflops()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_index_in_range() {
        assert!(check_index(SelectionKind::Platform, 0, 1).is_ok());
        assert!(check_index(SelectionKind::Device, 2, 3).is_ok());
    }

    #[test]
    fn test_check_index_out_of_range() {
        let err = check_index(SelectionKind::Platform, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::DeviceSelectionOutOfRange {
                kind: SelectionKind::Platform,
                index: 1,
                available: 1,
            }
        ));

        let err = check_index(SelectionKind::Device, 0, 0).unwrap_err();
        assert!(err.is_fatal());
    }
}
