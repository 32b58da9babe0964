//! Backend selection.
//!
//! Every device target currently maps to the OpenCL backend; the target only
//! changes the hint reported when context creation fails. Without the
//! `opencl` feature every target maps to [`UnavailableBackend`].

#[cfg(feature = "opencl")]
pub mod opencl;
pub mod traits;
#[cfg(not(feature = "opencl"))]
pub mod unavailable;

#[cfg(feature = "opencl")]
pub use opencl::OpenClBackend;
pub use traits::{
    ArgValue, Backend, DeviceInfo, GLOBAL_SIZE_GRANULARITY, PlatformInfo, WorkSize,
};
#[cfg(not(feature = "opencl"))]
pub use unavailable::UnavailableBackend;

/// Kind of device a runtime is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceTarget {
    OpenClCpu,
    #[default]
    OpenClGpu,
    OpenClAccelerator,
}

impl DeviceTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTarget::OpenClCpu => "cpu",
            DeviceTarget::OpenClGpu => "gpu",
            DeviceTarget::OpenClAccelerator => "accel",
        }
    }
}

impl std::fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates the backend serving `target`. No native call is made.
#[cfg(feature = "opencl")]
pub fn create_backend(target: DeviceTarget) -> Box<dyn Backend> {
    match target {
        DeviceTarget::OpenClCpu | DeviceTarget::OpenClGpu | DeviceTarget::OpenClAccelerator => {
            Box::new(OpenClBackend::new(target))
        }
    }
}

/// Creates the backend serving `target`. No native call is made.
#[cfg(not(feature = "opencl"))]
pub fn create_backend(target: DeviceTarget) -> Box<dyn Backend> {
    Box::new(UnavailableBackend::new(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[cfg(feature = "opencl")]
    #[rstest]
    #[case(DeviceTarget::OpenClCpu)]
    #[case(DeviceTarget::OpenClGpu)]
    #[case(DeviceTarget::OpenClAccelerator)]
    fn test_every_target_selects_opencl(#[case] target: DeviceTarget) {
        let backend = create_backend(target);
        assert_eq!(backend.name(), "OpenCL");
        assert!(!backend.is_initialized());
        assert_eq!(backend.num_devices(), 0);
    }

    #[cfg(not(feature = "opencl"))]
    #[rstest]
    #[case(DeviceTarget::OpenClCpu)]
    #[case(DeviceTarget::OpenClGpu)]
    #[case(DeviceTarget::OpenClAccelerator)]
    fn test_every_target_is_unavailable(#[case] target: DeviceTarget) {
        let mut backend = create_backend(target);
        assert_eq!(backend.name(), "unavailable");
        assert!(matches!(
            backend.initialize(0, 0, false),
            Err(crate::error::RuntimeError::PlatformEnumeration(_))
        ));
    }

    #[test]
    fn test_default_target_is_gpu() {
        assert_eq!(DeviceTarget::default(), DeviceTarget::OpenClGpu);
        assert_eq!(DeviceTarget::default().to_string(), "gpu");
    }
}
