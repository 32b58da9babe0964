//! Common test utilities for OpenCL integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use muda::{DeviceTarget, Runtime};

pub const EPSILON: f32 = 1e-5;

pub const INCREMENT_SOURCE: &str = r#"
__kernel void increment(__global float* data) {
    size_t i = get_global_id(0);
    data[i] = data[i] + 1.0f;
}
"#;

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

pub fn vec_approx_eq(a: &[f32], b: &[f32]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y))
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Returns an initialized runtime on platform 0, device 0, or `None` when
/// this machine has no usable OpenCL device.
pub fn setup_runtime() -> Option<Runtime> {
    init_logger();
    let mut runtime = Runtime::new(DeviceTarget::default());
    match runtime.initialize(0, 0, false) {
        Ok(()) => Some(runtime),
        Err(e) => {
            eprintln!("OpenCL device not available: {}", e);
            None
        }
    }
}

/// Writes `source` to `dir/name` and returns the path.
pub fn write_source(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).expect("failed to write kernel source");
    path
}
