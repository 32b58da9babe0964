//! Program builds from source and from persisted binaries.

use std::fs;
use std::path::Path;

use log::{debug, trace};
use opencl3::context::Context;
use opencl3::program::Program as ClProgram;
use opencl3::types::cl_device_id;

use crate::error::{Result, RuntimeError};

/// Orders the compilation units: every header, then the primary source.
pub(crate) fn assemble_units<'a>(headers: &'a [String], primary: &'a str) -> Vec<&'a str> {
    headers
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(primary))
        .collect()
}

/// Splits the `;`-separated entry point list reported by the driver.
pub(crate) fn split_kernel_names(names: &str) -> Vec<String> {
    names
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn build_from_source(
    context: &Context,
    device: cl_device_id,
    path: &Path,
    headers: &[String],
    options: &str,
) -> Result<ClProgram> {
    let primary = fs::read_to_string(path)?;
    let units = assemble_units(headers, &primary);
    debug!(
        "Building {} ({} header(s)) with options {:?}",
        path.display(),
        headers.len(),
        options
    );

    let mut program = ClProgram::create_from_sources(context, &units).map_err(|e| {
        RuntimeError::CompileError {
            log: format!("Failed to create program from source: {:?}", e),
        }
    })?;

    if let Err(e) = program.build(&[device], options) {
        return Err(RuntimeError::CompileError {
            log: build_log_or_status(&program, device, &format!("{:?}", e)),
        });
    }
    trace!(
        "Build log for {}:\n{}",
        path.display(),
        program.get_build_log(device).unwrap_or_default()
    );
    Ok(program)
}

pub(crate) fn build_from_binary(
    context: &Context,
    device: cl_device_id,
    path: &Path,
) -> Result<ClProgram> {
    let binary = fs::read(path)?;
    if binary.is_empty() {
        return Err(RuntimeError::BinaryLoad(format!(
            "{} is empty",
            path.display()
        )));
    }
    debug!("Loading {} byte binary from {}", binary.len(), path.display());

    let mut program = unsafe {
        ClProgram::create_from_binary(context, &[device], &[binary.as_slice()])
            .map_err(|e| RuntimeError::BinaryLoad(format!("{:?}", e)))?
    };

    if let Err(e) = program.build(&[device], "") {
        return Err(RuntimeError::CompileError {
            log: build_log_or_status(&program, device, &format!("{:?}", e)),
        });
    }
    Ok(program)
}

/// Returns the binary of `program` for its (single) device.
pub(crate) fn binary_of(program: &ClProgram) -> Result<Vec<u8>> {
    let binaries = program
        .get_binaries()
        .map_err(|e| RuntimeError::ModuleExtraction(format!("{:?}", e)))?;

    match binaries.into_iter().next() {
        Some(binary) if !binary.is_empty() => Ok(binary),
        _ => Err(RuntimeError::ModuleExtraction(
            "driver returned an empty binary".into(),
        )),
    }
}

/// Entry points of a built program, empty when the driver cannot say.
pub(crate) fn kernel_names(program: &ClProgram) -> Vec<String> {
    program
        .get_kernel_names()
        .map(|names| split_kernel_names(&names))
        .unwrap_or_default()
}

fn build_log_or_status(program: &ClProgram, device: cl_device_id, status: &str) -> String {
    let log = program.get_build_log(device).unwrap_or_default();
    if log.trim().is_empty() {
        status.to_string()
    } else {
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_precede_primary() {
        let headers = vec![
            "#define N 16\n".to_string(),
            "typedef float real;\n".to_string(),
        ];
        let units = assemble_units(&headers, "__kernel void k() {}");
        assert_eq!(
            units,
            vec![
                "#define N 16\n",
                "typedef float real;\n",
                "__kernel void k() {}"
            ]
        );
    }

    #[test]
    fn test_primary_only() {
        assert_eq!(assemble_units(&[], "src"), vec!["src"]);
    }

    #[test]
    fn test_split_kernel_names() {
        assert_eq!(split_kernel_names("inc;scale"), vec!["inc", "scale"]);
        assert_eq!(split_kernel_names("single"), vec!["single"]);
        assert!(split_kernel_names("").is_empty());
        assert_eq!(split_kernel_names("a;;b;"), vec!["a", "b"]);
    }
}
