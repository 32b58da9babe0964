//! Muda kernel compiler CLI
//!
//! Compiles an OpenCL kernel file on the selected platform and device and
//! optionally persists the compiled binary.

use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use muda::{BINARY_EXTENSION, DeviceTarget, Runtime, RuntimeConfig, RuntimeError};

/// Stem of the file written by `-c`.
const BINARY_STEM: &str = "kernel";

#[derive(Parser, Debug)]
#[command(name = "mudac")]
#[command(about = "Compile OpenCL kernels with the muda runtime")]
#[command(version)]
struct Cli {
    /// OpenCL kernel source file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Verbose mode
    #[arg(long)]
    verbose: bool,

    /// Platform ID [default: 0, or MUDA_PLATFORM]
    #[arg(long, value_name = "N")]
    platform: Option<usize>,

    /// Device ID [default: 0, or MUDA_DEVICE]
    #[arg(long, value_name = "N")]
    device: Option<usize>,

    /// Compiler options for the OpenCL compiler
    #[arg(long, value_name = "STRING", allow_hyphen_values = true)]
    clopt: Option<String>,

    /// Header file compiled ahead of the input (repeatable)
    #[arg(long = "header", value_name = "FILE")]
    headers: Vec<PathBuf>,

    /// Write the compiled binary to kernel.clbin
    #[arg(short = 'c')]
    emit_binary: bool,

    /// Device kind
    #[arg(long, default_value = "cpu")]
    target: Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    Cpu,
    Gpu,
    #[value(alias = "accelerator")]
    Accel,
}

impl From<Target> for DeviceTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Cpu => DeviceTarget::OpenClCpu,
            Target::Gpu => DeviceTarget::OpenClGpu,
            Target::Accel => DeviceTarget::OpenClAccelerator,
        }
    }
}

impl Cli {
    /// Environment settings with the command-line flags applied on top.
    fn config(&self, env: RuntimeConfig) -> RuntimeConfig {
        let mut config = env;
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if self.verbose {
            config.verbose = true;
        }
        if let Some(clopt) = &self.clopt {
            config.compile_options = clopt.clone();
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config(RuntimeConfig::from_env());

    let default_level = if config.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(&cli, &config) {
        match e.downcast_ref::<RuntimeError>() {
            Some(RuntimeError::CompileError { log }) => {
                eprintln!("Error: failed to compile {}", cli.input.display());
                eprintln!("{}", log);
            }
            Some(err) if err.is_fatal() => {
                eprintln!("Error: {}", err);
                eprintln!("Check --platform and --device; --verbose lists what was found.");
            }
            _ => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

/// Reads every header file into one source string each, in order.
fn read_headers(paths: &[PathBuf]) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    paths
        .iter()
        .map(|path| {
            fs::read_to_string(path).map_err(|e| {
                Box::<dyn std::error::Error>::from(format!(
                    "cannot read header {}: {}",
                    path.display(),
                    e
                ))
            })
        })
        .collect()
}

fn binary_path() -> PathBuf {
    Path::new(BINARY_STEM).with_extension(BINARY_EXTENSION)
}

fn run(cli: &Cli, config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let headers = read_headers(&cli.headers)?;

    let mut runtime = Runtime::from_config(cli.target.into(), config)?;
    log::info!("Number of devices: {}", runtime.num_devices());
    if let Some(device) = runtime.current_device() {
        log::info!(
            "Estimated peak of device {}: {} MFLOPS",
            device,
            runtime.estimate_mflops(device)?
        );
    }
    log::info!("clopts = {}", config.compile_options);

    let program = runtime.compile_source(&cli.input, &headers, &config.compile_options)?;
    log::info!("Compiled {}", cli.input.display());

    if cli.emit_binary {
        let binary = runtime.extract_module(&program)?;
        let path = binary_path();
        fs::write(&path, &binary)?;
        log::info!("Wrote {} bytes to {}", binary.len(), path.display());
    }

    runtime.release_program(program)?;
    runtime.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["mudac", "input.cl"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("input.cl"));
        assert!(!cli.verbose);
        assert!(!cli.emit_binary);
        assert!(cli.headers.is_empty());
        assert_eq!(cli.target, Target::Cpu);

        let config = cli.config(RuntimeConfig::default());
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from([
            "mudac",
            "--verbose",
            "--platform=1",
            "--device=2",
            "--clopt=-cl-mad-enable -DN=8",
            "--header=a.h",
            "--header=b.h",
            "-c",
            "--target=gpu",
            "input.cl",
        ])
        .unwrap();
        assert!(cli.emit_binary);
        assert_eq!(cli.headers, vec![PathBuf::from("a.h"), PathBuf::from("b.h")]);
        assert_eq!(DeviceTarget::from(cli.target), DeviceTarget::OpenClGpu);

        let config = cli.config(RuntimeConfig::default());
        assert_eq!(config.platform, 1);
        assert_eq!(config.device, 2);
        assert!(config.verbose);
        assert_eq!(config.compile_options, "-cl-mad-enable -DN=8");
    }

    #[test]
    fn test_flags_override_environment() {
        let env = RuntimeConfig::default()
            .with_platform(3)
            .with_device(1)
            .with_compile_options("-w");

        let cli = Cli::try_parse_from(["mudac", "--device=0", "input.cl"]).unwrap();
        let config = cli.config(env);
        assert_eq!(config.platform, 3);
        assert_eq!(config.device, 0);
        assert_eq!(config.compile_options, "-w");
    }

    #[test]
    fn test_missing_input_is_rejected() {
        assert!(Cli::try_parse_from(["mudac", "--verbose"]).is_err());
    }

    #[test]
    fn test_read_headers_in_order() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        writeln!(first, "#define WIDTH 8").unwrap();
        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "typedef float real;").unwrap();

        let headers =
            read_headers(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();
        assert_eq!(headers, vec!["#define WIDTH 8\n", "typedef float real;\n"]);

        assert!(read_headers(&[PathBuf::from("/nonexistent/header.h")]).is_err());
    }

    #[test]
    fn test_binary_path() {
        assert_eq!(binary_path(), PathBuf::from("kernel.clbin"));
    }
}
