//! Build script for pocketlink-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bridge.toml at compile time
//! - Bakes the validated settings into `bridge_config.rs`

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use pocketlink_core::config::{BridgeConfig, ConfigError, TimingConfig};
use serde::Deserialize;

fn main() {
    setup_linker();
    let config = validate_config();
    generate_config(&config);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Layout of bridge.toml
#[derive(Debug, Deserialize)]
struct BridgeToml {
    #[serde(default)]
    serial: SerialSection,
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    bridge: BridgeSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SerialSection {
    baudrate: u32,
    data_bits: u8,
    parity: String,
    stop_bits: u8,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            data_bits: 8,
            parity: "none".into(),
            stop_bits: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BridgeSection {
    beep_on_fault: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            beep_on_fault: BridgeConfig::DEFAULT.beep_on_fault,
        }
    }
}

/// Validate bridge.toml configuration at compile time
fn validate_config() -> BridgeToml {
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a bridge.toml configuration file.         ║\n\
            ║  Please create one in the pocketlink-firmware directory.         ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: BridgeToml = match toml::from_str(&config_content) {
        Ok(config) => config,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid bridge.toml                                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = validate_serial(&config.serial);
    if let Err(e) = config.timing.validate() {
        errors.push(describe(e).to_string());
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid bridge configuration                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=bridge.toml validated successfully");
    config
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_serial(serial: &SerialSection) -> Vec<String> {
    let mut errors = Vec::new();

    if !(1_200..=921_600).contains(&serial.baudrate) {
        errors.push("[serial] baudrate must be 1200-921600".to_string());
    }
    if ![7, 8].contains(&serial.data_bits) {
        errors.push("[serial] data_bits must be 7 or 8".to_string());
    }
    if !["none", "even", "odd"].contains(&serial.parity.as_str()) {
        errors.push("[serial] parity must be 'none', 'even', or 'odd'".to_string());
    }
    if ![1, 2].contains(&serial.stop_bits) {
        errors.push("[serial] stop_bits must be 1 or 2".to_string());
    }

    errors
}

fn describe(err: ConfigError) -> &'static str {
    match err {
        ConfigError::ZeroTimeout => "[timing] timeouts must be non-zero",
        ConfigError::HandshakeExceedsHostTimeout => {
            "[timing] handshake_timeout_us must be below host_byte_timeout_ms"
        }
        ConfigError::SettleTooLong => "[timing] settle_us must be at most 1000",
        ConfigError::InvalidPollInterval => {
            "[timing] poll_interval_us must be 1..handshake_timeout_us"
        }
    }
}

/// Write the validated settings as Rust constants
fn generate_config(config: &BridgeToml) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let t = &config.timing;
    let s = &config.serial;

    let data_bits = if s.data_bits == 7 { "Seven" } else { "Eight" };
    let parity = match s.parity.as_str() {
        "even" => "Even",
        "odd" => "Odd",
        _ => "None",
    };
    let stop_bits = if s.stop_bits == 2 { "Two" } else { "One" };

    let code = format!(
        "pub const BRIDGE_CONFIG: BridgeConfig = BridgeConfig {{\n\
        \x20   timing: TimingConfig {{\n\
        \x20       host_byte_timeout_ms: {},\n\
        \x20       host_response_timeout_ms: {},\n\
        \x20       handshake_timeout_us: {},\n\
        \x20       settle_us: {},\n\
        \x20       poll_interval_us: {},\n\
        \x20       disk_command_timeout_ms: {},\n\
        \x20       tape_start_timeout_ms: {},\n\
        \x20       tape_silence_ms: {},\n\
        \x20   }},\n\
        \x20   beep_on_fault: {},\n\
        }};\n\
        \n\
        pub const SERIAL_CONFIG: SerialConfig = SerialConfig {{\n\
        \x20   baudrate: {},\n\
        \x20   data_bits: DataBits::{},\n\
        \x20   parity: Parity::{},\n\
        \x20   stop_bits: StopBits::{},\n\
        }};\n",
        t.host_byte_timeout_ms,
        t.host_response_timeout_ms,
        t.handshake_timeout_us,
        t.settle_us,
        t.poll_interval_us,
        t.disk_command_timeout_ms,
        t.tape_start_timeout_ms,
        t.tape_silence_ms,
        config.bridge.beep_on_fault,
        s.baudrate,
        data_bits,
        parity,
        stop_bits,
    );

    fs::write(out_dir.join("bridge_config.rs"), code).unwrap();
}
