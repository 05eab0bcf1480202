// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const SUPPORTED_SCHEMA_VERSION: &str = "1.0";

/// Number of register slots a `register_file` peripheral exposes.
pub const REGISTER_SLOTS: u8 = 4;

/// Minimum window a `register_file` peripheral must map (four 32-bit slots).
pub const REGISTER_WINDOW_BYTES: u64 = 16;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SUPPORTED_SCHEMA_VERSION.to_string()
}

fn check_schema_version(version: &str) -> Result<()> {
    if version != SUPPORTED_SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported schema_version '{}'. Supported versions: '{}'",
            version,
            SUPPORTED_SCHEMA_VERSION
        );
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64KB"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeripheralKind {
    /// Four 32-bit read/write slots at offsets 0, 4, 8 and 12.
    #[serde(alias = "axi_exit_dec", alias = "registers")]
    RegisterFile,
    /// Status-polled byte UART.
    Uart,
    /// Fixed read value, writes ignored.
    Stub,
}

/// Hardware fault injected into one slot of a simulated `register_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultConfig {
    /// Slot always reads back `value`.
    StuckAt { slot: u8, value: u32 },
    /// Writes to the slot are dropped.
    IgnoreWrites { slot: u8 },
    /// Reads of the slot come back with `mask` bits inverted.
    FlipBits { slot: u8, mask: u32 },
    /// Writes to `slot` also land in slot `to`.
    Alias { slot: u8, to: u8 },
}

impl FaultConfig {
    pub fn slot(&self) -> u8 {
        match *self {
            FaultConfig::StuckAt { slot, .. }
            | FaultConfig::IgnoreWrites { slot }
            | FaultConfig::FlipBits { slot, .. }
            | FaultConfig::Alias { slot, .. } => slot,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot() >= REGISTER_SLOTS {
            anyhow::bail!(
                "fault slot {} out of range (0..{})",
                self.slot(),
                REGISTER_SLOTS
            );
        }
        match *self {
            FaultConfig::Alias { slot, to } if to >= REGISTER_SLOTS || to == slot => {
                anyhow::bail!("alias target {} invalid for slot {}", to, slot)
            }
            FaultConfig::FlipBits { mask: 0, .. } => {
                anyhow::bail!("flip_bits mask must be non-zero")
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: PeripheralKind,
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub faults: Vec<FaultConfig>,
}

impl PeripheralConfig {
    /// Reads an optional unsigned integer from the free-form `config` map.
    pub fn config_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.config.get(key) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| {
                anyhow::anyhow!(
                    "config key '{}' of peripheral '{}' must be an unsigned integer",
                    key,
                    self.id
                )
            }),
        }
    }

    /// Mapped window size in bytes, if the descriptor declares one.
    pub fn window_size(&self) -> Result<Option<u64>> {
        self.size
            .as_deref()
            .map(parse_size)
            .transpose()
            .with_context(|| format!("Invalid size for peripheral '{}'", self.id))
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("peripheral id cannot be empty");
        }

        let size = self.window_size()?;
        if self.r#type == PeripheralKind::RegisterFile {
            if self.base_address % 4 != 0 {
                anyhow::bail!(
                    "register_file '{}' base {:#x} is not 4-byte aligned",
                    self.id,
                    self.base_address
                );
            }
            if let Some(size) = size {
                if size < REGISTER_WINDOW_BYTES {
                    anyhow::bail!(
                        "register_file '{}' maps {} bytes; at least {} are required",
                        self.id,
                        size,
                        REGISTER_WINDOW_BYTES
                    );
                }
            }
            if let Some(width) = self.config_u64("width")? {
                if !matches!(width, 8 | 16 | 32) {
                    anyhow::bail!(
                        "register_file '{}' width must be 8, 16 or 32 (got {})",
                        self.id,
                        width
                    );
                }
            }
        } else if !self.faults.is_empty() {
            anyhow::bail!(
                "faults are only supported on register_file peripherals ('{}')",
                self.id
            );
        }

        for fault in &self.faults {
            fault
                .validate()
                .with_context(|| format!("Invalid fault on peripheral '{}'", self.id))?;
        }
        Ok(())
    }
}

/// A simulated board: optional RAM, a console UART and a set of peripherals.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub ram: Option<MemoryRange>,
    /// Id of the UART that carries bring-up messages.
    #[serde(default)]
    pub console: Option<String>,
    pub peripherals: Vec<PeripheralConfig>,
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to open board descriptor at {:?}", path))?;
        let board = Self::from_yaml(&content)
            .with_context(|| format!("Invalid board descriptor {:?}", path))?;
        tracing::debug!(
            "Loaded board '{}' with {} peripheral(s) from {:?}",
            board.name,
            board.peripherals.len(),
            path
        );
        Ok(board)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let board: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Descriptor YAML")?;
        board.validate()?;
        Ok(board)
    }

    pub fn validate(&self) -> Result<()> {
        check_schema_version(&self.schema_version)?;

        let mut seen = HashSet::new();
        for p in &self.peripherals {
            p.validate()?;
            if !seen.insert(p.id.as_str()) {
                anyhow::bail!("duplicate peripheral id '{}'", p.id);
            }
        }

        if let Some(ram) = &self.ram {
            parse_size(&ram.size).context("Invalid RAM size")?;
        }

        if let Some(console) = &self.console {
            match self.peripheral(console) {
                Some(p) if p.r#type == PeripheralKind::Uart => {}
                Some(_) => anyhow::bail!("console '{}' is not a uart", console),
                None => anyhow::bail!("console '{}' is not a declared peripheral", console),
            }
        }

        Ok(())
    }

    pub fn peripheral(&self, id: &str) -> Option<&PeripheralConfig> {
        self.peripherals.iter().find(|p| p.id == id)
    }

    /// Ids of every `register_file` peripheral, in declaration order.
    pub fn register_files(&self) -> impl Iterator<Item = &str> {
        self.peripherals
            .iter()
            .filter(|p| p.r#type == PeripheralKind::RegisterFile)
            .map(|p| p.id.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProbeInputs {
    /// Board descriptor path, relative to the script's directory.
    pub board: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    #[default]
    FailFast,
    Exhaustive,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedVerdict {
    Pass,
    Fail,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VerdictDetails {
    pub target: String,
    pub verdict: ExpectedVerdict,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VerdictAssertion {
    pub expected_verdict: VerdictDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ProbeAssertion {
    ExpectedVerdict(VerdictAssertion),
    UartContains(UartContainsAssertion),
}

/// CI script: which board to load, which peripherals to self-test and what
/// outcome to expect.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProbeScript {
    pub schema_version: String,
    pub inputs: ProbeInputs,
    /// Peripheral ids to test; empty means every `register_file`.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub mode: ProbeMode,
    #[serde(default)]
    pub patterns: Option<[u32; 4]>,
    #[serde(default)]
    pub assertions: Vec<ProbeAssertion>,
}

impl ProbeScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open probe script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Probe Script YAML")?;
        script.validate()?;
        tracing::debug!(
            "Loaded probe script {:?}: {} target(s), {} assertion(s)",
            path.as_ref(),
            script.targets.len(),
            script.assertions.len()
        );
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        check_schema_version(&self.schema_version)?;

        if self.inputs.board.trim().is_empty() {
            anyhow::bail!("Input 'board' path cannot be empty");
        }

        if let Some(t) = self.targets.iter().find(|t| t.trim().is_empty()) {
            anyhow::bail!("Target ids cannot be empty (got {:?})", t);
        }

        for assertion in &self.assertions {
            if let ProbeAssertion::ExpectedVerdict(a) = assertion {
                if a.expected_verdict.target.trim().is_empty() {
                    anyhow::bail!("expected_verdict.target cannot be empty");
                }
            }
        }

        Ok(())
    }

    /// Resolves `inputs.board` against the directory holding the script.
    pub fn board_path(&self, script_path: &Path) -> PathBuf {
        let board = Path::new(&self.inputs.board);
        if board.is_absolute() {
            return board.to_path_buf();
        }
        script_path
            .parent()
            .map(|dir| dir.join(board))
            .unwrap_or_else(|| board.to_path_buf())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

/// Parses a `0x`-prefixed hex or plain decimal 32-bit literal.
pub fn parse_u32(s: &str) -> Result<u32> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse(),
    };
    parsed.with_context(|| format!("Invalid 32-bit value '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  board: "boards/arty.yaml"
targets: ["exit_dec"]
mode: exhaustive
patterns: [0x1, 0x2, 0x3, 0x4]
assertions:
  - uart_contains: "PASS"
  - expected_verdict:
      target: exit_dec
      verdict: pass
"#;
        let script: ProbeScript = serde_yaml::from_str(yaml).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.inputs.board, "boards/arty.yaml");
        assert_eq!(script.mode, ProbeMode::Exhaustive);
        assert_eq!(script.patterns, Some([1, 2, 3, 4]));
        assert_eq!(script.assertions.len(), 2);
        assert!(matches!(
            &script.assertions[1],
            ProbeAssertion::ExpectedVerdict(a) if a.expected_verdict.verdict == ExpectedVerdict::Pass
        ));
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
inputs:
  board: "board.yaml"
"#;
        let script: ProbeScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_empty_board() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  board: ""
"#;
        let script: ProbeScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("board"));
    }

    #[test]
    fn test_unknown_script_field_rejected() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  board: "board.yaml"
max_steps: 10
"#;
        assert!(serde_yaml::from_str::<ProbeScript>(yaml).is_err());
    }

    #[test]
    fn test_board_path_is_relative_to_script() {
        let yaml = r#"
schema_version: "1.0"
inputs:
  board: "../boards/arty.yaml"
"#;
        let script: ProbeScript = serde_yaml::from_str(yaml).unwrap();
        let resolved = script.board_path(Path::new("/ci/scripts/probe.yaml"));
        assert_eq!(resolved, PathBuf::from("/ci/scripts/../boards/arty.yaml"));
    }

    #[test]
    fn test_fault_validation() {
        assert!(FaultConfig::StuckAt { slot: 3, value: 0 }.validate().is_ok());
        assert!(FaultConfig::IgnoreWrites { slot: 4 }.validate().is_err());
        assert!(FaultConfig::Alias { slot: 1, to: 1 }.validate().is_err());
        assert!(FaultConfig::FlipBits { slot: 0, mask: 0 }.validate().is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("16B").unwrap(), 16);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_parse_u32() {
        assert_eq!(parse_u32("0x44A0_0000").unwrap(), 0x44A0_0000);
        assert_eq!(parse_u32("0X11").unwrap(), 0x11);
        assert_eq!(parse_u32(" 34 ").unwrap(), 34);
        assert!(parse_u32("0x1_0000_0000").is_err());
        assert!(parse_u32("pattern").is_err());
    }
}
