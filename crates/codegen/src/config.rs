//! Backend configuration.
//!
//! The backend consumes four knobs from the build orchestrator: the
//! target triple, the working directory the `.ll` files land in, the
//! build mode, and whether link-time optimization is delegated to the
//! external toolchain. Together the last two decide the shard layout
//! (see [`Config::shard_count`]).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Debug,
    Release,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Mode, String> {
        match s {
            "debug" => Ok(Mode::Debug),
            "release" => Ok(Mode::Release),
            _ => Err(format!("unknown mode '{}' (expected debug|release)", s)),
        }
    }
}

/// Link-time-optimization setting of the external toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lto {
    #[default]
    None,
    Thin,
    Full,
}

impl FromStr for Lto {
    type Err = String;

    fn from_str(s: &str) -> Result<Lto, String> {
        match s {
            "none" => Ok(Lto::None),
            "thin" => Ok(Lto::Thin),
            "full" => Ok(Lto::Full),
            _ => Err(format!("unknown lto setting '{}' (expected none|thin|full)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target triple written into every module; empty leaves it to the
    /// toolchain default.
    pub target_triple: String,
    /// Directory the `.ll` shards are written into.
    pub workdir: PathBuf,
    pub mode: Mode,
    pub lto: Lto,
    /// Shard count used when the layout is multi-shard.
    pub procs: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config::new(".")
    }
}

impl Config {
    pub fn new(workdir: impl Into<PathBuf>) -> Config {
        Config {
            target_triple: String::new(),
            workdir: workdir.into(),
            mode: Mode::Debug,
            lto: Lto::None,
            procs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Config, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("invalid config {}: {}", path.display(), e))
    }

    /// Number of output shards for this mode/LTO combination.
    ///
    /// Release without external LTO collapses everything into a single
    /// module so one LLVM invocation sees the whole program; any other
    /// combination shards across `procs` for build throughput.
    pub fn shard_count(&self) -> usize {
        match (self.mode, self.lto) {
            (Mode::Release, Lto::None) => 1,
            _ => self.procs.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_layout_follows_mode_and_lto() {
        let mut config = Config::new("work");
        config.procs = 8;

        config.mode = Mode::Debug;
        assert_eq!(config.shard_count(), 8);

        config.mode = Mode::Release;
        config.lto = Lto::None;
        assert_eq!(config.shard_count(), 1);

        config.lto = Lto::Thin;
        assert_eq!(config.shard_count(), 8);
    }

    #[test]
    fn mode_and_lto_parse_from_cli_words() {
        assert_eq!("release".parse::<Mode>(), Ok(Mode::Release));
        assert_eq!("thin".parse::<Lto>(), Ok(Lto::Thin));
        assert!("fast".parse::<Lto>().is_err());
    }
}
