//! Transfer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::xfer::HEADER_LEN;

/// Tunables of one transfer, shared by both roles.
///
/// Every field has a default, so a configuration file only needs to name what
/// it changes:
///
/// ```toml
/// [transfer]
/// port = 7471
/// buffer_capacity = 65536
/// output_path = "/tmp/incoming.bin"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Port the responder listens on and the initiator connects to.
    pub port: u16,

    /// Size of the registered buffer, i.e., the largest message.
    pub buffer_capacity: usize,

    /// Completion queue depth.
    pub cq_depth: u32,

    /// Maximum outstanding send work requests of the queue pair.
    pub max_send_wr: u32,

    /// Maximum outstanding receive work requests of the queue pair.
    pub max_recv_wr: u32,

    /// Timeout of address and route resolution, in milliseconds.
    pub resolve_timeout_ms: u64,

    /// Where the responder stores the received file.
    pub output_path: PathBuf,

    /// Payload bytes between two progress events; 0 reports every message.
    pub progress_interval: u64,

    /// Whether to compute a SHA-256 digest of the transferred bytes.
    pub digest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Self::DEFAULT_PORT,
            buffer_capacity: 4096,
            cq_depth: 10,
            max_send_wr: 10,
            max_recv_wr: 10,
            resolve_timeout_ms: 2000,
            output_path: PathBuf::from("received_file.bin"),
            progress_interval: 1 << 20,
            digest: true,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    transfer: Config,
}

impl Config {
    /// The well-known port of the responder.
    pub const DEFAULT_PORT: u16 = 7471;

    /// Parse a configuration from TOML text holding a `[transfer]` table.
    /// A missing table yields the defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(toml_str).map_err(|e| Error::Config(e.to_string()))?;
        file.transfer.validate()?;
        Ok(file.transfer)
    }

    /// Load a configuration file.
    pub fn load_toml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&toml_str)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity < HEADER_LEN {
            return Err(Error::Config(format!(
                "buffer_capacity {} cannot hold the {}-byte header",
                self.buffer_capacity, HEADER_LEN
            )));
        }
        if self.buffer_capacity > u32::MAX as usize {
            return Err(Error::Config(format!(
                "buffer_capacity {} exceeds the maximum message size",
                self.buffer_capacity
            )));
        }
        if self.cq_depth == 0 || self.max_send_wr == 0 || self.max_recv_wr == 0 {
            return Err(Error::Config("queue depths must be positive".to_owned()));
        }
        if self.resolve_timeout_ms > i32::MAX as u64 {
            return Err(Error::Config(format!(
                "resolve_timeout_ms {} is too large",
                self.resolve_timeout_ms
            )));
        }
        Ok(())
    }

    /// Get the resolution timeout.
    #[inline]
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.port, 7471);
        assert_eq!(config.buffer_capacity, 4096);
        assert_eq!(config.cq_depth, 10);
        assert_eq!(config.resolve_timeout(), Duration::from_secs(2));
        assert_eq!(config.output_path, PathBuf::from("received_file.bin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [transfer]
            port = 9000
            buffer_capacity = 65536
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.buffer_capacity, 65536);
        assert_eq!(config.max_recv_wr, 10);
        assert!(config.digest);

        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            "[transfer]\nbuffer_capacity = 7",
            "[transfer]\ncq_depth = 0",
            "[transfer]\nresolve_timeout_ms = 3000000000",
            "[transfer]\nport = \"seven\"",
            "[transfer]\nbuffer_size = 4096",
        ];
        for text in bad {
            assert!(
                matches!(Config::from_toml_str(text), Err(Error::Config(_))),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transfer]\noutput_path = \"out.bin\"\ndigest = false").unwrap();

        let config = Config::load_toml(file.path()).unwrap();
        assert_eq!(config.output_path, PathBuf::from("out.bin"));
        assert!(!config.digest);

        assert!(matches!(
            Config::load_toml("/nonexistent/rdma-xfer.toml"),
            Err(Error::Config(_))
        ));
    }
}
