//! Operations configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration shared by the filesystem operation façades.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OpsConfig {
    /// Root of the directory-backed recycle bin.
    #[builder(default = "default_recycle_bin_root()")]
    #[serde(default = "default_recycle_bin_root")]
    pub recycle_bin_root: PathBuf,

    /// Use the operating system's trash instead of `recycle_bin_root`.
    #[builder(default = "false")]
    #[serde(default)]
    pub use_system_trash: bool,

    /// Allow `:` in names (alternate data streams).
    #[builder(default = "false")]
    #[serde(default)]
    pub alternate_streams_visible: bool,

    /// Maximum directory depth for recursive copy/move.
    #[builder(default = "256")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum length of a single name component, in bytes.
    #[builder(default = "255")]
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Delay before selecting newly created items in the current view.
    #[builder(default = "50")]
    #[serde(default = "default_selection_delay_ms")]
    pub selection_delay_ms: u64,

    /// Directory holding new-item templates (`new.<ext>` files).
    #[builder(default)]
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Command line used to launch the helper process (empty = this binary).
    #[builder(default)]
    #[serde(default)]
    pub helper_command: Vec<String>,

    /// Command line used to launch the helper process with administrator rights.
    #[builder(default)]
    #[serde(default)]
    pub elevated_helper_command: Vec<String>,
}

fn default_recycle_bin_root() -> PathBuf {
    std::env::temp_dir().join("shellward").join("$Recycle.Bin")
}

fn default_max_depth() -> u32 {
    256
}

fn default_max_name_length() -> usize {
    255
}

fn default_selection_delay_ms() -> u64 {
    50
}

impl OpsConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.recycle_bin_root {
            if root.as_os_str().is_empty() {
                return Err("Recycle bin root cannot be empty".to_string());
            }
        }
        if self.max_depth == Some(0) {
            return Err("Maximum depth must be at least 1".to_string());
        }
        Ok(())
    }
}

impl OpsConfig {
    /// Create a new config builder.
    pub fn builder() -> OpsConfigBuilder {
        OpsConfigBuilder::default()
    }

    /// Create a config with a specific recycle bin root and defaults otherwise.
    pub fn new(recycle_bin_root: impl Into<PathBuf>) -> Self {
        Self {
            recycle_bin_root: recycle_bin_root.into(),
            ..Self::default()
        }
    }

    /// Delay before selecting copied/moved items.
    pub fn selection_delay(&self) -> Duration {
        Duration::from_millis(self.selection_delay_ms)
    }

    /// Check if a path lies inside the configured recycle bin.
    pub fn is_under_recycle_bin(&self, path: &Path) -> bool {
        path.starts_with(&self.recycle_bin_root)
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            recycle_bin_root: default_recycle_bin_root(),
            use_system_trash: false,
            alternate_streams_visible: false,
            max_depth: default_max_depth(),
            max_name_length: default_max_name_length(),
            selection_delay_ms: default_selection_delay_ms(),
            templates_dir: None,
            helper_command: Vec::new(),
            elevated_helper_command: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpsConfig::builder()
            .recycle_bin_root("/bin")
            .max_depth(8u32)
            .alternate_streams_visible(true)
            .build()
            .unwrap();

        assert_eq!(config.recycle_bin_root, PathBuf::from("/bin"));
        assert_eq!(config.max_depth, 8);
        assert!(config.alternate_streams_visible);
        assert_eq!(config.selection_delay_ms, 50);
    }

    #[test]
    fn test_config_builder_rejects_zero_depth() {
        assert!(OpsConfig::builder().max_depth(0u32).build().is_err());
        assert!(OpsConfig::builder().recycle_bin_root("").build().is_err());
    }

    #[test]
    fn test_is_under_recycle_bin() {
        let config = OpsConfig::new("/trash/$Recycle.Bin");
        assert!(config.is_under_recycle_bin(Path::new("/trash/$Recycle.Bin/$Rabc.txt")));
        assert!(!config.is_under_recycle_bin(Path::new("/trash/other")));
    }
}
