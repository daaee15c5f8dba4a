//! `~/.storewatch/` layout.
//!
//! Every helper has an `_at(home: &Path)` form so tests can point at a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "config.yaml";
pub const SOCKET_FILE: &str = "storewatch.sock";

/// `<home>/.storewatch/`
pub fn storewatch_root(home: &Path) -> PathBuf {
    home.join(".storewatch")
}

/// `<home>/.storewatch/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    storewatch_root(home).join(CONFIG_FILE)
}

/// `<home>/.storewatch/storewatch.sock`
pub fn socket_path_at(home: &Path) -> PathBuf {
    storewatch_root(home).join(SOCKET_FILE)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_under_dot_storewatch() {
        let home = Path::new("/home/viewer");
        assert_eq!(
            config_path_at(home),
            PathBuf::from("/home/viewer/.storewatch/config.yaml")
        );
        assert_eq!(
            socket_path_at(home),
            PathBuf::from("/home/viewer/.storewatch/storewatch.sock")
        );
    }
}
