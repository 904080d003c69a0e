//! Add-on discovery (spec.md §6 "Add-on file convention"), grounded in
//! `original_source`'s `realvnc-impl/addon.c`: every file matching
//! `/etc/guacamole/realvnc/*.addon` is read at startup and handed to the
//! SDK's add-on-enable entry point. Read errors are a warning and a skip,
//! never a fatal startup error.

use std::path::{Path, PathBuf};

/// Default add-on directory, matching the original convention.
pub const DEFAULT_ADDON_DIR: &str = "/etc/guacamole/realvnc";

/// Enumerate every `*.addon` file in `dir`. Missing or unreadable
/// directories yield an empty list with a warning rather than an error,
/// since add-ons are optional.
#[must_use]
pub fn load_addons(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(?dir, error = %e, "could not read add-on directory, skipping");
            return Vec::new();
        }
    };

    let mut addons = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "error reading add-on directory entry, skipping");
                continue;
            }
        };
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "addon") {
            addons.push(path);
        }
    }
    addons.sort();
    addons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_yields_empty_list() {
        let addons = load_addons(Path::new("/nonexistent/rvp-addon-test-dir"));
        assert!(addons.is_empty());
    }

    #[test]
    fn finds_addon_files_and_skips_others() {
        let dir = std::env::temp_dir().join(format!("rvp-addon-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("first.addon"), b"").unwrap();
        std::fs::write(dir.join("second.addon"), b"").unwrap();
        std::fs::write(dir.join("ignore.txt"), b"").unwrap();

        let addons = load_addons(&dir);
        assert_eq!(addons.len(), 2);
        assert!(addons.iter().all(|p| p.extension().unwrap() == "addon"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
