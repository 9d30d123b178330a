// External tool resolver for exiftool
//
// Resolution order:
// 1) Environment variable override (GEOTAG_EXIFTOOL_PATH)
// 2) Copy next to the executable
// 3) macOS app bundle Resources fallback
// 4) PATH fallback

use std::env;
use std::path::PathBuf;

pub const EXIFTOOL_ENV_KEY: &str = "GEOTAG_EXIFTOOL_PATH";

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a bundled tool path.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
        log::warn!("{} points at missing file {}", env_key, v);
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }

        // GeoTag.app/Contents/MacOS/<exe>
        // GeoTag.app/Contents/Resources/ExifTool/exiftool
        if let Some(contents_dir) = dir.parent() {
            let resources = contents_dir.join("Resources").join("ExifTool").join(&filename);
            if resources.exists() {
                return resources;
            }
        }

        let bin_candidate = dir.join("bin").join(&filename);
        if bin_candidate.exists() {
            return bin_candidate;
        }
    }

    PathBuf::from(default_name)
}

/// Get path to exiftool binary
pub fn exiftool_path() -> PathBuf {
    resolve_tool(EXIFTOOL_ENV_KEY, "exiftool")
}

/// Check if exiftool can be run from the resolved path
pub fn is_exiftool_available() -> bool {
    let path = exiftool_path();
    std::process::Command::new(&path)
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tool_fallback() {
        let path = resolve_tool("GEOTAG_TEST_NONEXISTENT", "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }

    #[test]
    fn test_env_override() {
        let temp = tempfile::NamedTempFile::new().unwrap();

        env::set_var("GEOTAG_TEST_TOOL", temp.path());
        let path = resolve_tool("GEOTAG_TEST_TOOL", "default");
        assert_eq!(path, temp.path());
        env::remove_var("GEOTAG_TEST_TOOL");
    }

    #[test]
    fn test_env_override_to_missing_file_falls_through() {
        env::set_var("GEOTAG_TEST_MISSING_TOOL", "/definitely/not/here/exiftool");
        let path = resolve_tool("GEOTAG_TEST_MISSING_TOOL", "exiftool-test-fallback");
        assert_eq!(path, PathBuf::from("exiftool-test-fallback"));
        env::remove_var("GEOTAG_TEST_MISSING_TOOL");
    }
}
