use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    /// Render/poll rate. The simulation always ticks at 60 Hz.
    pub(crate) fps_cap: u32,
    /// 0 picks a seed from the clock.
    pub(crate) seed: u64,
    pub(crate) enable_color: bool,
    /// env_logger filter used when RUST_LOG is unset.
    pub(crate) log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            seed: 0,
            enable_color: true,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub(crate) fn fps(&self) -> u32 {
        self.fps_cap.clamp(10, 240)
    }
}

/// Where the settings came from, reported once logging is up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SettingsSource {
    File,
    Missing,
    Invalid(String),
}

pub(crate) struct Paths {
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "car-dodger", "CarDodger")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create {}", dir.display()))?;
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("car-dodger.log"),
    })
}

pub(crate) fn load_settings(path: &Path) -> (Settings, SettingsSource) {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return (Settings::default(), SettingsSource::Missing),
    };
    match serde_json::from_str::<Settings>(&s) {
        Ok(v) => (v, SettingsSource::File),
        Err(e) => (Settings::default(), SettingsSource::Invalid(e.to_string())),
    }
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("could not write {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // rename-over-existing fails on Windows
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path() -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

        let test_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "car-dodger-test-{}-{}",
            std::process::id(),
            test_id
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join("settings.json")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_settings_path();
        let (s, src) = load_settings(&path);
        assert_eq!(s, Settings::default());
        assert_eq!(src, SettingsSource::Missing);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_settings_path();
        fs::write(&path, r#"{ "seed": 7, "enable_color": false }"#).unwrap();
        let (s, src) = load_settings(&path);
        assert_eq!(src, SettingsSource::File);
        assert_eq!(s.seed, 7);
        assert!(!s.enable_color);
        assert_eq!(s.fps_cap, 60);
        assert_eq!(s.log_filter, "info");
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let path = temp_settings_path();
        fs::write(&path, "not json").unwrap();
        let (s, src) = load_settings(&path);
        assert_eq!(s, Settings::default());
        assert!(matches!(src, SettingsSource::Invalid(_)));
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_settings_path();
        let s = Settings {
            fps_cap: 30,
            seed: 99,
            enable_color: false,
            log_filter: "debug".to_string(),
        };
        save_settings_atomic(&path, &s).unwrap();
        // overwrite an existing file too
        save_settings_atomic(&path, &s).unwrap();
        let (loaded, src) = load_settings(&path);
        assert_eq!(src, SettingsSource::File);
        assert_eq!(loaded, s);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_fps_clamped() {
        let mut s = Settings::default();
        s.fps_cap = 0;
        assert_eq!(s.fps(), 10);
        s.fps_cap = 1000;
        assert_eq!(s.fps(), 240);
        s.fps_cap = 60;
        assert_eq!(s.fps(), 60);
    }
}
