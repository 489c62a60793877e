use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use config::Config as ConfigLoader;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::LoadOptions;
use crate::model::TrainerSettings;

/// Embedded template used to bootstrap the on-disk configuration when the
/// tool runs for the first time.
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");

const DEFAULT_TRAIN_FILE: &str = "winequality-data.csv";
const DEFAULT_TEST_FILE: &str = "winequality-test-data.csv";

/// Container returned after loading configuration data and resolving runtime
/// paths.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub config: AppConfig,
    pub paths: AppPaths,
}

/// Resolve and load the configuration for the provided application name. If
/// no config file exists yet, a default file is created from
/// [`DEFAULT_CONFIG_TEMPLATE`].
pub fn load_or_initialize_config(app_name: impl AsRef<str>) -> Result<ConfigBundle> {
    let app_name = app_name.as_ref();
    let mut paths = AppPaths::discover(app_name)?;
    paths.ensure_config_dir()?;

    if !paths.config_file.exists() {
        if let Some(parent) = paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).with_context(|| {
            format!(
                "failed to write default config to {}",
                paths.config_file.display()
            )
        })?;
    }

    let env_prefix = app_name
        .chars()
        .map(|ch| if ch == '-' { '_' } else { ch })
        .collect::<String>()
        .to_ascii_uppercase();

    let builder = ConfigLoader::builder()
        .add_source(File::from(paths.config_file.clone()))
        .add_source(
            Environment::with_prefix(&env_prefix)
                .separator("__")
                .try_parsing(true),
        );

    let config: AppConfig = builder
        .build()
        .with_context(|| {
            format!(
                "failed to parse configuration at {}",
                paths.config_file.display()
            )
        })?
        .try_deserialize()
        .context("failed to deserialize configuration into AppConfig")?;

    paths = paths.apply_storage_overrides(&config.storage)?;
    paths.ensure_runtime_dirs()?;

    config.normalize()?;

    Ok(ConfigBundle { config, paths })
}

/// Persistent runtime paths derived from XDG environment variables or
/// sensible fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_name: String,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl AppPaths {
    pub fn discover(app_name: impl Into<String>) -> Result<Self> {
        let app_name = app_name.into();
        let home = home_dir().context("unable to determine home directory for XDG resolution")?;

        let config_base = xdg_dir("XDG_CONFIG_HOME", &home, ".config");
        let data_base = xdg_dir("XDG_DATA_HOME", &home, ".local/share");
        let state_base = xdg_dir("XDG_STATE_HOME", &home, ".local/state");

        let config_dir = config_base.join(&app_name);
        let data_dir = data_base.join(&app_name);
        let state_dir = state_base.join(&app_name);
        let config_file = config_dir.join("config.toml");

        Ok(Self {
            app_name,
            config_dir,
            config_file,
            data_dir,
            state_dir,
        })
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).with_context(|| {
            format!(
                "failed to create config directory {}",
                self.config_dir.display()
            )
        })
    }

    pub fn ensure_runtime_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create runtime directory {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn apply_storage_overrides(&self, storage: &StorageSettings) -> Result<Self> {
        let mut next = self.clone();

        if let Some(data_dir) = storage.data_dir.as_ref() {
            next.data_dir = resolve_path_value(data_dir, &self.config_dir)?;
        }

        if let Some(state_dir) = storage.state_dir.as_ref() {
            next.state_dir = resolve_path_value(state_dir, &self.config_dir)?;
        }

        Ok(next)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataSettings,
    pub trainer: TrainerSettings,
    pub output: OutputSettings,
    pub storage: StorageSettings,
}

impl AppConfig {
    pub fn normalize(&self) -> Result<()> {
        if self.data.delimiter.len() != 1 {
            bail!(
                "data.delimiter must be a single character, got '{}'",
                self.data.delimiter
            );
        }
        Ok(())
    }

    /// Resolve the train/test file locations and reader options. Unset paths
    /// fall back to the default file names inside the app data directory;
    /// explicit relative paths stay relative to the working directory.
    pub fn resolve_data(&self, paths: &AppPaths) -> Result<ResolvedDataConfig> {
        let options = self.data.load_options()?;

        let train_path = match self.data.train_path.as_deref() {
            Some(value) => expand_data_path(value)?,
            None => paths.data_dir.join(DEFAULT_TRAIN_FILE),
        };
        let test_path = match self.data.test_path.as_deref() {
            Some(value) => expand_data_path(value)?,
            None => paths.data_dir.join(DEFAULT_TEST_FILE),
        };

        Ok(ResolvedDataConfig {
            train_path,
            test_path,
            options,
        })
    }
}

/// Locations and shape of the input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub train_path: Option<String>,
    pub test_path: Option<String>,
    pub delimiter: String,
    pub has_headers: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            train_path: None,
            test_path: None,
            delimiter: ",".to_string(),
            has_headers: true,
        }
    }
}

impl DataSettings {
    pub fn load_options(&self) -> Result<LoadOptions> {
        let mut bytes = self.delimiter.bytes();
        let delimiter = bytes
            .next()
            .ok_or_else(|| anyhow!("data.delimiter must not be empty"))?;
        if bytes.next().is_some() {
            bail!(
                "data.delimiter must be a single character, got '{}'",
                self.delimiter
            );
        }

        Ok(LoadOptions {
            delimiter,
            has_headers: self.has_headers,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Print every prediction rather than only the final record.
    pub report_all: bool,
    /// Persist run metrics under the state directory.
    pub save_runs: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            report_all: true,
            save_runs: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: Option<String>,
    pub state_dir: Option<String>,
}

/// Fully-resolved input file locations and reader options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDataConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub options: LoadOptions,
}

fn xdg_dir(var: &str, home: &Path, fallback_suffix: &str) -> PathBuf {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(fallback_suffix))
}

pub fn resolve_path_value(value: &str, base_dir: &Path) -> Result<PathBuf> {
    let expanded = expand_path(value)?;
    let mut path = PathBuf::from(&expanded);
    if path.is_absolute() {
        path = path.components().collect();
        Ok(path)
    } else {
        Ok(base_dir.join(path))
    }
}

/// Expand `~` and `$VAR` in a data-file path. Unlike config-relative
/// resources, relative data paths are left alone so they resolve against
/// the working directory.
fn expand_data_path(value: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(expand_path(value)?))
}

fn expand_path(value: &str) -> Result<String> {
    let home = home_dir();
    let home_utf8 = match home.as_ref() {
        Some(path) => Some(
            path.to_str()
                .ok_or_else(|| anyhow!("home directory contains invalid UTF-8"))?
                .to_string(),
        ),
        None => None,
    };

    let expanded = shellexpand::full_with_context(
        value,
        || home_utf8.as_deref(),
        |var| Ok(env::var(var).ok()),
    )
    .map_err(|error: shellexpand::LookupError<std::env::VarError>| {
        anyhow!("failed to expand '{value}': {error}")
    })?;
    Ok(expanded.into_owned())
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn set_env_path(var: &str, value: &Path) {
        env::set_var(var, value);
    }

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn creates_config_when_missing() {
        let _guard = env_lock().lock().unwrap();
        let tmp = TempDir::new().unwrap();
        let config_home = tmp.path().join("config");
        let data_home = tmp.path().join("data");
        let state_home = tmp.path().join("state");

        set_env_path("XDG_CONFIG_HOME", &config_home);
        set_env_path("XDG_DATA_HOME", &data_home);
        set_env_path("XDG_STATE_HOME", &state_home);

        let bundle = load_or_initialize_config("vino-test").unwrap();

        assert!(
            bundle.paths.config_file.exists(),
            "config file not created at {}",
            bundle.paths.config_file.display()
        );
        assert!(bundle.paths.data_dir.exists());
        assert!(bundle.paths.state_dir.exists());

        let data = bundle.config.resolve_data(&bundle.paths).unwrap();
        assert_eq!(
            data.train_path,
            bundle.paths.data_dir.join("winequality-data.csv")
        );
        assert_eq!(
            data.test_path,
            bundle.paths.data_dir.join("winequality-test-data.csv")
        );
        assert_eq!(data.options.delimiter, b',');
        assert!(data.options.has_headers);
    }

    #[test]
    fn respects_storage_overrides() {
        let _guard = env_lock().lock().unwrap();
        let tmp = TempDir::new().unwrap();
        let config_home = tmp.path().join("config");
        let data_home = tmp.path().join("data");
        let state_home = tmp.path().join("state");

        set_env_path("XDG_CONFIG_HOME", &config_home);
        set_env_path("XDG_DATA_HOME", &data_home);
        set_env_path("XDG_STATE_HOME", &state_home);

        let app_dir = config_home.join("vino-override");
        fs::create_dir_all(&app_dir).unwrap();
        let config_file = app_dir.join("config.toml");
        let mut file = fs::File::create(&config_file).unwrap();
        writeln!(
            file,
            r#"
                [storage]
                data_dir = "~/custom/data"
                state_dir = "~/custom/state"
            "#
        )
        .unwrap();

        let bundle = load_or_initialize_config("vino-override").unwrap();

        let expanded_home = home_dir().unwrap();
        assert_eq!(bundle.paths.data_dir, expanded_home.join("custom/data"));
        assert_eq!(bundle.paths.state_dir, expanded_home.join("custom/state"));
    }

    #[test]
    fn explicit_data_paths_win_over_defaults() {
        let _guard = env_lock().lock().unwrap();
        let tmp = TempDir::new().unwrap();
        let config_home = tmp.path().join("config");
        let data_home = tmp.path().join("data");
        let state_home = tmp.path().join("state");

        set_env_path("XDG_CONFIG_HOME", &config_home);
        set_env_path("XDG_DATA_HOME", &data_home);
        set_env_path("XDG_STATE_HOME", &state_home);

        let app_dir = config_home.join("vino-paths");
        fs::create_dir_all(&app_dir).unwrap();
        fs::write(
            app_dir.join("config.toml"),
            r#"
                [data]
                train_path = "inputs/train.csv"
                test_path = "/srv/wine/test.csv"
                delimiter = ";"
                has_headers = false
            "#,
        )
        .unwrap();

        let bundle = load_or_initialize_config("vino-paths").unwrap();
        let data = bundle.config.resolve_data(&bundle.paths).unwrap();

        assert_eq!(data.train_path, PathBuf::from("inputs/train.csv"));
        assert_eq!(data.test_path, PathBuf::from("/srv/wine/test.csv"));
        assert_eq!(data.options.delimiter, b';');
        assert!(!data.options.has_headers);
    }

    #[test]
    fn multi_character_delimiters_are_rejected() {
        let settings = DataSettings {
            delimiter: "||".to_string(),
            ..DataSettings::default()
        };
        assert!(settings.load_options().is_err());

        let config = AppConfig {
            data: settings,
            ..AppConfig::default()
        };
        assert!(config.normalize().is_err());
    }
}
