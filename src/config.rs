use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub root_paths: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub include_root: bool,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Where and how cleaned folders are copied.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_program")]
    pub program: String,
    /// `user@hostname`; empty means `path` is used as the whole destination.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_true")]
    pub preserve_attributes: bool,
    #[serde(default = "default_true")]
    pub verbose: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_program() -> String {
    "scp".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            include_root: false,
            transfer: TransferConfig::default(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            host: String::new(),
            path: String::new(),
            recursive: true,
            preserve_attributes: true,
            verbose: true,
            timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
        }
    }
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The remote target as handed to the copy program, `host:path` or just `path`.
    pub fn destination(&self) -> String {
        let host = self.host.trim();
        let path = self.path.trim();
        if host.is_empty() {
            path.to_string()
        } else {
            format!("{}:{}", host, path)
        }
    }
}

impl AppConfig {
    pub fn roots(&self) -> Vec<PathBuf> {
        self.root_paths.iter().map(PathBuf::from).collect()
    }
}

/// Load `Config.toml` from the working directory (if present) overlaid with
/// `DIRSWEEP__*` environment variables. `DIRSWEEP__ROOT_PATHS` and
/// `DIRSWEEP__IGNORE_PATTERNS` take comma-separated lists.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_from(ConfigFile::with_name("Config").required(false))
}

/// Like [`load_configuration`] but reads an explicit file, which must exist.
pub fn load_configuration_from(path: &Path) -> Result<AppConfig, ConfigError> {
    load_from(ConfigFile::from(path).required(true))
}

fn load_from<S>(file: S) -> Result<AppConfig, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("DIRSWEEP")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("root_paths")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Collapse the root list so that no root lies inside another one. The outermost
/// root wins; the first spelling of a duplicate is kept. Survivors are listed in
/// the order they were accepted.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|existing| dir.starts_with(existing)) {
            continue;
        }
        result.retain(|existing| !existing.starts_with(&dir));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Loading reads the process environment, which the env test mutates.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_non_overlapping_no_overlap() {
        let result = non_overlapping_directories(paths(&[
            "/home/user/photos",
            "/home/user/docs",
            "/var/data",
        ]));
        assert_eq!(result, paths(&["/home/user/photos", "/home/user/docs", "/var/data"]));
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let result = non_overlapping_directories(paths(&[
            "/home/user/docs",
            "/var/data",
            "/home/user/music",
            "/home/user",
        ]));
        // Both children go once their parent shows up.
        assert_eq!(result, paths(&["/var/data", "/home/user"]));
    }

    #[test]
    fn test_non_overlapping_duplicates_and_prefix_names() {
        let result = non_overlapping_directories(paths(&["/data", "/data", "/data2"]));
        assert_eq!(result, paths(&["/data", "/data2"]));
    }

    #[test]
    fn test_destination_with_and_without_host() {
        let mut transfer = TransferConfig {
            path: "/remote/target/".to_string(),
            ..Default::default()
        };
        assert_eq!(transfer.destination(), "/remote/target/");

        transfer.host = "user@hostname".to_string();
        assert_eq!(transfer.destination(), "user@hostname:/remote/target/");
    }

    #[test]
    fn test_load_configuration_from_file_with_defaults() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let file = dir.path().join("sweep.toml");
        fs::write(
            &file,
            r#"
root_paths = ["/srv/a", "/srv/b"]
ignore_patterns = ["**/.git"]

[transfer]
host = "backup@nas"
path = "/volume1/incoming"
preserve_attributes = false
"#,
        )
        .unwrap();

        let config = load_configuration_from(&file).unwrap();
        assert_eq!(config.root_paths, vec!["/srv/a", "/srv/b"]);
        assert_eq!(config.ignore_patterns, vec!["**/.git"]);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(!config.include_root);
        assert_eq!(config.transfer.program, "scp");
        assert!(config.transfer.recursive);
        assert!(!config.transfer.preserve_attributes);
        assert_eq!(config.transfer.timeout(), Duration::from_secs(300));
        assert_eq!(config.transfer.destination(), "backup@nas:/volume1/incoming");
    }

    #[test]
    fn test_environment_overrides_lists_and_numbers() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let file = dir.path().join("empty.toml");
        fs::write(&file, "").unwrap();

        env::set_var("DIRSWEEP__ROOT_PATHS", "/srv/a,/srv/b");
        env::set_var("DIRSWEEP__IGNORE_PATTERNS", "**/.git");
        env::set_var("DIRSWEEP__MAX_ITERATIONS", "3");
        env::set_var("DIRSWEEP__TRANSFER__HOST", "me@nas");
        let loaded = load_configuration_from(&file);
        env::remove_var("DIRSWEEP__ROOT_PATHS");
        env::remove_var("DIRSWEEP__IGNORE_PATTERNS");
        env::remove_var("DIRSWEEP__MAX_ITERATIONS");
        env::remove_var("DIRSWEEP__TRANSFER__HOST");

        let config = loaded.unwrap();
        assert_eq!(config.root_paths, vec!["/srv/a", "/srv/b"]);
        assert_eq!(config.ignore_patterns, vec!["**/.git"]);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.transfer.host, "me@nas");
        assert_eq!(config.transfer.program, "scp");
    }

    #[test]
    fn test_load_configuration_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_configuration_from(&dir.path().join("nope.toml")).is_err());
    }
}
