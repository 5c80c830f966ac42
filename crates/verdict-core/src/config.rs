use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ErrorCode;

/// Project-local state directory, relative to the project root.
pub const PROJECT_DIR: &str = ".verdict";
/// Project config file, relative to the project root.
pub const PROJECT_CONFIG: &str = ".verdict/config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no verdict project at {root} (missing .verdict/config.toml)")]
    NotInitialized { root: String },

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Reviewer id to password.
    #[serde(default)]
    pub reviewers: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Dataset path, resolved against the project root when relative.
    #[must_use]
    pub fn dataset_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.dataset.path)
    }

    /// Snapshot directory, resolved against the project root when relative.
    #[must_use]
    pub fn snapshot_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.snapshots.dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
    /// Keep only the first `limit` rows.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl SnapshotConfig {
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteKind {
    #[default]
    None,
    Github,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub kind: RemoteKind,
    /// `owner/name` of the GitHub repository.
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Mirror directory for `kind = "directory"`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl RemoteConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::None,
            repo: None,
            branch: default_branch(),
            path_prefix: default_path_prefix(),
            token_env: default_token_env(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            dir: None,
        }
    }
}

/// What `jump` does with the buffer of the item being left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JumpPolicy {
    /// Move without validating; unsaved edits are discarded.
    #[default]
    Inspect,
    /// Validate and save first, exactly like `next`.
    SaveFirst,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub jump: JumpPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.verdict/config.toml`, or defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_root.join(PROJECT_CONFIG);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    read_toml(&path)
}

/// Load `.verdict/config.toml`, failing if the project was never initialized.
///
/// # Errors
///
/// Returns [`ConfigError::NotInitialized`] if the file is missing, or any
/// [`load_project_config`] error.
pub fn require_project_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    if !project_root.join(PROJECT_CONFIG).exists() {
        return Err(ConfigError::NotInitialized {
            root: project_root.display().to_string(),
        });
    }
    load_project_config(project_root)
}

/// Load `<config_dir>/verdict/config.toml`, or defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("verdict/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }
    read_toml(&path)
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<T>(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Merge project config, user config and the output-mode inputs.
///
/// # Errors
///
/// Returns [`ConfigError`] if either config file is malformed.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig, ConfigError> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_json,
        user.output.as_deref(),
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// `--json` > `FORMAT` env > user config > TTY detection.
#[must_use]
pub fn resolve_output(
    cli_json: bool,
    user_output: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }
    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }
    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }
    if is_tty { "pretty" } else { "text" }.to_string()
}

/// Template written by `vd init`.
#[must_use]
pub fn config_template() -> String {
    format!(
        r#"# verdict project configuration

[dataset]
path = "{dataset}"
# limit = 100

[snapshots]
dir = "{snapshots}"
lock_timeout_ms = {lock}

[remote]
# "none", "directory" or "github"
kind = "none"
path_prefix = "{prefix}"
# dir = "/shared/verdict-mirror"
# repo = "owner/name"
branch = "{branch}"
token_env = "{token_env}"
api_base = "{api_base}"
timeout_secs = {timeout}

[session]
# "inspect" discards unsaved edits on jump; "save-first" validates and saves
jump = "inspect"

[reviewers]
# reviewer-id = "password"
"#,
        dataset = default_dataset_path().display(),
        snapshots = default_snapshot_dir().display(),
        lock = default_lock_timeout_ms(),
        prefix = default_path_prefix(),
        branch = default_branch(),
        token_env = default_token_env(),
        api_base = default_api_base(),
        timeout = default_timeout_secs(),
    )
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("annotation_file.csv")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".verdict/annotations")
}

const fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_path_prefix() -> String {
    "annotations".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

const fn default_timeout_secs() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(root: &Path, content: &str) {
        std::fs::create_dir_all(root.join(PROJECT_DIR)).expect("create .verdict");
        std::fs::write(root.join(PROJECT_CONFIG), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = TempDir::new().expect("tempdir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.dataset.path, PathBuf::from("annotation_file.csv"));
        assert_eq!(cfg.dataset.limit, None);
        assert_eq!(cfg.snapshots.lock_timeout(), Duration::from_secs(2));
        assert_eq!(cfg.remote.kind, RemoteKind::None);
        assert_eq!(cfg.remote.timeout(), Duration::from_secs(20));
        assert_eq!(cfg.session.jump, JumpPolicy::Inspect);
        assert!(cfg.reviewers.is_empty());
    }

    #[test]
    fn require_project_config_demands_init() {
        let root = TempDir::new().expect("tempdir");
        let err = require_project_config(root.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotInitialized);

        write_config(root.path(), "");
        assert!(require_project_config(root.path()).is_ok());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let root = TempDir::new().expect("tempdir");
        write_config(
            root.path(),
            r#"
[dataset]
limit = 100

[remote]
kind = "github"
repo = "lab/annotations"

[session]
jump = "save-first"

[reviewers]
halil = "password123"
"#,
        );

        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg.dataset.limit, Some(100));
        assert_eq!(cfg.dataset.path, PathBuf::from("annotation_file.csv"));
        assert_eq!(cfg.remote.kind, RemoteKind::Github);
        assert_eq!(cfg.remote.repo.as_deref(), Some("lab/annotations"));
        assert_eq!(cfg.remote.branch, "main");
        assert_eq!(cfg.remote.token_env, "GITHUB_TOKEN");
        assert_eq!(cfg.session.jump, JumpPolicy::SaveFirst);
        assert_eq!(cfg.reviewers.get("halil").map(String::as_str), Some("password123"));
        assert_eq!(
            cfg.snapshot_dir(root.path()),
            root.path().join(".verdict/annotations")
        );
    }

    #[test]
    fn malformed_config_reports_parse_error() {
        let root = TempDir::new().expect("tempdir");
        write_config(root.path(), "[session]\njump = \"teleport\"\n");
        let err = load_project_config(root.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.code(), ErrorCode::ConfigParseError);
    }

    #[test]
    fn template_parses_to_defaults() {
        let cfg: ProjectConfig = toml::from_str(&config_template()).expect("template parses");
        assert_eq!(cfg.remote.kind, RemoteKind::None);
        assert_eq!(cfg.snapshots.dir, PathBuf::from(".verdict/annotations"));
        assert!(cfg.reviewers.is_empty());
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text"), true), "json");
    }

    #[test]
    fn env_beats_user_config_and_tty_decides_last() {
        assert_eq!(resolve_output(false, Some("json"), Some("text"), true), "text");
        assert_eq!(resolve_output(false, Some("json"), None, true), "json");
        assert_eq!(resolve_output(false, None, None, true), "pretty");
        assert_eq!(resolve_output(false, None, Some("bogus"), false), "text");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        assert_eq!(resolve_output(false, Some("table"), Some("human"), false), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table"), true), "text");
    }
}
