use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Directory (relative to the project root) that holds the store and its
/// config.
pub const BOQ_DIR: &str = ".boq";

/// Store file name inside [`BOQ_DIR`].
pub const STORE_FILE: &str = "boq.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Values applied to new records when the caller leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub contingency_percentage: Decimal,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            contingency_percentage: Decimal::ZERO,
        }
    }
}

/// Switches for the optional parts of the totals cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Re-scan sections when a bill's contingency changes instead of
    /// reusing the stored subtotal.
    #[serde(default = "default_true")]
    pub rescan_on_contingency_change: bool,
    /// Recompute the section an item leaves when its `section_id` changes.
    #[serde(default = "default_true")]
    pub recalc_previous_section_on_move: bool,
    /// Recompute the former bill after a section is deleted.
    #[serde(default)]
    pub recalc_bill_on_section_delete: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            rescan_on_contingency_change: default_true(),
            recalc_previous_section_on_move: default_true(),
            recalc_bill_on_section_delete: false,
        }
    }
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

/// Path of the store database for a project rooted at `project_root`.
#[must_use]
pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(BOQ_DIR).join(STORE_FILE)
}

/// Load `<root>/.boq/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(BOQ_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `<config_dir>/boq/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("boq/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config, user config and environment into the settings
/// the CLI runs with.
///
/// # Errors
///
/// Returns an error if either config file is present but malformed.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
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

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_currency() -> String {
    "KES".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project_config(root: &Path, content: &str) {
        let dir = root.join(BOQ_DIR);
        std::fs::create_dir_all(&dir).expect("create .boq dir");
        std::fs::write(dir.join("config.toml"), content).expect("write config");
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
        assert_eq!(cfg.defaults.currency, "KES");
        assert_eq!(cfg.defaults.contingency_percentage, Decimal::ZERO);
        assert!(cfg.cascade.rescan_on_contingency_change);
        assert!(cfg.cascade.recalc_previous_section_on_move);
        assert!(!cfg.cascade.recalc_bill_on_section_delete);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        write_project_config(
            root.path(),
            r#"
[defaults]
currency = "USD"
contingency_percentage = "7.5"

[cascade]
recalc_bill_on_section_delete = true
"#,
        );

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.defaults.currency, "USD");
        assert_eq!(cfg.defaults.contingency_percentage, Decimal::new(75, 1));
        assert!(cfg.cascade.recalc_bill_on_section_delete);
        assert!(cfg.cascade.rescan_on_contingency_change);
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir");
        write_project_config(root.path(), "[store]\nbusy_timeout_ms = \"soon\"\n");

        let err = load_project_config(root.path()).expect_err("parse should fail");
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[test]
    fn store_path_lives_under_boq_dir() {
        let path = store_path(Path::new("/srv/tender"));
        assert_eq!(path, PathBuf::from("/srv/tender/.boq/boq.db"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty"), Some("text"));
        assert_eq!(output, "json");
    }

    #[test]
    fn env_format_beats_user_config() {
        assert_eq!(resolve_output(false, Some("json"), Some("text")), "text");
    }

    #[test]
    fn aliases_are_normalized() {
        assert_eq!(resolve_output(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table")), "text");
    }
}
