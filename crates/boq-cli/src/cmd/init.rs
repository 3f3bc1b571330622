use anyhow::{Context as _, Result};
use boq_core::config::{BOQ_DIR, ProjectConfig, STORE_FILE, store_path};
use boq_core::db;
use clap::Args;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::output::{OutputMode, render_success};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.boq/config.toml` with defaults even if `.boq/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_HEADER: &str = "# boq project configuration\n\
    # [cascade] switches control the optional recompute steps.\n\n";

const GITIGNORE: &str = "boq.db\nboq.db-wal\nboq.db-shm\n";

/// Execute `boq init`. Creates the project skeleton:
///
/// ```text
/// .boq/
///   boq.db         (migrated SQLite store)
///   config.toml    (default project config)
///   .gitignore     (database files)
/// ```
///
/// The store itself is never dropped: `--force` only rewrites the config.
///
/// # Errors
///
/// Returns an error if `.boq/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let boq_dir = project_root.join(BOQ_DIR);

    if boq_dir.exists() && !args.force {
        anyhow::bail!("{BOQ_DIR}/ already exists. Use `boq init --force` to rewrite its config.");
    }

    std::fs::create_dir_all(&boq_dir)
        .with_context(|| format!("Failed to create {}", boq_dir.display()))?;

    let config = ProjectConfig::default();
    let body = toml::to_string_pretty(&config).context("Failed to serialize default config")?;
    let config_path = boq_dir.join("config.toml");
    std::fs::write(&config_path, format!("{CONFIG_HEADER}{body}"))
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = boq_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = store_path(project_root);
    db::open_store(&db_path, Duration::from_millis(config.store.busy_timeout_ms))?;
    info!(path = %db_path.display(), "initialized store");

    let message = if output.is_json() {
        format!("Initialized {BOQ_DIR}/")
    } else {
        format!(
            "Initialized {BOQ_DIR}/ ({BOQ_DIR}/{STORE_FILE}, {BOQ_DIR}/config.toml)\n\n\
             Next steps:\n  boq project create --name \"Clinic\" --code CL"
        )
    };
    render_success(output, &message, &boq_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boq_core::config::load_project_config;

    #[test]
    fn fresh_init_creates_structure() {
        let root = tempfile::tempdir().expect("tempdir");
        run_init(&InitArgs { force: false }, OutputMode::Text, root.path()).expect("init");

        assert!(root.path().join(".boq").is_dir());
        assert!(root.path().join(".boq/config.toml").is_file());
        assert!(root.path().join(".boq/.gitignore").is_file());
        assert!(store_path(root.path()).is_file());

        let config = load_project_config(root.path()).expect("config parses back");
        assert_eq!(config.defaults.currency, "KES");
        assert!(config.cascade.rescan_on_contingency_change);
    }

    #[test]
    fn reinit_without_force_fails() {
        let root = tempfile::tempdir().expect("tempdir");
        let args = InitArgs { force: false };
        run_init(&args, OutputMode::Text, root.path()).expect("first init");
        assert!(run_init(&args, OutputMode::Text, root.path()).is_err());
        run_init(&InitArgs { force: true }, OutputMode::Text, root.path()).expect("forced");
    }
}
