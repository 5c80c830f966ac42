use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;
use verdict_core::config::{self, PROJECT_CONFIG, PROJECT_DIR};

use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.verdict/config.toml` with the template.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    config: String,
    snapshots: String,
    overwritten: bool,
}

/// Execute `vd init`. Creates the project skeleton:
///
/// ```text
/// .verdict/
///   config.toml         (project config template)
///   annotations/        (per-reviewer snapshots)
/// ```
///
/// # Errors
///
/// Returns an error if the config already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let config_path = project_root.join(PROJECT_CONFIG);
    let existed = config_path.exists();
    if existed && !args.force {
        anyhow::bail!("{PROJECT_CONFIG} already exists. Use `vd init --force` to rewrite it.");
    }

    let project_dir = project_root.join(PROJECT_DIR);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;
    std::fs::write(&config_path, config::config_template())
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let snapshot_dir = config::load_project_config(project_root)?.snapshot_dir(project_root);
    std::fs::create_dir_all(&snapshot_dir).with_context(|| {
        format!(
            "Failed to create snapshot directory: {}",
            snapshot_dir.display()
        )
    })?;
    info!(root = %project_root.display(), "project initialized");

    let report = InitOutput {
        config: PROJECT_CONFIG.to_string(),
        snapshots: snapshot_dir
            .strip_prefix(project_root)
            .unwrap_or(&snapshot_dir)
            .display()
            .to_string(),
        overwritten: existed,
    };

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "config={}", r.config)?;
            writeln!(w, "snapshots={}", r.snapshots)?;
            writeln!(w, "overwritten={}", r.overwritten)
        },
        |r, w| {
            writeln!(w, "✓ Initialized {PROJECT_DIR}/ project structure.")?;
            writeln!(w)?;
            writeln!(w, "  Config:     {}", r.config)?;
            writeln!(w, "  Snapshots:  {}", r.snapshots)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  Add reviewers under [reviewers] and point [dataset] at your CSV.")?;
            writeln!(w, "  Then start a session:")?;
            writeln!(w, "    export VERDICT_REVIEWER=your-id")?;
            writeln!(w, "    vd annotate")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fresh_init_creates_structure() {
        let dir = TempDir::new().expect("tempdir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");

        assert!(dir.path().join(PROJECT_CONFIG).is_file());
        assert!(dir.path().join(".verdict/annotations").is_dir());
        let config = config::require_project_config(dir.path()).expect("template parses");
        assert!(config.reviewers.is_empty());
    }

    #[test]
    fn second_init_requires_force() {
        let dir = TempDir::new().expect("tempdir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");
        let err = run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).unwrap_err();
        assert!(err.to_string().contains("--force"));
        run_init(&InitArgs { force: true }, OutputMode::Json, dir.path()).expect("forced init");
    }
}
