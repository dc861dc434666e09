// ⚙️ Run Configuration - panel-reconcile.toml
//
// Sources are listed in load order; that order is also the recency order
// used to break ties between sources of equal precedence.

use crate::generate::FilterPolicy;
use crate::parser::SourceFormat;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "panel-reconcile.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sources: Vec<SourceEntry>,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
    pub filter: FilterConfig,
}

/// One input file. `kind` is detected from the file name when absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub kind: Option<SourceFormat>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Run folders are created below this
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("panel_database.db"),
        }
    }
}

/// Optional subsets; empty lists mean "everything"
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub panels: Vec<String>,
    pub indications: Vec<String>,
}

impl FilterConfig {
    pub fn to_policy(&self) -> FilterPolicy {
        let subset = |values: &[String]| {
            (!values.is_empty()).then(|| values.iter().map(|v| v.trim().to_string()).collect::<BTreeSet<_>>())
        };

        FilterPolicy {
            panels: subset(&self.panels),
            indications: subset(&self.indications),
        }
    }
}

impl RunConfig {
    /// Relative source/output/database paths are taken relative to the
    /// directory holding the config file.
    pub fn rebase(mut self, base: &Path) -> Self {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        for source in &mut self.sources {
            rebase(&mut source.path);
        }
        rebase(&mut self.output.root);
        rebase(&mut self.database.path);
        self
    }
}

pub fn discover_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        debug!(path = %path.display(), "found config file");
        Some(path)
    } else {
        debug!(path = %path.display(), "no config file");
        None
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("parse config file {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.rebase(base))
}

pub fn parse_config(contents: &str) -> anyhow::Result<RunConfig> {
    let config: RunConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

pub fn load_or_default(dir: &Path) -> anyhow::Result<RunConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(RunConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [[sources]]
            path = "dumps/hgnc_dump.tsv"

            [[sources]]
            kind = "provider_panels"
            path = "dumps/gms.json"

            [output]
            root = "runs"

            [filter]
            indications = ["R100"]
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, None);
        assert_eq!(config.sources[1].kind, Some(SourceFormat::ProviderPanels));
        assert_eq!(config.output.root, PathBuf::from("runs"));
        assert_eq!(config.database.path, PathBuf::from("panel_database.db"));

        let policy = config.filter.to_policy();
        assert_eq!(policy.panels, None);
        assert_eq!(policy.indications, Some(BTreeSet::from(["R100".to_string()])));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse_config("").unwrap(), RunConfig::default());
        assert!(RunConfig::default().filter.to_policy().is_unrestricted());
    }

    #[test]
    fn test_unknown_source_kind_is_rejected() {
        let err = parse_config("[[sources]]\nkind = \"spreadsheet\"\npath = \"x.tsv\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[[sources]]\npath = \"hgnc.tsv\"\n",
        )
        .unwrap();

        let config = load_or_default(dir.path()).unwrap();
        assert_eq!(config.sources[0].path, dir.path().join("hgnc.tsv"));
        assert_eq!(config.output.root, dir.path().join("output"));
    }
}
