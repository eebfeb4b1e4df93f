use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{GenomeType, TypeSelector};
use crate::download::{Pacing, clamp_workers};
use crate::error::KiraError;
use crate::filter::TypeFilter;
use crate::serialize::OutputFormat;

pub const CONFIG_FILE_NAME: &str = "kira-gr.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub task_delay_ms: Option<u64>,
    #[serde(default)]
    pub batch_delay_ms: Option<u64>,
    #[serde(default)]
    pub harvester_url: Option<String>,
    #[serde(default)]
    pub prefer_remote: Option<bool>,
    #[serde(default)]
    pub harvester_timeout_secs: Option<u64>,
    #[serde(default)]
    pub genome_types: Option<Vec<TypeSelector>>,
    #[serde(default)]
    pub exclude_types: Option<Vec<GenomeType>>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub annotation_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_genomes: Option<usize>,
}

/// Command-line values that win over the config file when set.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workers: Option<usize>,
    pub genome_types: Vec<TypeSelector>,
    pub exclude_types: Vec<GenomeType>,
    pub complete_only: bool,
    pub skip_metadata: bool,
    pub max_genomes: Option<usize>,
    pub prefer_remote: bool,
    pub harvester_url: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub annotation_dir: Option<PathBuf>,
    pub no_delay: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub workers: usize,
    pub pacing: Pacing,
    pub harvester_url: Option<String>,
    pub prefer_remote: bool,
    pub harvester_timeout: Duration,
    pub type_filter: TypeFilter,
    /// Classify by accession prefix only, never by fetched metadata.
    pub pattern_only: bool,
    pub skip_metadata: bool,
    pub max_genomes: Option<usize>,
    pub output_format: OutputFormat,
    pub annotation_dir: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

impl ResolvedConfig {
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(workers) = overrides.workers {
            self.workers = clamp_workers(workers);
        }
        if overrides.complete_only {
            self.type_filter = TypeFilter::complete_only();
            self.pattern_only = true;
        } else {
            self.type_filter = self
                .type_filter
                .overridden(overrides.genome_types, overrides.exclude_types);
        }
        self.skip_metadata |= overrides.skip_metadata;
        self.prefer_remote |= overrides.prefer_remote;
        if overrides.max_genomes.is_some() {
            self.max_genomes = overrides.max_genomes;
        }
        if overrides.harvester_url.is_some() {
            self.harvester_url = overrides.harvester_url;
        }
        if let Some(format) = overrides.output_format {
            self.output_format = format;
        }
        if overrides.annotation_dir.is_some() {
            self.annotation_dir = overrides.annotation_dir;
        }
        if overrides.no_delay {
            self.pacing = Pacing::none();
        }
        self
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Without one, `kira-gr.json` in the
    /// working directory and then the user config directory are tried, and
    /// defaults apply when neither exists.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            debug!("no config file found, using defaults");
            return Ok(Self::resolve_config(Config::default()));
        };
        debug!(path = %config_path.display(), "loading config");
        let config = Self::load(&config_path)?;
        Ok(Self::resolve_config(config))
    }

    pub fn load(path: &Path) -> Result<Config, KiraError> {
        let content =
            fs::read_to_string(path).map_err(|_| KiraError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = Pacing::default();
        let pacing = Pacing {
            task_delay: config
                .task_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.task_delay),
            batch_delay: config
                .batch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_delay),
        };
        let include = config
            .genome_types
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| vec![TypeSelector::All]);

        ResolvedConfig {
            workers: clamp_workers(config.workers.unwrap_or(10)),
            pacing,
            harvester_url: config.harvester_url.filter(|url| !url.trim().is_empty()),
            prefer_remote: config.prefer_remote.unwrap_or(false),
            harvester_timeout: Duration::from_secs(config.harvester_timeout_secs.unwrap_or(5)),
            type_filter: TypeFilter::new(include, config.exclude_types.unwrap_or_default()),
            pattern_only: false,
            skip_metadata: false,
            max_genomes: config.max_genomes,
            output_format: config.output_format.unwrap_or_default(),
            annotation_dir: config.annotation_dir,
        }
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "kira-gr")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let resolved = ResolvedConfig::default();
        assert_eq!(resolved.workers, 10);
        assert_eq!(resolved.pacing, Pacing::default());
        assert_eq!(resolved.harvester_timeout, Duration::from_secs(5));
        assert!(resolved.type_filter.is_trivial());
        assert_eq!(resolved.output_format, OutputFormat::Json);
        assert!(!resolved.prefer_remote);
    }

    #[test]
    fn complete_only_switches_to_pattern_classifier() {
        let resolved = ResolvedConfig::default().apply(ConfigOverrides {
            complete_only: true,
            genome_types: vec![TypeSelector::Plasmid],
            ..ConfigOverrides::default()
        });
        assert_eq!(resolved.type_filter, TypeFilter::complete_only());
        assert!(resolved.pattern_only);
    }
}
