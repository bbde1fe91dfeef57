//! Deployment configuration.
//!
//! A YAML file lists the sources to join plus cache, timeout, key-alias and
//! classification settings. Every field except `sources` has a default, and
//! sources can also be supplied (or overridden per kind) from the command line.

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::{
    cache::DEFAULT_TTL_SECS,
    classify::{ColumnClassifier, ColumnTag, ExplicitClassifier, SubstringClassifier},
    io_utils,
    schema,
    source::{DEFAULT_TIMEOUT_SECS, Location, SourceDescriptor, SourceFormat, SourceKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub location: Location,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

impl SourceConfig {
    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            location: self.location.clone(),
            sheet: self.sheet.clone(),
            format: self.format,
        }
    }
}

/// Parses `kind=location[#sheet]`.
impl FromStr for SourceConfig {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (kind, rest) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("Source '{value}' must look like kind=location[#sheet]"))?;
        let kind: SourceKind = kind.parse()?;
        let descriptor: SourceDescriptor = rest.parse()?;
        Ok(SourceConfig {
            kind,
            location: descriptor.location,
            sheet: descriptor.sheet,
            format: descriptor.format,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub input_encoding: Option<String>,
    #[serde(default)]
    pub key_aliases: Option<Vec<String>>,
    #[serde(default)]
    pub classification: Option<BTreeMap<ColumnTag, Vec<String>>>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            input_encoding: None,
            key_aliases: None,
            classification: None,
            sources: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Parsing config YAML")
    }

    /// Adds `sources`, replacing any configured source of the same kind.
    pub fn merge_sources(&mut self, sources: Vec<SourceConfig>) {
        for source in sources {
            self.sources.retain(|existing| existing.kind != source.kind);
            self.sources.push(source);
        }
    }

    /// Puts `aliases` ahead of the configured (or default) alias list.
    pub fn prepend_key_aliases(&mut self, aliases: Vec<String>) {
        if aliases.is_empty() {
            return;
        }
        let mut merged = aliases;
        merged.extend(self.key_aliases());
        self.key_aliases = Some(merged);
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.sources.is_empty(),
            "No sources configured; pass --config or --source kind=location"
        );
        let mut kinds = HashSet::new();
        for source in &self.sources {
            ensure!(
                kinds.insert(source.kind),
                "Source kind '{}' is configured more than once",
                source.kind
            );
        }
        if let Some(aliases) = &self.key_aliases {
            ensure!(
                aliases.iter().any(|alias| !alias.trim().is_empty()),
                "key_aliases must contain at least one non-blank alias"
            );
        }
        self.encoding()?;
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        Ok(io_utils::resolve_encoding(self.input_encoding.as_deref())?)
    }

    pub fn key_aliases(&self) -> Vec<String> {
        self.key_aliases
            .clone()
            .unwrap_or_else(schema::default_key_aliases)
    }

    pub fn classifier(&self) -> Box<dyn ColumnClassifier> {
        match &self.classification {
            Some(by_tag) => Box::new(ExplicitClassifier::new(by_tag)),
            None => Box::new(SubstringClassifier::default()),
        }
    }
}
