use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::chembl::DEFAULT_CHEMBL_URL;
use crate::domain::TaxonId;
use crate::error::KiraError;
use crate::g2p::DEFAULT_G2P_URL;

pub const SETTINGS_FILE: &str = "kira-ca.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Vertebrata.
pub const DEFAULT_TAXONOMY_ANCESTOR: TaxonId = TaxonId(7742);

/// Keys that configure the whole batch and may not appear on a job.
pub const FORBIDDEN_JOB_KEYS: [&str; 5] = ["dir", "out-dir", "out_dir", "check", "no_setup"];
/// Keys that identify a single job and may not appear in `meta`.
pub const FORBIDDEN_META_KEYS: [&str; 4] = ["key", "source", "category", "to"];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub taxonomy: Option<TaxonomyEntry>,
    #[serde(default)]
    pub chembl_url: Option<String>,
    #[serde(default)]
    pub g2p_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub cache_root: Option<String>,
}

/// `"7742"` names an ancestor taxon to download; anything else is a path.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TaxonomyEntry {
    Shorthand(String),
    Detailed(TaxonomyEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TaxonomyEntryObject {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub ancestor: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonomySource {
    Path(Utf8PathBuf),
    Ancestor(TaxonId),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub schema_version: u32,
    pub taxonomy: TaxonomySource,
    pub chembl_url: String,
    pub g2p_url: String,
    pub timeout: Duration,
    pub cache_root: Option<Utf8PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            taxonomy: TaxonomySource::Ancestor(DEFAULT_TAXONOMY_ANCESTOR),
            chembl_url: DEFAULT_CHEMBL_URL.to_string(),
            g2p_url: DEFAULT_G2P_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_root: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; without one, `kira-ca.json` in the
    /// working directory is used when present and defaults otherwise.
    pub fn resolve(path: Option<&str>) -> Result<Settings, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(SETTINGS_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let file: SettingsFile = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_settings(file)
    }

    pub fn resolve_settings(file: SettingsFile) -> Result<Settings, KiraError> {
        let defaults = Settings::default();
        let taxonomy = match file.taxonomy {
            None => defaults.taxonomy,
            Some(TaxonomyEntry::Shorthand(value)) => match value.parse::<TaxonId>() {
                Ok(id) => TaxonomySource::Ancestor(id),
                Err(_) => TaxonomySource::Path(Utf8PathBuf::from(value)),
            },
            Some(TaxonomyEntry::Detailed(obj)) => match (obj.path, obj.ancestor) {
                (Some(path), None) => TaxonomySource::Path(Utf8PathBuf::from(path)),
                (None, Some(id)) => TaxonomySource::Ancestor(TaxonId(id)),
                (None, None) => defaults.taxonomy,
                (Some(_), Some(_)) => {
                    return Err(KiraError::ConfigParse(
                        "taxonomy takes either path or ancestor, not both".to_string(),
                    ));
                }
            },
        };
        let timeout_secs = file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(KiraError::ConfigParse(
                "timeout_secs must be positive".to_string(),
            ));
        }

        Ok(Settings {
            schema_version: file.schema_version.unwrap_or(1),
            taxonomy,
            chembl_url: file.chembl_url.unwrap_or(defaults.chembl_url),
            g2p_url: file.g2p_url.unwrap_or(defaults.g2p_url),
            timeout: Duration::from_secs(timeout_secs),
            cache_root: file.cache_root.map(Utf8PathBuf::from),
        })
    }
}

/// A search parameter value as written in a batch file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(value) => write!(f, "{value}"),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
            ParamValue::List(values) => {
                let joined = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                f.write_str(&joined)
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// `[meta]` defaults plus one `[[search]]` table per job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub meta: Params,
    #[serde(default)]
    pub search: Vec<Params>,
}

impl BatchConfig {
    /// `.toml` files are TOML; anything else is read as JSON.
    pub fn from_path(path: &Utf8Path) -> Result<Self, KiraError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| KiraError::ConfigRead(path.as_std_path().to_path_buf()))?;
        if path.extension() == Some("toml") {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, KiraError> {
        toml::from_str(content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self, KiraError> {
        serde_json::from_str(content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }

    /// Rejects batch-scoped keys on jobs and job-scoped keys in `meta`.
    pub fn validate(&self) -> Result<(), KiraError> {
        check_forbidden("meta", &self.meta, &FORBIDDEN_META_KEYS)?;
        for (index, job) in self.search.iter().enumerate() {
            let section = match job.get("key").or_else(|| job.get("source")) {
                Some(name) => format!("search {name}"),
                None => format!("search #{}", index + 1),
            };
            check_forbidden(&section, job, &FORBIDDEN_JOB_KEYS)?;
        }
        Ok(())
    }
}

fn check_forbidden(section: &str, params: &Params, forbidden: &[&str]) -> Result<(), KiraError> {
    let found: Vec<&str> = forbidden
        .iter()
        .copied()
        .filter(|key| params.contains_key(*key))
        .collect();
    if found.is_empty() {
        return Ok(());
    }
    Err(KiraError::ForbiddenKey {
        section: section.to_string(),
        keys: found.join(", "),
    })
}
