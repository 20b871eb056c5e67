//! Batch execution of configured searches over one compound list.
//!
//! A batch is validated and expanded into [`JobUnit`]s up front. Units whose
//! marker file exists are skipped, every remaining unit is built once as a
//! dry run, and only then are the searches run. The per-unit outputs are
//! concatenated into one final table next to a provenance table.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::sync::Arc;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::{BatchConfig, Params};
use crate::error::KiraError;
use crate::hit::BASE_COLUMNS;
use crate::search::{ProgressEvent, ProgressSink, Search, search_name};
use crate::searches::SearchFactory;
use crate::store::Store;
use crate::table::Table;

pub const DEFAULT_SUFFIX: &str = ".tsv";
pub const EXPLAIN_COLUMNS: [&str; 6] = ["key", "search", "category", "source", "desc", "args"];

/// Job-scoped keys that are consumed by the runner rather than passed on.
const RESERVED_JOB_KEYS: [&str; 4] = ["source", "key", "category", "to"];

/// Search factories by `source` name.
#[derive(Default, Clone)]
pub struct SearchRegistry {
    factories: BTreeMap<&'static str, Arc<dyn SearchFactory>>,
}

impl SearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: Arc<dyn SearchFactory>) -> &mut Self {
        self.factories.insert(factory.source(), factory);
        self
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn SearchFactory>> {
        self.factories.get(source).cloned()
    }

    pub fn sources(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

/// One configured search bound to its parameters and output file.
#[derive(Clone)]
pub struct JobUnit {
    key: String,
    source: String,
    category: Option<String>,
    params: Params,
    output_path: Utf8PathBuf,
    factory: Arc<dyn SearchFactory>,
}

impl JobUnit {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Merged parameters: factory defaults, then `meta`, then the job.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn output_path(&self) -> &Utf8Path {
        &self.output_path
    }

    pub fn marker_path(&self) -> Utf8PathBuf {
        Store::marker_path(&self.output_path)
    }

    pub fn was_run(&self) -> bool {
        Store::is_marked(&self.output_path)
    }

    pub fn args(&self) -> String {
        self.params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Builds the search without running it.
    pub fn test(&self) -> Result<Box<dyn Search>, KiraError> {
        self.factory.build(&self.key, &self.params)
    }

    /// Runs `search` over `compounds`, writes the output, then the marker.
    pub fn run(
        &self,
        search: &dyn Search,
        compounds: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<usize, KiraError> {
        let hits = search.find_all(compounds, sink)?;
        let table = search.schema().to_table(&hits)?;
        table.write_path(&self.output_path)?;
        Store::write_marker(&self.output_path)?;
        tracing::info!(key = %self.key, hits = hits.len(), path = %self.output_path, "search done");
        Ok(hits.len())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub ran: Vec<String>,
    pub skipped: Vec<String>,
    pub final_path: String,
    pub explain_path: String,
    pub rows: usize,
}

pub struct MultiSearch {
    units: Vec<JobUnit>,
    input_path: Utf8PathBuf,
    config_path: Utf8PathBuf,
    out_dir: Utf8PathBuf,
    suffix: String,
}

impl MultiSearch {
    /// Validates the batch and expands it into job units. Nothing is built
    /// or run here.
    pub fn build(
        registry: &SearchRegistry,
        config: &BatchConfig,
        input_path: &Utf8Path,
        config_path: &Utf8Path,
        out_dir: &Utf8Path,
        suffix: Option<&str>,
    ) -> Result<Self, KiraError> {
        config.validate()?;
        let suffix = suffix.unwrap_or(DEFAULT_SUFFIX).to_string();
        let mut seen = HashSet::new();
        let mut outputs: HashSet<Utf8PathBuf> = HashSet::new();
        let mut units = Vec::with_capacity(config.search.len());

        for (index, job) in config.search.iter().enumerate() {
            let source = job.get("source").map(ToString::to_string).ok_or_else(|| {
                KiraError::ConfigParse(format!("search #{} has no source", index + 1))
            })?;
            let key = job
                .get("key")
                .map(ToString::to_string)
                .unwrap_or_else(|| source.clone());
            let Some(factory) = registry.get(&source) else {
                let known: Vec<&str> = registry.sources().collect();
                tracing::error!(source = %source, known = ?known, "no search registered for source");
                return Err(KiraError::UnknownSearch {
                    source_name: source,
                    key,
                });
            };
            if !seen.insert(key.clone()) {
                return Err(KiraError::DuplicateSearchKey(key));
            }

            let mut params = factory.defaults();
            params.extend(config.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            params.extend(
                job.iter()
                    .filter(|(k, _)| !RESERVED_JOB_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone())),
            );

            let output_path = match job.get("to") {
                Some(to) => {
                    let to = to.to_string();
                    if !stays_inside(Utf8Path::new(&to)) {
                        return Err(KiraError::OutputOutsideDir { key, to });
                    }
                    out_dir.join(to)
                }
                None => out_dir.join(format!("{key}{suffix}")),
            };
            if !outputs.insert(output_path.clone()) {
                return Err(KiraError::DuplicateOutputPath {
                    key,
                    path: output_path.to_string(),
                });
            }
            units.push(JobUnit {
                key,
                source,
                category: job.get("category").map(ToString::to_string),
                params,
                output_path,
                factory,
            });
        }

        let batch = Self {
            units,
            input_path: input_path.to_path_buf(),
            config_path: config_path.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            suffix,
        };
        for reserved in [batch.final_path(), batch.explain_path()] {
            if let Some(unit) = batch.units.iter().find(|unit| unit.output_path == reserved) {
                return Err(KiraError::DuplicateOutputPath {
                    key: unit.key.clone(),
                    path: reserved.to_string(),
                });
            }
        }

        let skipping: Vec<&str> = batch
            .units
            .iter()
            .filter(|unit| unit.was_run())
            .map(|unit| unit.key())
            .collect();
        if !skipping.is_empty() {
            tracing::info!(keys = %skipping.join(", "), "skipping searches (already run)");
        }
        Ok(batch)
    }

    pub fn units(&self) -> &[JobUnit] {
        &self.units
    }

    /// `out_dir/search_<input name>_<config name><suffix>`.
    pub fn final_path(&self) -> Utf8PathBuf {
        let input = self.input_path.file_name().unwrap_or("input");
        let config = self.config_path.file_name().unwrap_or("config");
        self.out_dir
            .join(format!("search_{input}_{config}{}", self.suffix))
    }

    pub fn explain_path(&self) -> Utf8PathBuf {
        let final_path = self.final_path();
        let stem = final_path
            .as_str()
            .strip_suffix(self.suffix.as_str())
            .unwrap_or(final_path.as_str());
        Utf8PathBuf::from(format!("{stem}_explain.tsv"))
    }

    /// Provenance table, one row per unit, from build-time data only.
    pub fn explain(&self) -> Result<Table, KiraError> {
        let mut table = Table::with_columns(&EXPLAIN_COLUMNS);
        for unit in &self.units {
            table.push_row(vec![
                unit.key.clone(),
                search_name(unit.factory.search_class()),
                unit.category.clone().unwrap_or_default(),
                unit.factory.data_source().to_string(),
                unit.factory.description().to_string(),
                unit.args(),
            ])?;
        }
        Ok(table)
    }

    pub fn run(&self, sink: &dyn ProgressSink) -> Result<BatchReport, KiraError> {
        let explain_path = self.explain_path();
        self.explain()?.write_path(&explain_path)?;

        let (done, pending): (Vec<&JobUnit>, Vec<&JobUnit>) =
            self.units.iter().partition(|unit| unit.was_run());

        let mut searches = Vec::with_capacity(pending.len());
        for unit in &pending {
            searches.push(unit.test()?);
            tracing::info!(key = %unit.key, "search looks ok");
        }
        tracing::info!(count = pending.len(), "all searches look ok");

        let compounds = if pending.is_empty() {
            Vec::new()
        } else {
            read_compounds(&self.input_path)?
        };
        for (unit, search) in pending.iter().zip(&searches) {
            sink.event(ProgressEvent {
                message: format!("phase=Run; key={}", unit.key),
                elapsed: None,
            });
            unit.run(search.as_ref(), &compounds, sink)?;
        }
        tracing::info!("done with all searches");

        let tables = self
            .units
            .iter()
            .map(|unit| Ok((unit.output_path.to_string(), Table::read_path(&unit.output_path)?)))
            .collect::<Result<Vec<_>, KiraError>>()?;
        let combined = Table::concat(&tables, &BASE_COLUMNS)?;
        let final_path = self.final_path();
        combined.write_path(&final_path)?;
        tracing::info!(path = %final_path, rows = combined.len(), "concatenated results");

        Ok(BatchReport {
            ran: pending.iter().map(|unit| unit.key.clone()).collect(),
            skipped: done.iter().map(|unit| unit.key.clone()).collect(),
            final_path: final_path.to_string(),
            explain_path: explain_path.to_string(),
            rows: combined.len(),
        })
    }
}

/// A relative path made only of normal components.
fn stays_inside(path: &Utf8Path) -> bool {
    path.components()
        .all(|component| matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir))
        && path.components().any(|component| matches!(component, Utf8Component::Normal(_)))
}

/// Compound ids from a plain list (`#` comments and blank lines ignored) or
/// from the `inchikey` column of a TSV.
pub fn read_compounds(path: &Utf8Path) -> Result<Vec<String>, KiraError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    let Some(first) = lines.next() else {
        return Ok(Vec::new());
    };

    if first.contains('\t') {
        let table = Table::from_reader(content.as_bytes(), path.as_str())?;
        let values = table
            .column_values("inchikey")
            .ok_or_else(|| KiraError::SchemaMismatch {
                path: path.to_string(),
                message: "compound table has no inchikey column".to_string(),
            })?;
        return Ok(values
            .into_iter()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect());
    }

    let header = first.eq_ignore_ascii_case("inchikey");
    let compounds = std::iter::once(first)
        .filter(|_| !header)
        .chain(lines)
        .map(str::to_string)
        .collect();
    Ok(compounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn reads_plain_lists() {
        let (_temp, root) = temp_root();
        let path = root.join("compounds.txt");
        fs::write(&path, "# header\nCHEMBL25\n\n  CHEMBL1200 \n").unwrap();
        assert_eq!(read_compounds(&path).unwrap(), vec!["CHEMBL25", "CHEMBL1200"]);
    }

    #[test]
    fn reads_inchikey_column() {
        let (_temp, root) = temp_root();
        let path = root.join("compounds.tsv");
        fs::write(
            &path,
            "name\tInChIKey\naspirin\tBSYNRYMUTXBXSQ-UHFFFAOYSA-N\nblank\t\n",
        )
        .unwrap();
        assert_eq!(
            read_compounds(&path).unwrap(),
            vec!["BSYNRYMUTXBXSQ-UHFFFAOYSA-N"]
        );
    }

    #[test]
    fn comments_before_a_tsv_header_are_ignored() {
        let (_temp, root) = temp_root();
        let path = root.join("exported.tsv");
        fs::write(
            &path,
            "# exported\nname\tinchikey\naspirin\tBSYNRYMUTXBXSQ-UHFFFAOYSA-N\n",
        )
        .unwrap();
        assert_eq!(
            read_compounds(&path).unwrap(),
            vec!["BSYNRYMUTXBXSQ-UHFFFAOYSA-N"]
        );
    }

    #[test]
    fn output_paths_must_stay_inside() {
        assert!(stays_inside(Utf8Path::new("hits.tsv")));
        assert!(stays_inside(Utf8Path::new("./nested/hits.tsv")));
        assert!(!stays_inside(Utf8Path::new("../hits.tsv")));
        assert!(!stays_inside(Utf8Path::new("nested/../../hits.tsv")));
        assert!(!stays_inside(Utf8Path::new("/tmp/hits.tsv")));
        assert!(!stays_inside(Utf8Path::new(".")));
    }
}
