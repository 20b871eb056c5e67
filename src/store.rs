use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;

use crate::domain::TaxonId;
use crate::error::KiraError;

pub const MARKER_SUFFIX: &str = ".done";

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("kira-compound-annotator"),
                )
                .ok()
            })
            .ok_or_else(|| {
                KiraError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self { cache_root })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn taxonomy_dir(&self) -> Utf8PathBuf {
        self.cache_root.join("taxonomy")
    }

    pub fn taxonomy_path(&self, ancestor: TaxonId) -> Utf8PathBuf {
        self.taxonomy_dir().join(format!("{ancestor}.tsv.gz"))
    }

    pub fn ensure_cache_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    /// `<output>.done`, next to the output file.
    pub fn marker_path(output: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{output}{MARKER_SUFFIX}"))
    }

    pub fn is_marked(output: &Utf8Path) -> bool {
        Self::marker_path(output).as_std_path().exists()
    }

    pub fn write_marker(output: &Utf8Path) -> Result<(), KiraError> {
        Self::write_bytes_atomic(&Self::marker_path(output), &[])
    }

    /// Writes through a temp file in the destination directory, syncs it,
    /// then renames it over `path`.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("kira-ca-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
