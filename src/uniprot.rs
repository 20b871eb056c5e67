use std::time::Duration;

use camino::Utf8Path;

use crate::domain::TaxonId;
use crate::error::KiraError;
use crate::http::HttpAgent;
use crate::store::Store;
use crate::taxonomy::Taxonomy;

const PROVIDER: &str = "UniProt";
const TAXONOMY_STREAM_URL: &str = "https://rest.uniprot.org/taxonomy/stream";

pub trait TaxonomyClient: Send + Sync {
    /// Writes the gzipped TSV for `ancestor` and everything under it.
    fn download_taxonomy(&self, ancestor: TaxonId, destination: &Utf8Path)
    -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct UniprotTaxonomyClient {
    agent: HttpAgent,
}

impl UniprotTaxonomyClient {
    pub fn new(timeout: Duration) -> Result<Self, KiraError> {
        Ok(Self {
            agent: HttpAgent::new(PROVIDER, timeout)?,
        })
    }

    fn query(ancestor: TaxonId) -> Vec<(&'static str, String)> {
        vec![
            ("format", "tsv".to_string()),
            ("fields", "id,scientific_name,parent".to_string()),
            ("compressed", "true".to_string()),
            ("query", format!("(id:{ancestor}) OR (ancestor:{ancestor})")),
        ]
    }
}

impl TaxonomyClient for UniprotTaxonomyClient {
    fn download_taxonomy(
        &self,
        ancestor: TaxonId,
        destination: &Utf8Path,
    ) -> Result<(), KiraError> {
        let query = Self::query(ancestor);
        let response = self
            .agent
            .send_with_retries(|| self.agent.client().get(TAXONOMY_STREAM_URL).query(&query))?;
        let response = self.agent.handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::http(PROVIDER, err))?;
        Store::write_bytes_atomic(destination, &bytes)?;
        tracing::info!(%ancestor, path = %destination, bytes = bytes.len(), "downloaded taxonomy");
        Ok(())
    }
}

/// Reads the cached taxonomy for `ancestor`, downloading it first if absent.
pub fn load_taxonomy(
    store: &Store,
    client: &dyn TaxonomyClient,
    ancestor: TaxonId,
) -> Result<Taxonomy, KiraError> {
    let path = store.taxonomy_path(ancestor);
    if !path.as_std_path().exists() {
        client.download_taxonomy(ancestor, &path)?;
    } else {
        tracing::debug!(%ancestor, path = %path, "using cached taxonomy");
    }
    Taxonomy::from_path(&path)
}
