use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{ChemblId, CompoundQuery, QueryKind, TaxonId};
use crate::error::KiraError;
use crate::http::HttpAgent;
use crate::target::{Target, TargetSource, TargetType};

pub const DEFAULT_CHEMBL_URL: &str = "https://www.ebi.ac.uk/chembl/api/data";
const PROVIDER: &str = "ChEMBL";
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ChemblMolecule {
    pub chembl_id: ChemblId,
    pub name: Option<String>,
    pub inchikey: Option<String>,
    pub parent_id: Option<ChemblId>,
}

/// One row of ChEMBL's `activity` resource, reduced to what searches read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChemblActivity {
    pub activity_id: String,
    pub target_id: String,
    pub target_organism: Option<String>,
    pub target_tax_id: Option<TaxonId>,
    pub standard_relation: Option<String>,
    pub standard_type: Option<String>,
    pub assay_type: Option<String>,
    pub pchembl_value: Option<f64>,
    pub data_validity_comment: Option<String>,
    pub src_id: Option<u64>,
}

pub trait ChemblClient: Send + Sync {
    /// Resolves a query to a molecule record, or `CompoundNotFound`.
    fn molecule(&self, query: &CompoundQuery) -> Result<ChemblMolecule, KiraError>;

    /// Binding activities recorded against the parent molecule.
    fn activities(&self, parent: &ChemblId) -> Result<Vec<ChemblActivity>, KiraError>;
}

#[derive(Clone)]
pub struct ChemblHttpClient {
    agent: HttpAgent,
    base_url: String,
}

impl ChemblHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, KiraError> {
        Ok(Self {
            agent: HttpAgent::new(PROVIDER, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}.json", self.base_url)
    }

    fn molecule_by_filter(
        &self,
        field: &str,
        value: &str,
        query: &CompoundQuery,
    ) -> Result<ChemblMolecule, KiraError> {
        let page: MoleculePage = self
            .agent
            .get_json(&self.url("molecule"), &[(field, value.to_string())])?
            .ok_or_else(|| KiraError::CompoundNotFound(query.to_string()))?;
        match page.molecules.as_slice() {
            [] => Err(KiraError::CompoundNotFound(query.to_string())),
            [only] => molecule_from_wire(only),
            many => Err(KiraError::payload(
                PROVIDER,
                format!("{} matches for {query}", many.len()),
            )),
        }
    }

    fn paged<T, F>(
        &self,
        resource: &str,
        filters: &[(&str, String)],
        mut rows: F,
    ) -> Result<Vec<T>, KiraError>
    where
        F: FnMut(Value) -> Result<Vec<T>, KiraError>,
    {
        let url = self.url(resource);
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut query = filters.to_vec();
            query.push(("limit", PAGE_SIZE.to_string()));
            query.push(("offset", offset.to_string()));
            let Some(page) = self.agent.get_json::<Value>(&url, &query)? else {
                break;
            };
            let has_next = page
                .get("page_meta")
                .and_then(|meta| meta.get("next"))
                .is_some_and(|next| !next.is_null());
            out.extend(rows(page)?);
            if !has_next {
                break;
            }
            offset += PAGE_SIZE;
        }
        Ok(out)
    }
}

impl ChemblClient for ChemblHttpClient {
    fn molecule(&self, query: &CompoundQuery) -> Result<ChemblMolecule, KiraError> {
        match query.kind() {
            QueryKind::Smiles => self.molecule_by_filter(
                "molecule_structures__canonical_smiles__flexmatch",
                query.as_str(),
                query,
            ),
            QueryKind::Inchi => self.molecule_by_filter(
                "molecule_structures__standard_inchi",
                query.as_str(),
                query,
            ),
            QueryKind::Chembl | QueryKind::Inchikey => {
                let url = format!("{}/molecule/{}.json", self.base_url, query.as_str());
                let wire: MoleculeWire = self
                    .agent
                    .get_json(&url, &[])?
                    .ok_or_else(|| KiraError::CompoundNotFound(query.to_string()))?;
                molecule_from_wire(&wire)
            }
        }
    }

    fn activities(&self, parent: &ChemblId) -> Result<Vec<ChemblActivity>, KiraError> {
        let filters = [
            ("parent_molecule_chembl_id", parent.to_string()),
            ("assay_type", "B".to_string()),
            ("pchembl_value__isnull", "false".to_string()),
            ("target_organism__isnull", "false".to_string()),
        ];
        self.paged("activity", &filters, |page| {
            let rows = page
                .get("activities")
                .and_then(Value::as_array)
                .ok_or_else(|| KiraError::payload(PROVIDER, "activity page without activities"))?;
            Ok(rows.iter().map(activity_from_json).collect())
        })
    }
}

impl TargetSource for ChemblHttpClient {
    fn target(&self, id: &ChemblId) -> Result<Target, KiraError> {
        let url = format!("{}/target/{id}.json", self.base_url);
        let wire: TargetWire = self
            .agent
            .get_json(&url, &[])?
            .ok_or_else(|| KiraError::TargetNotFound(id.to_string()))?;
        let chembl_id = wire.target_chembl_id.parse()?;
        Ok(Target::new(
            chembl_id,
            wire.pref_name,
            TargetType::from_chembl(wire.target_type.as_deref().unwrap_or("")),
        ))
    }

    fn superset_of(&self, id: &ChemblId) -> Result<Vec<ChemblId>, KiraError> {
        let filters = [("target_chembl_id", id.to_string())];
        self.paged("target_relation", &filters, |page| {
            let relations: RelationPage = serde_json::from_value(page)
                .map_err(|err| KiraError::payload(PROVIDER, err.to_string()))?;
            relations
                .target_relations
                .into_iter()
                .filter(|relation| relation.relationship == "SUPERSET OF")
                .map(|relation| relation.related_target_chembl_id.parse::<ChemblId>())
                .collect()
        })
    }
}

#[derive(Debug, Deserialize)]
struct MoleculePage {
    molecules: Vec<MoleculeWire>,
}

#[derive(Debug, Deserialize)]
struct MoleculeWire {
    molecule_chembl_id: String,
    pref_name: Option<String>,
    molecule_structures: Option<StructuresWire>,
    molecule_hierarchy: Option<HierarchyWire>,
}

#[derive(Debug, Deserialize)]
struct StructuresWire {
    standard_inchi_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HierarchyWire {
    parent_chembl_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TargetWire {
    target_chembl_id: String,
    pref_name: Option<String>,
    target_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelationPage {
    target_relations: Vec<RelationWire>,
}

#[derive(Debug, Deserialize)]
struct RelationWire {
    related_target_chembl_id: String,
    relationship: String,
}

fn molecule_from_wire(wire: &MoleculeWire) -> Result<ChemblMolecule, KiraError> {
    let parent_id = wire
        .molecule_hierarchy
        .as_ref()
        .and_then(|h| h.parent_chembl_id.as_deref())
        .map(str::parse::<ChemblId>)
        .transpose()?;
    Ok(ChemblMolecule {
        chembl_id: wire.molecule_chembl_id.parse()?,
        name: wire.pref_name.clone(),
        inchikey: wire
            .molecule_structures
            .as_ref()
            .and_then(|s| s.standard_inchi_key.clone()),
        parent_id,
    })
}

// ChEMBL serializes several numeric columns as strings.
fn activity_from_json(row: &Value) -> ChemblActivity {
    let text = |field: &str| match row.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    ChemblActivity {
        activity_id: text("activity_id").unwrap_or_default(),
        target_id: text("target_chembl_id").unwrap_or_default(),
        target_organism: text("target_organism"),
        target_tax_id: text("target_tax_id").and_then(|v| v.parse().ok()),
        standard_relation: text("standard_relation"),
        standard_type: text("standard_type"),
        assay_type: text("assay_type"),
        pchembl_value: text("pchembl_value").and_then(|v| v.parse().ok()),
        data_validity_comment: text("data_validity_comment"),
        src_id: text("src_id").and_then(|v| v.parse().ok()),
    }
}
