use std::sync::Arc;

use crate::chembl::{ChemblActivity, ChemblClient, ChemblMolecule};
use crate::config::{ParamValue, Params};
use crate::domain::{ChemblId, CompoundQuery};
use crate::error::KiraError;
use crate::hit::{Hit, HitDraft, HitSchema};
use crate::search::Search;
use crate::searches::{SearchFactory, invalid, param_f64, param_list};
use crate::target::{TargetSource, TargetType};
use crate::taxonomy::{Taxon, TaxonKey, Taxonomy};

const SCHEMA: HitSchema = HitSchema::new(&[
    "taxon_id",
    "taxon_name",
    "pchembl",
    "std_type",
    "src_id",
    "exact_target_id",
]);
const DATA_SOURCE: &str = "ChEMBL :: activity";
const ACCEPTED_RELATIONS: [&str; 3] = ["=", "<", "<="];

/// Binding activities from ChEMBL, one hit per accepted record, with the
/// record's target collapsed onto its canonical ancestor.
pub struct ActivitySearch {
    key: String,
    chembl: Arc<dyn ChemblClient>,
    targets: Arc<dyn TargetSource>,
    allowed: Taxonomy,
    taxa: Vec<String>,
    min_pchembl: f64,
}

impl ActivitySearch {
    fn resolve(&self, compound: &str) -> Result<ChemblMolecule, KiraError> {
        let query: CompoundQuery = compound.parse()?;
        let molecule = self.chembl.molecule(&query)?;
        match &molecule.parent_id {
            Some(parent) if *parent != molecule.chembl_id => {
                tracing::debug!(%compound, parent = %parent, "following parent molecule");
                self.chembl.molecule(&parent.as_str().parse()?)
            }
            _ => Ok(molecule),
        }
    }

    fn taxon_of(&self, activity: &ChemblActivity) -> Option<&Taxon> {
        match (activity.target_tax_id, activity.target_organism.as_deref()) {
            (Some(id), _) if self.allowed.contains(id) => self.allowed.get(id),
            (_, Some(organism)) => self.allowed.get(TaxonKey::Name(organism.to_string())),
            _ => None,
        }
    }

    fn accepts(&self, activity: &ChemblActivity) -> bool {
        activity.data_validity_comment.is_none()
            && activity
                .standard_relation
                .as_deref()
                .is_some_and(|relation| ACCEPTED_RELATIONS.contains(&relation))
            && activity.assay_type.as_deref() == Some("B")
            && activity
                .pchembl_value
                .is_some_and(|pchembl| pchembl >= self.min_pchembl)
    }

    fn process(
        &self,
        lookup: &str,
        molecule: &ChemblMolecule,
        activity: &ChemblActivity,
    ) -> Result<Option<Hit>, KiraError> {
        if !self.accepts(activity) {
            return Ok(None);
        }
        let Some(taxon) = self.taxon_of(activity) else {
            return Ok(None);
        };
        let exact: ChemblId = activity.target_id.parse()?;
        let target = self.targets.target(&exact)?;
        if target.target_type() == TargetType::Unknown {
            tracing::error!(target_id = %exact, activity = %activity.activity_id, "target has type unknown; dropping record");
            return Ok(None);
        }
        let canonical = target.traverse_smart(self.targets.as_ref())?;
        let draft = HitDraft {
            record_id: Some(activity.activity_id.clone()),
            compound_id: molecule.chembl_id.to_string(),
            origin_inchikey: lookup.to_string(),
            matched_inchikey: molecule.inchikey.clone().unwrap_or_default(),
            compound_name: molecule.name.clone().unwrap_or_default(),
            predicate: "activity".to_string(),
            object_id: canonical.chembl_id().to_string(),
            object_name: canonical.name().unwrap_or_default().to_string(),
            cache_date: None,
            extra: vec![
                ("taxon_id", taxon.id().to_string()),
                ("taxon_name", taxon.name().to_string()),
                ("pchembl", activity.pchembl_value.unwrap_or_default().to_string()),
                ("std_type", activity.standard_type.clone().unwrap_or_default()),
                ("src_id", activity.src_id.map(|id| id.to_string()).unwrap_or_default()),
                ("exact_target_id", exact.to_string()),
            ],
        };
        self.create_hit(draft).map(Some)
    }
}

impl Search for ActivitySearch {
    fn key(&self) -> &str {
        &self.key
    }

    fn search_class(&self) -> &'static str {
        "ActivitySearch"
    }

    fn data_source(&self) -> &'static str {
        DATA_SOURCE
    }

    fn schema(&self) -> HitSchema {
        SCHEMA
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("taxa".to_string(), self.taxa.join(",")),
            ("min_pchembl".to_string(), self.min_pchembl.to_string()),
        ]
    }

    fn find(&self, compound: &str) -> Result<Vec<Hit>, KiraError> {
        let molecule = self.resolve(compound)?;
        let activities = self.chembl.activities(&molecule.chembl_id)?;
        let mut hits = Vec::new();
        for activity in &activities {
            if let Some(hit) = self.process(compound, &molecule, activity)? {
                hits.push(hit);
            }
        }
        Ok(hits)
    }
}

pub struct ActivityFactory {
    chembl: Arc<dyn ChemblClient>,
    targets: Arc<dyn TargetSource>,
    taxonomy: Arc<Taxonomy>,
}

impl ActivityFactory {
    pub fn new(
        chembl: Arc<dyn ChemblClient>,
        targets: Arc<dyn TargetSource>,
        taxonomy: Arc<Taxonomy>,
    ) -> Self {
        Self {
            chembl,
            targets,
            taxonomy,
        }
    }
}

impl SearchFactory for ActivityFactory {
    fn source(&self) -> &'static str {
        "activity"
    }

    fn search_class(&self) -> &'static str {
        "ActivitySearch"
    }

    fn data_source(&self) -> &'static str {
        DATA_SOURCE
    }

    fn description(&self) -> &'static str {
        "ChEMBL binding activities, targets collapsed to canonical ancestors"
    }

    fn defaults(&self) -> Params {
        Params::from([("min_pchembl".to_string(), ParamValue::Float(0.0))])
    }

    fn build(&self, key: &str, params: &Params) -> Result<Box<dyn Search>, KiraError> {
        let taxa = param_list(params, "taxa")
            .filter(|taxa| !taxa.is_empty())
            .ok_or_else(|| invalid(key, "taxa", "required"))?;
        let allowed = self
            .taxonomy
            .under_any(taxa.iter().map(|taxon| TaxonKey::parse(taxon)), true)
            .map_err(|err| invalid(key, "taxa", err.to_string()))?;
        let min_pchembl = param_f64(params, key, "min_pchembl")?.unwrap_or(0.0);
        if !min_pchembl.is_finite() || min_pchembl < 0.0 {
            return Err(invalid(key, "min_pchembl", "must be a non-negative number"));
        }
        Ok(Box::new(ActivitySearch {
            key: key.to_string(),
            chembl: Arc::clone(&self.chembl),
            targets: Arc::clone(&self.targets),
            allowed,
            taxa,
            min_pchembl,
        }))
    }
}
