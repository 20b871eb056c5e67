use std::sync::Arc;

use crate::config::Params;
use crate::error::KiraError;
use crate::g2p::{G2pClient, G2pInteraction, G2pLigand};
use crate::hit::{Hit, HitDraft, HitSchema};
use crate::search::Search;
use crate::searches::{SearchFactory, param_text};

const SCHEMA: HitSchema = HitSchema::new(&[
    "action",
    "affinity",
    "measurement",
    "species",
    "primary",
    "selective",
    "endogenous",
]);
const DATA_SOURCE: &str = "G2P :: interactions";

/// Guide to Pharmacology ligand interactions, one hit per interaction.
pub struct G2pInteractionSearch {
    key: String,
    client: Arc<dyn G2pClient>,
    species: Option<String>,
}

impl G2pInteractionSearch {
    fn keeps(&self, interaction: &G2pInteraction) -> bool {
        match &self.species {
            None => true,
            Some(wanted) => interaction
                .target_species
                .as_deref()
                .is_some_and(|species| species.eq_ignore_ascii_case(wanted)),
        }
    }

    fn process(
        &self,
        lookup: &str,
        ligand: &G2pLigand,
        interaction: &G2pInteraction,
    ) -> Result<Hit, KiraError> {
        self.create_hit(HitDraft {
            record_id: None,
            compound_id: ligand.ligand_id.to_string(),
            origin_inchikey: lookup.to_string(),
            matched_inchikey: ligand.inchikey.clone(),
            compound_name: ligand.name.clone(),
            predicate: format!("interaction:{}", interaction.action),
            object_id: interaction.target_id.clone(),
            object_name: interaction.target_name.clone(),
            cache_date: None,
            extra: vec![
                ("action", interaction.action.clone()),
                ("affinity", interaction.affinity.clone().unwrap_or_default()),
                ("measurement", interaction.affinity_units.clone().unwrap_or_default()),
                ("species", interaction.target_species.clone().unwrap_or_default()),
                ("primary", interaction.primary_target.to_string()),
                ("selective", interaction.selectivity.clone().unwrap_or_default()),
                ("endogenous", interaction.endogenous.to_string()),
            ],
        })
    }
}

impl Search for G2pInteractionSearch {
    fn key(&self) -> &str {
        &self.key
    }

    fn search_class(&self) -> &'static str {
        "G2pInteractionSearch"
    }

    fn data_source(&self) -> &'static str {
        DATA_SOURCE
    }

    fn schema(&self) -> HitSchema {
        SCHEMA
    }

    fn params(&self) -> Vec<(String, String)> {
        match &self.species {
            Some(species) => vec![("species".to_string(), species.clone())],
            None => Vec::new(),
        }
    }

    fn find(&self, compound: &str) -> Result<Vec<Hit>, KiraError> {
        let ligand = self.client.ligand(compound)?;
        ligand
            .interactions
            .iter()
            .filter(|interaction| self.keeps(interaction))
            .map(|interaction| self.process(compound, &ligand, interaction))
            .collect()
    }
}

pub struct G2pFactory {
    client: Arc<dyn G2pClient>,
}

impl G2pFactory {
    pub fn new(client: Arc<dyn G2pClient>) -> Self {
        Self { client }
    }
}

impl SearchFactory for G2pFactory {
    fn source(&self) -> &'static str {
        "g2p"
    }

    fn search_class(&self) -> &'static str {
        "G2pInteractionSearch"
    }

    fn data_source(&self) -> &'static str {
        DATA_SOURCE
    }

    fn description(&self) -> &'static str {
        "Guide to Pharmacology ligand-target interactions"
    }

    fn build(&self, key: &str, params: &Params) -> Result<Box<dyn Search>, KiraError> {
        Ok(Box::new(G2pInteractionSearch {
            key: key.to_string(),
            client: Arc::clone(&self.client),
            species: param_text(params, "species"),
        }))
    }
}
