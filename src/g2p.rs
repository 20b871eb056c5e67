use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use crate::error::KiraError;
use crate::http::HttpAgent;

pub const DEFAULT_G2P_URL: &str = "https://www.guidetopharmacology.org/services";
const PROVIDER: &str = "G2P";

#[derive(Debug, Clone, PartialEq)]
pub struct G2pLigand {
    pub ligand_id: u64,
    pub name: String,
    pub inchikey: String,
    pub interactions: Vec<G2pInteraction>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct G2pInteraction {
    pub target_id: String,
    pub target_name: String,
    pub action: String,
    pub affinity: Option<String>,
    pub affinity_units: Option<String>,
    pub target_species: Option<String>,
    pub primary_target: bool,
    pub selectivity: Option<String>,
    pub endogenous: bool,
}

pub trait G2pClient: Send + Sync {
    /// The ligand with this InChIKey and all of its interactions, or
    /// `CompoundNotFound`.
    fn ligand(&self, inchikey: &str) -> Result<G2pLigand, KiraError>;
}

pub struct G2pHttpClient {
    agent: HttpAgent,
    base_url: String,
    target_names: Mutex<HashMap<u64, String>>,
}

impl G2pHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, KiraError> {
        Ok(Self {
            agent: HttpAgent::new(PROVIDER, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            target_names: Mutex::new(HashMap::new()),
        })
    }

    fn target_name(&self, target_id: u64) -> Result<String, KiraError> {
        if let Some(name) = self.lock_names().get(&target_id) {
            return Ok(name.clone());
        }
        let url = format!("{}/targets/{target_id}", self.base_url);
        let name = self
            .agent
            .get_json::<TargetWire>(&url, &[])?
            .map(|wire| wire.name)
            .unwrap_or_default();
        self.lock_names().insert(target_id, name.clone());
        Ok(name)
    }

    fn lock_names(&self) -> std::sync::MutexGuard<'_, HashMap<u64, String>> {
        self.target_names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl G2pClient for G2pHttpClient {
    fn ligand(&self, inchikey: &str) -> Result<G2pLigand, KiraError> {
        let url = format!("{}/ligands", self.base_url);
        let ligands: Vec<LigandWire> = self
            .agent
            .get_json(&url, &[("inchikey", inchikey.to_string())])?
            .unwrap_or_default();
        let Some(ligand) = ligands.into_iter().next() else {
            return Err(KiraError::CompoundNotFound(inchikey.to_string()));
        };

        let url = format!("{}/ligands/{}/interactions", self.base_url, ligand.ligand_id);
        let wires: Vec<InteractionWire> = self.agent.get_json(&url, &[])?.unwrap_or_default();
        let mut interactions = Vec::with_capacity(wires.len());
        for wire in wires {
            interactions.push(G2pInteraction {
                target_id: wire.target_id.to_string(),
                target_name: self.target_name(wire.target_id)?,
                action: wire.action.unwrap_or_default(),
                affinity: wire.affinity,
                affinity_units: wire.affinity_parameter,
                target_species: wire.target_species,
                primary_target: wire.primary_target.unwrap_or(false),
                selectivity: wire.selectivity,
                endogenous: wire.endogenous.unwrap_or(false),
            });
        }
        Ok(G2pLigand {
            ligand_id: ligand.ligand_id,
            name: ligand.name,
            inchikey: ligand.inchi_key.unwrap_or_else(|| inchikey.to_string()),
            interactions,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LigandWire {
    ligand_id: u64,
    name: String,
    #[serde(default)]
    inchi_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InteractionWire {
    target_id: u64,
    action: Option<String>,
    affinity: Option<String>,
    affinity_parameter: Option<String>,
    target_species: Option<String>,
    primary_target: Option<bool>,
    selectivity: Option<String>,
    endogenous: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TargetWire {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_wire_is_camel_case() {
        let wire: InteractionWire = serde_json::from_str(
            r#"{"targetId": 290, "action": "Agonist", "affinity": "7.2",
                "affinityParameter": "pKi", "targetSpecies": "Human",
                "primaryTarget": true, "selectivity": "Selective", "endogenous": false}"#,
        )
        .unwrap();
        assert_eq!(wire.target_id, 290);
        assert_eq!(wire.affinity_parameter.as_deref(), Some("pKi"));
        assert_eq!(wire.primary_target, Some(true));
    }
}
