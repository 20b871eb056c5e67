use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChemblId(String);

impl ChemblId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric part of the id, `CHEMBL203` -> 203.
    pub fn number(&self) -> u64 {
        self.0
            .trim_start_matches("CHEMBL")
            .parse()
            .unwrap_or_default()
    }
}

/// Numeric order first, so `CHEMBL9` sorts before `CHEMBL10`.
impl Ord for ChemblId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number()
            .cmp(&other.number())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ChemblId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChemblId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChemblId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        let digits = normalized.strip_prefix("CHEMBL").unwrap_or("");
        let is_valid = !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(KiraError::InvalidChemblId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TaxonId(pub u64);

impl TaxonId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxonId {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| KiraError::InvalidTaxonId(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Inchi,
    Inchikey,
    Chembl,
    Smiles,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Inchi => write!(f, "inchi"),
            QueryKind::Inchikey => write!(f, "inchikey"),
            QueryKind::Chembl => write!(f, "chembl"),
            QueryKind::Smiles => write!(f, "smiles"),
        }
    }
}

/// A compound lookup string, classified by its syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundQuery {
    value: String,
    kind: QueryKind,
}

impl CompoundQuery {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }
}

impl fmt::Display for CompoundQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for CompoundQuery {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(KiraError::InvalidCompound(value.to_string()));
        }
        let kind = if trimmed.starts_with("InChI=") {
            QueryKind::Inchi
        } else if inchikey_regex().is_match(trimmed) {
            QueryKind::Inchikey
        } else if chembl_regex().is_match(trimmed) {
            QueryKind::Chembl
        } else {
            QueryKind::Smiles
        };
        Ok(Self {
            value: trimmed.to_string(),
            kind,
        })
    }
}

fn inchikey_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{14}-[A-Z]{10}-[A-Z]$").expect("valid inchikey regex"))
}

fn chembl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^CHEMBL[0-9]+$").expect("valid chembl regex"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_chembl_id_valid() {
        let id: ChemblId = "chembl203".parse().unwrap();
        assert_eq!(id.as_str(), "CHEMBL203");
        assert_eq!(id.number(), 203);
    }

    #[test]
    fn chembl_ids_order_numerically() {
        let nine: ChemblId = "CHEMBL9".parse().unwrap();
        let ten: ChemblId = "CHEMBL10".parse().unwrap();
        assert!(nine < ten);
    }

    #[test]
    fn parse_chembl_id_invalid() {
        let err = "CHEMBL".parse::<ChemblId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidChemblId(_));
    }

    #[test]
    fn classify_queries() {
        let key: CompoundQuery = "RZVAJINKPMORJF-UHFFFAOYSA-N".parse().unwrap();
        assert_eq!(key.kind(), QueryKind::Inchikey);
        let chembl: CompoundQuery = "CHEMBL25".parse().unwrap();
        assert_eq!(chembl.kind(), QueryKind::Chembl);
        let inchi: CompoundQuery = "InChI=1S/CH4/h1H4".parse().unwrap();
        assert_eq!(inchi.kind(), QueryKind::Inchi);
        let smiles: CompoundQuery = "CC(=O)Oc1ccccc1C(=O)O".parse().unwrap();
        assert_eq!(smiles.kind(), QueryKind::Smiles);
    }
}
