//! ChEMBL targets and the "SUPERSET OF" hierarchy between them.
//!
//! The hierarchy is a DAG, not a tree (the GABA-A receptor subunits are the
//! usual counterexample). Node data and edges come from a [`TargetSource`];
//! this module only walks them.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::domain::ChemblId;
use crate::error::KiraError;

/// ChEMBL's `target.target_type`, restricted to the kinds the hierarchy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    SingleProtein,
    ProteinFamily,
    ProteinComplex,
    ProteinComplexGroup,
    SelectivityGroup,
    Unknown,
}

impl TargetType {
    /// Parses ChEMBL's wire form (`"SINGLE PROTEIN"`) or the snake_case form.
    /// Other ChEMBL types (organisms, cell lines, ...) are `Unknown`.
    pub fn from_chembl(value: &str) -> Self {
        match value.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "single_protein" => TargetType::SingleProtein,
            "protein_family" => TargetType::ProteinFamily,
            "protein_complex" => TargetType::ProteinComplex,
            "protein_complex_group" => TargetType::ProteinComplexGroup,
            "selectivity_group" => TargetType::SelectivityGroup,
            _ => TargetType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::SingleProtein => "single_protein",
            TargetType::ProteinFamily => "protein_family",
            TargetType::ProteinComplex => "protein_complex",
            TargetType::ProteinComplexGroup => "protein_complex_group",
            TargetType::SelectivityGroup => "selectivity_group",
            TargetType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types `traverse_smart` may walk through.
pub const CANONICAL_TYPES: [TargetType; 5] = [
    TargetType::SingleProtein,
    TargetType::ProteinComplex,
    TargetType::ProteinComplexGroup,
    TargetType::ProteinFamily,
    TargetType::Unknown,
];

/// Supplies target records and their parent edges.
pub trait TargetSource: Send + Sync {
    fn target(&self, id: &ChemblId) -> Result<Target, KiraError>;

    /// Ids of the targets this one is a SUBSET OF, i.e. the far ends of the
    /// "SUPERSET OF" relations pointing at broader groupings.
    fn superset_of(&self, id: &ChemblId) -> Result<Vec<ChemblId>, KiraError>;
}

impl<T: TargetSource + ?Sized> TargetSource for Arc<T> {
    fn target(&self, id: &ChemblId) -> Result<Target, KiraError> {
        (**self).target(id)
    }

    fn superset_of(&self, id: &ChemblId) -> Result<Vec<ChemblId>, KiraError> {
        (**self).superset_of(id)
    }
}

/// Identity, equality and order are the ChEMBL id alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    chembl_id: ChemblId,
    name: Option<String>,
    target_type: TargetType,
}

impl Target {
    pub fn new(chembl_id: ChemblId, name: Option<String>, target_type: TargetType) -> Self {
        Self {
            chembl_id,
            name,
            target_type,
        }
    }

    pub fn chembl_id(&self) -> &ChemblId {
        &self.chembl_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target_type(&self) -> TargetType {
        self.target_type
    }

    /// Direct parents, sorted by id.
    pub fn parents(&self, source: &dyn TargetSource) -> Result<Vec<Target>, KiraError> {
        let mut parents = source
            .superset_of(&self.chembl_id)?
            .iter()
            .map(|id| source.target(id))
            .collect::<Result<Vec<_>, _>>()?;
        parents.sort();
        parents.dedup();
        Ok(parents)
    }

    /// Breadth-first walk upward, hopping only onto targets whose type is in
    /// `permitting`. Each reached ancestor appears once, at the depth it was
    /// first reached. `self` is always expanded and never included.
    pub fn ancestors(
        &self,
        permitting: &[TargetType],
        source: &dyn TargetSource,
    ) -> Result<BTreeSet<(usize, Target)>, KiraError> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::from([self.chembl_id.clone()]);
        let mut queue = VecDeque::from([(0usize, self.clone())]);
        while let Some((depth, node)) = queue.pop_front() {
            for parent in node.parents(source)? {
                if !visited.insert(parent.chembl_id.clone()) {
                    continue;
                }
                if !permitting.contains(&parent.target_type) {
                    continue;
                }
                found.insert((depth + 1, parent.clone()));
                queue.push_back((depth + 1, parent));
            }
        }
        Ok(found)
    }

    /// Collapses this target onto its most general acceptable ancestor.
    ///
    /// Farthest ancestors win; ties at the same depth go to the lowest id.
    /// Non-family ancestors are preferred over protein families, and
    /// `unknown` ancestors are never returned.
    pub fn traverse_smart(&self, source: &dyn TargetSource) -> Result<Target, KiraError> {
        let mut found: Vec<(usize, Target)> = self
            .ancestors(&CANONICAL_TYPES, source)?
            .into_iter()
            .filter(|(_, target)| target.target_type != TargetType::Unknown)
            .collect();
        found.sort_by(|(da, ta), (db, tb)| db.cmp(da).then_with(|| ta.cmp(tb)));

        if let Some((_, preferred)) = found
            .iter()
            .find(|(_, target)| target.target_type != TargetType::ProteinFamily)
        {
            return Ok(preferred.clone());
        }
        match found.into_iter().next() {
            Some((_, family)) => {
                tracing::warn!(
                    origin = %self,
                    target_type = %self.target_type,
                    chosen = %family,
                    "only protein-family ancestors found"
                );
                Ok(family)
            }
            None => Err(KiraError::NoCanonicalTarget(self.chembl_id.to_string())),
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.chembl_id == other.chembl_id
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chembl_id.hash(state);
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chembl_id.cmp(&other.chembl_id)
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.chembl_id),
            None => write!(f, "{}", self.chembl_id),
        }
    }
}

/// Memoizes target records and edges across calls.
pub struct CachedTargetSource<S> {
    inner: S,
    targets: Mutex<HashMap<ChemblId, Target>>,
    edges: Mutex<HashMap<ChemblId, Vec<ChemblId>>>,
}

impl<S: TargetSource> CachedTargetSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            targets: Mutex::new(HashMap::new()),
            edges: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TargetSource> TargetSource for CachedTargetSource<S> {
    fn target(&self, id: &ChemblId) -> Result<Target, KiraError> {
        if let Some(hit) = lock(&self.targets).get(id) {
            return Ok(hit.clone());
        }
        let target = self.inner.target(id)?;
        lock(&self.targets).insert(id.clone(), target.clone());
        Ok(target)
    }

    fn superset_of(&self, id: &ChemblId) -> Result<Vec<ChemblId>, KiraError> {
        if let Some(hit) = lock(&self.edges).get(id) {
            return Ok(hit.clone());
        }
        let edges = self.inner.superset_of(id)?;
        lock(&self.edges).insert(id.clone(), edges.clone());
        Ok(edges)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_type_wire_forms() {
        assert_eq!(
            TargetType::from_chembl("SINGLE PROTEIN"),
            TargetType::SingleProtein
        );
        assert_eq!(
            TargetType::from_chembl("protein_complex_group"),
            TargetType::ProteinComplexGroup
        );
        assert_eq!(TargetType::from_chembl("ORGANISM"), TargetType::Unknown);
    }

    #[test]
    fn targets_compare_by_id_only() {
        let a = Target::new(
            "CHEMBL1".parse().unwrap(),
            Some("a".to_string()),
            TargetType::SingleProtein,
        );
        let b = Target::new("CHEMBL1".parse().unwrap(), None, TargetType::Unknown);
        assert_eq!(a, b);
    }
}
