//! Organism taxonomy: an immutable forest of taxa indexed by id and by name.
//!
//! Taxa live in an arena keyed by [`TaxonId`]; parent and child links are ids
//! into that arena. A taxon whose declared parent is not in the arena (it was
//! pruned, or never declared) is a root.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use camino::Utf8Path;

use crate::domain::TaxonId;
use crate::error::KiraError;
use crate::table::Table;

const ID_COLUMNS: [&str; 2] = ["taxon", "taxon id"];
const NAME_COLUMNS: [&str; 1] = ["scientific name"];
const PARENT_COLUMNS: [&str; 2] = ["parent", "parent id"];

/// One `(id, name, parent)` row of a taxonomy source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonRow {
    pub id: TaxonId,
    pub name: String,
    pub parent: Option<TaxonId>,
}

impl TaxonRow {
    pub fn new(id: u64, name: &str, parent: Option<u64>) -> Self {
        Self {
            id: TaxonId(id),
            name: name.to_string(),
            parent: parent.map(TaxonId),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxon {
    id: TaxonId,
    name: String,
    parent: Option<TaxonId>,
    children: BTreeSet<TaxonId>,
}

impl Taxon {
    fn placeholder(id: TaxonId) -> Self {
        Self {
            id,
            name: String::new(),
            parent: None,
            children: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> TaxonId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parent id. It may not resolve in the owning taxonomy.
    pub fn parent_id(&self) -> Option<TaxonId> {
        self.parent
    }

    pub fn child_ids(&self) -> impl Iterator<Item = TaxonId> + '_ {
        self.children.iter().copied()
    }
}

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Lookup key: a numeric id or a scientific name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonKey {
    Id(TaxonId),
    Name(String),
}

impl TaxonKey {
    /// All-digit strings are ids; anything else is a name.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.parse::<u64>() {
            Ok(id) => TaxonKey::Id(TaxonId(id)),
            Err(_) => TaxonKey::Name(trimmed.to_string()),
        }
    }
}

impl fmt::Display for TaxonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxonKey::Id(id) => write!(f, "{id}"),
            TaxonKey::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<TaxonId> for TaxonKey {
    fn from(value: TaxonId) -> Self {
        TaxonKey::Id(value)
    }
}

impl From<u64> for TaxonKey {
    fn from(value: u64) -> Self {
        TaxonKey::Id(TaxonId(value))
    }
}

impl From<&str> for TaxonKey {
    fn from(value: &str) -> Self {
        TaxonKey::parse(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    by_id: HashMap<TaxonId, Taxon>,
    by_name: HashMap<String, TaxonId>,
}

impl Taxonomy {
    /// Builds the tree from rows in any order.
    ///
    /// Parents that are referenced but never declared with a name are pruned,
    /// together with any declared taxon whose name is blank.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = TaxonRow>,
    {
        let mut by_id: HashMap<TaxonId, Taxon> = HashMap::new();
        for row in rows {
            let parent = row.parent.filter(|parent| *parent != row.id);
            let child = by_id
                .entry(row.id)
                .or_insert_with(|| Taxon::placeholder(row.id));
            child.name = row.name;
            let previous = std::mem::replace(&mut child.parent, parent);

            if let Some(old) = previous.filter(|old| Some(*old) != parent) {
                if let Some(old_parent) = by_id.get_mut(&old) {
                    old_parent.children.remove(&row.id);
                }
            }
            if let Some(parent) = parent {
                by_id
                    .entry(parent)
                    .or_insert_with(|| Taxon::placeholder(parent))
                    .children
                    .insert(row.id);
            }
        }

        let bad: BTreeSet<TaxonId> = by_id
            .values()
            .filter(|taxon| taxon.name.trim().is_empty())
            .map(|taxon| taxon.id)
            .collect();
        if !bad.is_empty() {
            tracing::warn!(
                count = bad.len(),
                "removing taxa with missing or empty names"
            );
            by_id.retain(|id, _| !bad.contains(id));
            for taxon in by_id.values_mut() {
                taxon.children.retain(|child| !bad.contains(child));
            }
        }

        Self::index(by_id)
    }

    /// Reads a header-driven TSV with `taxon`, `scientific name` and `parent`
    /// columns (case-insensitive).
    pub fn from_table(table: &Table, label: &str) -> Result<Self, KiraError> {
        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| table.column_index(name))
                .ok_or_else(|| KiraError::TableParse {
                    path: label.to_string(),
                    line: 1,
                    message: format!("missing column {}", names[0]),
                })
        };
        let id_col = find(&ID_COLUMNS[..])?;
        let name_col = find(&NAME_COLUMNS[..])?;
        let parent_col = find(&PARENT_COLUMNS[..])?;

        let mut rows = Vec::with_capacity(table.len());
        for (index, cells) in table.rows().iter().enumerate() {
            let line = table.line(index);
            let id_cell = cells[id_col].trim();
            if id_cell.is_empty() {
                continue;
            }
            let id = parse_id(id_cell, label, line)?;
            let parent_cell = cells[parent_col].trim();
            let parent = if parent_cell.is_empty() {
                None
            } else {
                Some(parse_id(parent_cell, label, line)?)
            };
            rows.push(TaxonRow {
                id,
                name: cells[name_col].clone(),
                parent,
            });
        }
        Ok(Self::from_rows(rows))
    }

    pub fn from_path(path: &Utf8Path) -> Result<Self, KiraError> {
        let table = Table::read_path(path)?;
        let taxonomy = Self::from_table(&table, path.as_str())?;
        tracing::info!(path = %path, taxa = taxonomy.len(), "loaded taxonomy");
        Ok(taxonomy)
    }

    fn index(by_id: HashMap<TaxonId, Taxon>) -> Self {
        let mut ids: Vec<TaxonId> = by_id.keys().copied().collect();
        ids.sort();
        let mut by_name = HashMap::with_capacity(ids.len());
        let mut collisions = 0usize;
        for id in ids {
            let key = normalize_name(&by_id[&id].name);
            if by_name.contains_key(&key) {
                collisions += 1;
                continue;
            }
            by_name.insert(key, id);
        }
        if collisions > 0 {
            tracing::warn!(
                collisions,
                "duplicate taxon names; the lowest id keeps each name"
            );
        }
        Self { by_id, by_name }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get<K: Into<TaxonKey>>(&self, key: K) -> Option<&Taxon> {
        match key.into() {
            TaxonKey::Id(id) => self.by_id.get(&id),
            TaxonKey::Name(name) => self
                .by_name
                .get(&normalize_name(&name))
                .and_then(|id| self.by_id.get(id)),
        }
    }

    pub fn require<K: Into<TaxonKey>>(&self, key: K) -> Result<&Taxon, KiraError> {
        let key = key.into();
        let label = key.to_string();
        self.get(key).ok_or(KiraError::TaxonNotFound(label))
    }

    pub fn contains<K: Into<TaxonKey>>(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// All taxa, ascending by id.
    pub fn taxa(&self) -> Vec<&Taxon> {
        let mut taxa: Vec<&Taxon> = self.by_id.values().collect();
        taxa.sort_by_key(|taxon| taxon.id);
        taxa
    }

    pub fn roots(&self) -> Vec<&Taxon> {
        self.taxa()
            .into_iter()
            .filter(|taxon| self.parent(taxon).is_none())
            .collect()
    }

    pub fn leaves(&self) -> Vec<&Taxon> {
        self.taxa()
            .into_iter()
            .filter(|taxon| taxon.children.is_empty())
            .collect()
    }

    pub fn parent(&self, taxon: &Taxon) -> Option<&Taxon> {
        taxon.parent.and_then(|id| self.by_id.get(&id))
    }

    pub fn children(&self, taxon: &Taxon) -> Vec<&Taxon> {
        taxon
            .children
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: TaxonId) -> Vec<&Taxon> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.by_id.get(&id).and_then(|taxon| self.parent(taxon));
        while let Some(taxon) = current {
            if !seen.insert(taxon.id) {
                break;
            }
            found.push(taxon);
            current = self.parent(taxon);
        }
        found
    }

    /// Descendants of `id` in breadth-first order, excluding `id` itself.
    pub fn descendants(&self, id: TaxonId) -> Vec<&Taxon> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            let Some(taxon) = self.by_id.get(&next) else {
                continue;
            };
            for child in &taxon.children {
                if seen.insert(*child) {
                    if let Some(child_taxon) = self.by_id.get(child) {
                        found.push(child_taxon);
                    }
                    queue.push_back(*child);
                }
            }
        }
        found
    }

    /// The subtree strictly below `key`.
    pub fn under<K: Into<TaxonKey>>(&self, key: K) -> Result<Taxonomy, KiraError> {
        self.under_with(key, false)
    }

    pub fn under_with<K: Into<TaxonKey>>(
        &self,
        key: K,
        include_root: bool,
    ) -> Result<Taxonomy, KiraError> {
        self.under_any([key.into()], include_root)
    }

    /// Union of the subtrees below each key.
    pub fn under_any<I>(&self, keys: I, include_roots: bool) -> Result<Taxonomy, KiraError>
    where
        I: IntoIterator<Item = TaxonKey>,
    {
        let mut ids = BTreeSet::new();
        for key in keys {
            let root = self.require(key)?;
            if include_roots {
                ids.insert(root.id);
            }
            ids.extend(self.descendants(root.id).iter().map(|taxon| taxon.id));
        }
        Ok(self.subset(&ids))
    }

    fn subset(&self, ids: &BTreeSet<TaxonId>) -> Taxonomy {
        let by_id = ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .map(|taxon| {
                let mut copy = taxon.clone();
                copy.children.retain(|child| ids.contains(child));
                (copy.id, copy)
            })
            .collect();
        Self::index(by_id)
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Taxonomy({} taxa)", self.by_id.len())
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn parse_id(value: &str, label: &str, line: usize) -> Result<TaxonId, KiraError> {
    value.parse().map_err(|_| KiraError::TableParse {
        path: label.to_string(),
        line,
        message: format!("invalid taxon id {value:?}"),
    })
}
