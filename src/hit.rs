use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::KiraError;
use crate::table::Table;

/// Columns every hit table starts with, in order.
pub const BASE_COLUMNS: [&str; 13] = [
    "record_id",
    "compound_id",
    "origin_inchikey",
    "matched_inchikey",
    "compound_name",
    "search_key",
    "search_class",
    "data_source",
    "predicate",
    "object_id",
    "object_name",
    "run_date",
    "cache_date",
];

/// The search-specific fields a search adds after [`BASE_COLUMNS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitSchema {
    extra: &'static [&'static str],
}

impl HitSchema {
    pub const fn new(extra: &'static [&'static str]) -> Self {
        Self { extra }
    }

    pub fn extra(&self) -> &'static [&'static str] {
        self.extra
    }

    pub fn columns(&self) -> Vec<String> {
        BASE_COLUMNS
            .iter()
            .chain(self.extra.iter())
            .map(|c| c.to_string())
            .collect()
    }

    pub fn empty_table(&self) -> Table {
        Table::new(self.columns())
    }

    pub fn to_table(&self, hits: &[Hit]) -> Result<Table, KiraError> {
        let mut table = self.empty_table();
        for hit in hits {
            table.push_row(hit.to_row(self))?;
        }
        Ok(table)
    }
}

/// The provider-specific half of a hit, filled in by `Search::find`.
#[derive(Debug, Clone, Default)]
pub struct HitDraft {
    pub record_id: Option<String>,
    pub compound_id: String,
    pub origin_inchikey: String,
    pub matched_inchikey: String,
    pub compound_name: String,
    pub predicate: String,
    pub object_id: String,
    pub object_name: String,
    pub cache_date: Option<String>,
    pub extra: Vec<(&'static str, String)>,
}

/// Stamped onto every hit by the search that created it.
#[derive(Debug, Clone)]
pub struct HitOrigin {
    pub search_key: String,
    pub search_class: String,
    pub data_source: String,
    pub run_date: String,
}

/// One annotation record. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    record_id: Option<String>,
    compound_id: String,
    origin_inchikey: String,
    matched_inchikey: String,
    compound_name: String,
    search_key: String,
    search_class: String,
    data_source: String,
    predicate: String,
    object_id: String,
    object_name: String,
    run_date: String,
    cache_date: Option<String>,
    extra: BTreeMap<String, String>,
}

impl Hit {
    /// Fails unless the draft's extra fields are exactly the schema's.
    pub fn create(
        draft: HitDraft,
        origin: &HitOrigin,
        schema: &HitSchema,
    ) -> Result<Self, KiraError> {
        let extra: BTreeMap<String, String> = draft
            .extra
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        let declared = schema.extra().len() == extra.len()
            && schema.extra().iter().all(|name| extra.contains_key(*name));
        if !declared {
            return Err(KiraError::SchemaMismatch {
                path: origin.search_key.clone(),
                message: format!(
                    "hit fields [{}] do not match schema [{}]",
                    extra.keys().cloned().collect::<Vec<_>>().join(", "),
                    schema.extra().join(", ")
                ),
            });
        }
        Ok(Self {
            record_id: draft.record_id,
            compound_id: draft.compound_id,
            origin_inchikey: draft.origin_inchikey,
            matched_inchikey: draft.matched_inchikey,
            compound_name: draft.compound_name,
            search_key: origin.search_key.clone(),
            search_class: origin.search_class.clone(),
            data_source: origin.data_source.clone(),
            predicate: draft.predicate,
            object_id: draft.object_id,
            object_name: draft.object_name,
            run_date: origin.run_date.clone(),
            cache_date: draft.cache_date,
            extra,
        })
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn compound_id(&self) -> &str {
        &self.compound_id
    }

    pub fn origin_inchikey(&self) -> &str {
        &self.origin_inchikey
    }

    pub fn matched_inchikey(&self) -> &str {
        &self.matched_inchikey
    }

    pub fn compound_name(&self) -> &str {
        &self.compound_name
    }

    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    pub fn search_class(&self) -> &str {
        &self.search_class
    }

    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn run_date(&self) -> &str {
        &self.run_date
    }

    pub fn cache_date(&self) -> Option<&str> {
        self.cache_date.as_deref()
    }

    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extra.get(name).map(String::as_str)
    }

    pub fn to_row(&self, schema: &HitSchema) -> Vec<String> {
        let mut row = vec![
            self.record_id.clone().unwrap_or_default(),
            self.compound_id.clone(),
            self.origin_inchikey.clone(),
            self.matched_inchikey.clone(),
            self.compound_name.clone(),
            self.search_key.clone(),
            self.search_class.clone(),
            self.data_source.clone(),
            self.predicate.clone(),
            self.object_id.clone(),
            self.object_name.clone(),
            self.run_date.clone(),
            self.cache_date.clone().unwrap_or_default(),
        ];
        row.extend(
            schema
                .extra()
                .iter()
                .map(|name| self.extra.get(*name).cloned().unwrap_or_default()),
        );
        row
    }
}
