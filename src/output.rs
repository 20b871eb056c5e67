use std::io::{self, Write};

use serde::Serialize;

use crate::runner::BatchReport;
use crate::table::Table;
use crate::target::Target;
use crate::taxonomy::{Taxon, Taxonomy};

#[derive(Debug, Clone, Serialize)]
pub struct TaxonView {
    pub id: u64,
    pub name: String,
    pub parent: Option<u64>,
}

impl TaxonView {
    /// `parent` is only set when the parent is part of `taxonomy`.
    pub fn new(taxon: &Taxon, taxonomy: &Taxonomy) -> Self {
        Self {
            id: taxon.id().get(),
            name: taxon.name().to_string(),
            parent: taxonomy.parent(taxon).map(|parent| parent.id().get()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyResult {
    pub root: String,
    pub count: usize,
    pub taxa: Vec<TaxonView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AncestorView {
    pub depth: usize,
    pub target: Target,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub target: Target,
    pub ancestors: Vec<AncestorView>,
    pub canonical: Option<Target>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(result: &BatchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_explain(table: &Table) -> io::Result<()> {
        Self::print_json(table)
    }

    pub fn print_taxonomy(result: &TaxonomyResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_target(result: &TargetResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::search::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::search::ProgressEvent) {}
}
