use assert_matches::assert_matches;

use kira_compound_annotator::domain::{ChemblId, CompoundQuery, QueryKind, TaxonId};
use kira_compound_annotator::error::KiraError;

#[test]
fn parse_chembl_id_normalizes_case() {
    let id: ChemblId = " chembl1824 ".parse().unwrap();
    assert_eq!(id.as_str(), "CHEMBL1824");
    assert_eq!(id.number(), 1824);
}

#[test]
fn parse_chembl_id_invalid() {
    for value in ["", "CHEMBL", "CHEMBLX1", "203", "CHEMBL-5"] {
        let err = value.parse::<ChemblId>().unwrap_err();
        assert_matches!(err, KiraError::InvalidChemblId(_));
    }
}

#[test]
fn chembl_ids_sort_by_number() {
    let mut ids: Vec<ChemblId> = ["CHEMBL100", "CHEMBL9", "CHEMBL25"]
        .iter()
        .map(|value| value.parse().unwrap())
        .collect();
    ids.sort();
    let sorted: Vec<&str> = ids.iter().map(ChemblId::as_str).collect();
    assert_eq!(sorted, vec!["CHEMBL9", "CHEMBL25", "CHEMBL100"]);
}

#[test]
fn parse_taxon_id() {
    let id: TaxonId = "9606".parse().unwrap();
    assert_eq!(id, TaxonId(9606));
    assert_eq!(id.to_string(), "9606");
    assert_matches!("Homo".parse::<TaxonId>(), Err(KiraError::InvalidTaxonId(_)));
}

#[test]
fn compound_queries_are_classified() {
    let cases = [
        ("BSYNRYMUTXBXSQ-UHFFFAOYSA-N", QueryKind::Inchikey),
        ("CHEMBL25", QueryKind::Chembl),
        ("InChI=1S/CH4/h1H4", QueryKind::Inchi),
        ("CC(=O)Oc1ccccc1C(=O)O", QueryKind::Smiles),
    ];
    for (value, kind) in cases {
        let query: CompoundQuery = value.parse().unwrap();
        assert_eq!(query.kind(), kind, "{value}");
        assert_eq!(query.as_str(), value);
    }
}

#[test]
fn blank_or_spaced_compounds_are_rejected() {
    assert_matches!("  ".parse::<CompoundQuery>(), Err(KiraError::InvalidCompound(_)));
    assert_matches!(
        "CC O".parse::<CompoundQuery>(),
        Err(KiraError::InvalidCompound(_))
    );
}

#[test]
fn compound_queries_deduplicate_in_sets() {
    let queries: std::collections::HashSet<CompoundQuery> = ["CHEMBL25", " CHEMBL25 ", "CHEMBL1200"]
        .iter()
        .map(|value| value.parse().unwrap())
        .collect();
    assert_eq!(queries.len(), 2);
}
