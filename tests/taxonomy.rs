use std::io::Write;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_compound_annotator::domain::TaxonId;
use kira_compound_annotator::error::KiraError;
use kira_compound_annotator::table::Table;
use kira_compound_annotator::taxonomy::{TaxonKey, TaxonRow, Taxonomy};

fn vertebrate_rows() -> Vec<TaxonRow> {
    vec![
        TaxonRow::new(7742, "Vertebrata", Some(89593)),
        TaxonRow::new(40674, "Mammalia", Some(7742)),
        TaxonRow::new(9606, "Homo sapiens", Some(9605)),
        TaxonRow::new(9605, "Homo", Some(40674)),
        TaxonRow::new(10090, "Mus musculus", Some(40674)),
        TaxonRow::new(7955, "Danio rerio", Some(7742)),
    ]
}

#[test]
fn build_is_independent_of_row_order() {
    let forward = Taxonomy::from_rows(vertebrate_rows());
    let mut rows = vertebrate_rows();
    rows.reverse();
    let backward = Taxonomy::from_rows(rows);
    let mut rows = vertebrate_rows();
    rows.rotate_left(2);
    let rotated = Taxonomy::from_rows(rows);

    assert_eq!(forward, backward);
    assert_eq!(forward, rotated);
    assert_eq!(forward.len(), 6);
}

#[test]
fn undeclared_parent_is_pruned_and_child_becomes_root() {
    let tax = Taxonomy::from_rows(vec![
        TaxonRow::new(1, "cellular organisms", Some(0)),
        TaxonRow::new(2, "Bacteria", Some(1)),
    ]);
    assert!(tax.get(0u64).is_none());
    assert_eq!(tax.len(), 2);
    let roots: Vec<u64> = tax.roots().iter().map(|t| t.id().get()).collect();
    assert_eq!(roots, vec![1]);
    let root = tax.require(1u64).unwrap();
    assert!(tax.parent(root).is_none());
    assert_eq!(tax.children(root)[0].name(), "Bacteria");
}

#[test]
fn blank_names_are_dropped() {
    let tax = Taxonomy::from_rows(vec![
        TaxonRow::new(1, "root", None),
        TaxonRow::new(2, "   ", Some(1)),
        TaxonRow::new(3, "leaf", Some(2)),
    ]);
    assert!(!tax.contains(2u64));
    assert!(tax.contains(3u64));
    let leaf = tax.require(3u64).unwrap();
    assert!(tax.parent(leaf).is_none());
    assert!(tax.children(tax.require(1u64).unwrap()).is_empty());
}

#[test]
fn name_collisions_keep_lowest_id() {
    let tax = Taxonomy::from_rows(vec![
        TaxonRow::new(20, "Duplicate", None),
        TaxonRow::new(10, "duplicate", None),
    ]);
    assert_eq!(tax.get("DUPLICATE").unwrap().id(), TaxonId(10));
    assert_eq!(tax.len(), 2);
}

#[test]
fn under_excludes_the_node_unless_asked() {
    let tax = Taxonomy::from_rows(vertebrate_rows());

    let mammals = tax.under("Mammalia").unwrap();
    let ids: Vec<u64> = mammals.taxa().iter().map(|t| t.id().get()).collect();
    assert_eq!(ids, vec![9605, 9606, 10090]);
    assert!(!mammals.contains(40674u64));

    let with_root = tax.under_with(40674u64, true).unwrap();
    assert!(with_root.contains("mammalia"));
    assert_eq!(with_root.roots().len(), 1);
    assert_eq!(with_root.roots()[0].id(), TaxonId(40674));

    // the source taxonomy is untouched
    assert_eq!(tax.len(), 6);
}

#[test]
fn leaves_have_no_children() {
    let tax = Taxonomy::from_rows(vertebrate_rows());
    let ids: Vec<u64> = tax.leaves().iter().map(|t| t.id().get()).collect();
    assert_eq!(ids, vec![7955, 9606, 10090]);
}

#[test]
fn under_any_unions_subtrees() {
    let tax = Taxonomy::from_rows(vertebrate_rows());
    let union = tax
        .under_any([TaxonKey::parse("9605"), TaxonKey::parse("Danio rerio")], true)
        .unwrap();
    let ids: Vec<u64> = union.taxa().iter().map(|t| t.id().get()).collect();
    assert_eq!(ids, vec![7955, 9605, 9606]);
}

#[test]
fn unknown_subtree_root_is_an_error() {
    let tax = Taxonomy::from_rows(vertebrate_rows());
    let err = tax.under("Plantae").unwrap_err();
    assert_matches!(err, KiraError::TaxonNotFound(name) if name == "Plantae");
}

#[test]
fn reads_gzipped_uniprot_stream() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let path = root.join("7742.tsv.gz");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(b"Taxon Id\tScientific name\tParent\n7742\tVertebrata\t89593\n40674\tMammalia\t7742\n")
        .unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();

    let tax = Taxonomy::from_path(&path).unwrap();
    assert_eq!(tax.len(), 2);
    assert_eq!(tax.roots()[0].name(), "Vertebrata");
}

#[test]
fn malformed_ids_report_the_line() {
    let table = Table::from_reader(
        "taxon\tscientific name\tparent\n1\troot\t\nx2\tbad\t1\n".as_bytes(),
        "taxa.tsv",
    )
    .unwrap();
    let err = Taxonomy::from_table(&table, "taxa.tsv").unwrap_err();
    assert_matches!(err, KiraError::TableParse { line: 3, .. });
}

#[test]
fn line_numbers_count_skipped_blank_lines() {
    let table = Table::from_reader(
        "taxon\tscientific name\tparent\n1\troot\t\n\n\n7x\tbad\t1\n".as_bytes(),
        "taxa.tsv",
    )
    .unwrap();
    let err = Taxonomy::from_table(&table, "taxa.tsv").unwrap_err();
    assert_matches!(err, KiraError::TableParse { line: 5, .. });
}
