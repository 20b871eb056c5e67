use camino::Utf8PathBuf;

use kira_compound_annotator::domain::TaxonId;
use kira_compound_annotator::store::Store;

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

#[test]
fn cache_layout() {
    let (_temp, root) = temp_root();
    let store = Store::new_with_root(root.join("cache"));
    assert!(
        store
            .taxonomy_path(TaxonId(7742))
            .ends_with("cache/taxonomy/7742.tsv.gz")
    );

    store.ensure_cache_root().unwrap();
    assert!(store.cache_root().as_std_path().is_dir());
}

#[test]
fn atomic_write_replaces_existing_content() {
    let (_temp, root) = temp_root();
    let path = root.join("out").join("hits.tsv");

    Store::write_bytes_atomic(&path, b"old\n").unwrap();
    Store::write_bytes_atomic(&path, b"new\n").unwrap();
    assert_eq!(std::fs::read_to_string(path.as_std_path()).unwrap(), "new\n");

    let leftovers: Vec<_> = std::fs::read_dir(root.join("out").as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[test]
fn marker_tracks_completion() {
    let (_temp, root) = temp_root();
    let output = root.join("activity.tsv");
    assert!(!Store::is_marked(&output));

    Store::write_bytes_atomic(&output, b"record_id\n").unwrap();
    Store::write_marker(&output).unwrap();
    assert!(Store::is_marked(&output));
    assert_eq!(Store::marker_path(&output), root.join("activity.tsv.done"));
}
