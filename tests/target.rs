use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;

use kira_compound_annotator::domain::ChemblId;
use kira_compound_annotator::error::KiraError;
use kira_compound_annotator::target::{
    CANONICAL_TYPES, CachedTargetSource, Target, TargetSource, TargetType,
};

fn id(value: &str) -> ChemblId {
    value.parse().unwrap()
}

#[derive(Default)]
struct MockGraph {
    targets: HashMap<ChemblId, Target>,
    parents: HashMap<ChemblId, Vec<ChemblId>>,
    calls: Mutex<usize>,
}

impl MockGraph {
    fn node(mut self, chembl: &str, target_type: TargetType) -> Self {
        let target = Target::new(id(chembl), Some(format!("name of {chembl}")), target_type);
        self.targets.insert(id(chembl), target);
        self
    }

    fn edge(mut self, child: &str, parent: &str) -> Self {
        self.parents.entry(id(child)).or_default().push(id(parent));
        self
    }

    fn get(&self, chembl: &str) -> Target {
        self.targets[&id(chembl)].clone()
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl TargetSource for MockGraph {
    fn target(&self, id: &ChemblId) -> Result<Target, KiraError> {
        *self.calls.lock().unwrap() += 1;
        self.targets
            .get(id)
            .cloned()
            .ok_or_else(|| KiraError::TargetNotFound(id.to_string()))
    }

    fn superset_of(&self, id: &ChemblId) -> Result<Vec<ChemblId>, KiraError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.parents.get(id).cloned().unwrap_or_default())
    }
}

#[test]
fn family_collapses_onto_single_protein_parent() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::ProteinFamily)
        .node("CHEMBL2", TargetType::SingleProtein)
        .edge("CHEMBL1", "CHEMBL2");
    let t1 = graph.get("CHEMBL1");

    let ancestors = t1.ancestors(&CANONICAL_TYPES, &graph).unwrap();
    let found: Vec<(usize, String)> = ancestors
        .iter()
        .map(|(depth, target)| (*depth, target.chembl_id().to_string()))
        .collect();
    assert_eq!(found, vec![(1, "CHEMBL2".to_string())]);
    assert_eq!(t1.traverse_smart(&graph).unwrap().chembl_id(), &id("CHEMBL2"));
}

#[test]
fn parentless_target_has_no_canonical_form() {
    let graph = MockGraph::default().node("CHEMBL3", TargetType::SingleProtein);
    let t3 = graph.get("CHEMBL3");
    assert!(t3.ancestors(&CANONICAL_TYPES, &graph).unwrap().is_empty());
    let err = t3.traverse_smart(&graph).unwrap_err();
    assert_matches!(err, KiraError::NoCanonicalTarget(chembl) if chembl == "CHEMBL3");
}

#[test]
fn farthest_ancestor_wins_and_ties_go_to_lowest_id() {
    // 10 -> {30, 20}; 20 -> 40; 30 -> 50. Depth 2 holds 40 and 50.
    let graph = MockGraph::default()
        .node("CHEMBL10", TargetType::SingleProtein)
        .node("CHEMBL20", TargetType::ProteinComplex)
        .node("CHEMBL30", TargetType::ProteinComplex)
        .node("CHEMBL40", TargetType::ProteinComplexGroup)
        .node("CHEMBL50", TargetType::ProteinComplexGroup)
        .edge("CHEMBL10", "CHEMBL30")
        .edge("CHEMBL10", "CHEMBL20")
        .edge("CHEMBL20", "CHEMBL50")
        .edge("CHEMBL30", "CHEMBL40");
    let origin = graph.get("CHEMBL10");
    let first = origin.traverse_smart(&graph).unwrap();
    let second = origin.traverse_smart(&graph).unwrap();
    assert_eq!(first.chembl_id(), &id("CHEMBL40"));
    assert_eq!(first, second);
}

#[test]
fn families_lose_to_other_types_even_when_farther() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL2", TargetType::ProteinComplex)
        .node("CHEMBL3", TargetType::ProteinFamily)
        .edge("CHEMBL1", "CHEMBL2")
        .edge("CHEMBL2", "CHEMBL3");
    let chosen = graph.get("CHEMBL1").traverse_smart(&graph).unwrap();
    assert_eq!(chosen.chembl_id(), &id("CHEMBL2"));
}

#[test]
fn family_is_the_fallback() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL2", TargetType::ProteinFamily)
        .node("CHEMBL3", TargetType::ProteinFamily)
        .edge("CHEMBL1", "CHEMBL2")
        .edge("CHEMBL2", "CHEMBL3");
    let chosen = graph.get("CHEMBL1").traverse_smart(&graph).unwrap();
    assert_eq!(chosen.chembl_id(), &id("CHEMBL3"));
}

#[test]
fn walk_stops_at_types_outside_the_filter() {
    // the selectivity group is neither recorded nor expanded
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL2", TargetType::SelectivityGroup)
        .node("CHEMBL3", TargetType::ProteinComplexGroup)
        .edge("CHEMBL1", "CHEMBL2")
        .edge("CHEMBL2", "CHEMBL3");
    let origin = graph.get("CHEMBL1");
    assert!(origin.ancestors(&CANONICAL_TYPES, &graph).unwrap().is_empty());
    assert_matches!(
        origin.traverse_smart(&graph),
        Err(KiraError::NoCanonicalTarget(_))
    );
}

#[test]
fn unknown_ancestors_are_walked_but_never_returned() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL2", TargetType::Unknown)
        .node("CHEMBL3", TargetType::ProteinComplex)
        .edge("CHEMBL1", "CHEMBL2")
        .edge("CHEMBL2", "CHEMBL3");
    let chosen = graph.get("CHEMBL1").traverse_smart(&graph).unwrap();
    assert_eq!(chosen.chembl_id(), &id("CHEMBL3"));
}

#[test]
fn diamonds_and_cycles_terminate() {
    // 1 -> {2, 3} -> 4 -> 1
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL2", TargetType::ProteinComplex)
        .node("CHEMBL3", TargetType::ProteinComplex)
        .node("CHEMBL4", TargetType::ProteinComplexGroup)
        .edge("CHEMBL1", "CHEMBL2")
        .edge("CHEMBL1", "CHEMBL3")
        .edge("CHEMBL2", "CHEMBL4")
        .edge("CHEMBL3", "CHEMBL4")
        .edge("CHEMBL4", "CHEMBL1");
    let ancestors = graph
        .get("CHEMBL1")
        .ancestors(&CANONICAL_TYPES, &graph)
        .unwrap();
    let depths: Vec<(usize, String)> = ancestors
        .iter()
        .map(|(depth, target)| (*depth, target.chembl_id().to_string()))
        .collect();
    assert_eq!(
        depths,
        vec![
            (1, "CHEMBL2".to_string()),
            (1, "CHEMBL3".to_string()),
            (2, "CHEMBL4".to_string()),
        ]
    );
}

#[test]
fn cached_source_asks_the_provider_once() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::ProteinFamily)
        .node("CHEMBL2", TargetType::SingleProtein)
        .edge("CHEMBL1", "CHEMBL2");
    let cached = CachedTargetSource::new(graph);
    let t1 = cached.target(&id("CHEMBL1")).unwrap();

    t1.traverse_smart(&cached).unwrap();
    let after_first = cached.inner().calls();
    t1.traverse_smart(&cached).unwrap();
    assert_eq!(cached.inner().calls(), after_first);
}

#[test]
fn parents_are_sorted_numerically() {
    let graph = MockGraph::default()
        .node("CHEMBL1", TargetType::SingleProtein)
        .node("CHEMBL10", TargetType::ProteinComplex)
        .node("CHEMBL9", TargetType::ProteinComplex)
        .edge("CHEMBL1", "CHEMBL10")
        .edge("CHEMBL1", "CHEMBL9");
    let parents: Vec<String> = graph
        .get("CHEMBL1")
        .parents(&graph)
        .unwrap()
        .iter()
        .map(|target| target.chembl_id().to_string())
        .collect();
    assert_eq!(parents, vec!["CHEMBL9", "CHEMBL10"]);
}
