use expression_probe::domain::CanonicalId;
use expression_probe::matcher::{feature_matches, match_features};

fn id(value: &str) -> CanonicalId {
    CanonicalId::new(value).unwrap()
}

fn namespace(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn dotted_suffix_matches_but_bare_suffix_does_not() {
    assert!(feature_matches("AT5G11260", "AT5G11260.2"));
    assert!(!feature_matches("AT5G11260", "AT5G11260abc"));
}

#[test]
fn matches_are_anchored_at_start() {
    let features = namespace(&["gene:AT5G11260.1", "xAT5G11260"]);
    let matches = match_features(&[id("AT5G11260")], &features);
    assert!(matches.matched().is_empty());
    assert_eq!(matches.unmatched(), [id("AT5G11260")]);
}

#[test]
fn first_feature_in_namespace_order_wins() {
    let features = namespace(&["AT1G01010.1", "AT5G11260.2", "AT5G11260", "AT5G11260.1"]);
    let matches = match_features(&[id("AT5G11260")], &features);
    let hit = matches.get(&id("AT5G11260")).unwrap();
    assert_eq!(hit.feature, "AT5G11260.2");
    assert_eq!(hit.index, 1);
}

#[test]
fn unmatched_and_matched_are_complementary() {
    let features = namespace(&["Solyc01g000001.2", "Solyc02g000002.1"]);
    let ids = [id("Solyc01g000001"), id("Solyc09g999999"), id("Solyc02g000002")];
    let matches = match_features(&ids, &features);
    let matched: Vec<&str> = matches.matched().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(matched, vec!["Solyc01g000001", "Solyc02g000002"]);
    assert_eq!(matches.unmatched(), [id("Solyc09g999999")]);
}

#[test]
fn repeated_identifiers_are_matched_once() {
    let features = namespace(&["G1.1"]);
    let ids = [id("G1"), id("G1.4")];
    let matches = match_features(&ids, &features);
    assert_eq!(matches.matched().len(), 1);
    assert!(matches.unmatched().is_empty());
}
