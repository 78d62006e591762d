use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::CanonicalId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedFeature {
    pub id: CanonicalId,
    pub feature: String,
    pub index: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureMatches {
    matched: Vec<MatchedFeature>,
    unmatched: Vec<CanonicalId>,
    #[serde(skip)]
    by_id: HashMap<CanonicalId, usize>,
}

impl FeatureMatches {
    pub fn get(&self, id: &CanonicalId) -> Option<&MatchedFeature> {
        self.by_id.get(id).map(|&slot| &self.matched[slot])
    }

    pub fn matched(&self) -> &[MatchedFeature] {
        &self.matched
    }

    pub fn unmatched(&self) -> &[CanonicalId] {
        &self.unmatched
    }
}

/// True when `feature` is `id` itself or `id` followed by a `.version` suffix.
/// The match is anchored at the start of `feature`.
pub fn feature_matches(id: &str, feature: &str) -> bool {
    match feature.strip_prefix(id) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

/// Matches each identifier against the feature namespace. When several features match
/// one identifier the earliest in namespace order wins. Repeated identifiers are
/// matched once.
pub fn match_features<'a, I>(ids: I, namespace: &[String]) -> FeatureMatches
where
    I: IntoIterator<Item = &'a CanonicalId>,
{
    let mut matches = FeatureMatches::default();
    let mut seen = HashSet::new();

    for id in ids {
        if !seen.insert(id.clone()) {
            continue;
        }
        let hit = namespace
            .iter()
            .position(|feature| feature_matches(id.as_str(), feature));
        match hit {
            Some(index) => {
                matches.by_id.insert(id.clone(), matches.matched.len());
                matches.matched.push(MatchedFeature {
                    id: id.clone(),
                    feature: namespace[index].clone(),
                    index,
                });
            }
            None => matches.unmatched.push(id.clone()),
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchored_prefix_rule() {
        assert!(feature_matches("Solyc01g000001", "Solyc01g000001"));
        assert!(feature_matches("Solyc01g000001", "Solyc01g000001.2"));
        assert!(!feature_matches("Solyc01g000001", "Solyc01g000001abc"));
        assert!(!feature_matches("Solyc01g000001", "xSolyc01g000001.2"));
        assert!(!feature_matches("Solyc01g000001.2", "Solyc01g000001"));
    }
}
