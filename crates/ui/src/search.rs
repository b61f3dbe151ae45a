use crate::types::{ControlMatch, UiNode};

/// Fuzzy name score: exact match 1.0, prefix 0.9, substring 0.8,
/// anything else is excluded. Case-insensitive.
pub fn score_name(candidate: &str, query: &str) -> Option<f32> {
    let candidate = candidate.to_lowercase();
    let query = query.to_lowercase();
    if candidate == query {
        Some(1.0)
    } else if candidate.starts_with(&query) {
        Some(0.9)
    } else if candidate.contains(&query) {
        Some(0.8)
    } else {
        None
    }
}

/// Score and rank nodes against a query, best first. Ties keep the
/// original tree order, so earlier (outer) controls win.
pub fn control_search(nodes: &[UiNode], query: &str) -> Vec<ControlMatch> {
    let mut matches: Vec<ControlMatch> = nodes
        .iter()
        .filter_map(|node| {
            score_name(&node.name, query).map(|score| ControlMatch {
                node: node.clone(),
                score,
            })
        })
        .collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> UiNode {
        UiNode {
            id: name.to_string(),
            role: "button".to_string(),
            name: name.to_string(),
            x: 0,
            y: 0,
            width: 10,
            height: 10,
            offscreen: false,
        }
    }

    #[test]
    fn exact_beats_prefix_beats_substring() {
        let nodes = vec![node("Order History"), node("Submit Order"), node("Submit")];
        let results = control_search(&nodes, "submit");

        let names: Vec<&str> = results.iter().map(|m| m.node.name.as_str()).collect();
        assert_eq!(names, vec!["Submit", "Submit Order"]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.9);
    }

    #[test]
    fn substring_scores_point_eight() {
        assert_eq!(score_name("Re-Submit", "submit"), Some(0.8));
        assert_eq!(score_name("Cancel", "submit"), None);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(score_name("SUBMIT", "submit"), Some(1.0));
        assert_eq!(score_name("submit order", "Submit"), Some(0.9));
    }
}
