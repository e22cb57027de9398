//! Conflict counting.
//!
//! The penalty of a coloring is the number of edges whose two endpoints both
//! have a known color and that color is equal. Unknown endpoints never
//! conflict, so an unannounced boundary node is optimistic by construction.

use std::collections::BTreeMap;

use accord_topology::{Color, Edge, NodeId};

/// A partial coloring keyed by node.
pub type Coloring = BTreeMap<NodeId, Color>;

/// Count conflicting edges, looking colors up through `color_of`.
pub fn penalty<F>(edges: &[Edge], color_of: F) -> u32
where
    F: Fn(NodeId) -> Option<Color>,
{
    edges
        .iter()
        .filter(|e| is_conflict(e, &color_of))
        .count() as u32
}

/// Penalty of an own assignment against believed boundary colors.
///
/// Own colors take precedence over beliefs when a node appears in both.
pub fn penalty_of(edges: &[Edge], own: &Coloring, beliefs: &Coloring) -> u32 {
    penalty(edges, |n| own.get(&n).or_else(|| beliefs.get(&n)).copied())
}

/// The conflicting edges themselves, in edge order.
pub fn conflicting_edges(edges: &[Edge], own: &Coloring, beliefs: &Coloring) -> Vec<Edge> {
    let color_of = |n: NodeId| own.get(&n).or_else(|| beliefs.get(&n)).copied();
    edges
        .iter()
        .filter(|e| is_conflict(e, &color_of))
        .copied()
        .collect()
}

fn is_conflict<F>(edge: &Edge, color_of: &F) -> bool
where
    F: Fn(NodeId) -> Option<Color>,
{
    match (color_of(edge.a), color_of(edge.b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn unknown_endpoints_never_conflict() {
        let edges = [Edge::new(n(0), n(1)), Edge::new(n(1), n(2))];
        let own: Coloring = [(n(0), Color(0)), (n(1), Color(0))].into_iter().collect();
        assert_eq!(penalty_of(&edges, &own, &Coloring::new()), 1);
    }

    #[test]
    fn beliefs_count_like_known_colors() {
        let edges = [Edge::new(n(0), n(1)), Edge::new(n(0), n(2))];
        let own: Coloring = [(n(0), Color(1))].into_iter().collect();
        let beliefs: Coloring = [(n(1), Color(1)), (n(2), Color(1))].into_iter().collect();
        assert_eq!(penalty_of(&edges, &own, &beliefs), 2);
        assert_eq!(conflicting_edges(&edges, &own, &beliefs).len(), 2);
    }

    proptest! {
        #[test]
        fn penalty_matches_edge_count(
            raw_edges in prop::collection::vec((0u32..8, 0u32..8), 0..20),
            colors in prop::collection::vec(prop::option::of(0u8..3), 8),
        ) {
            let edges: Vec<Edge> = raw_edges
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| Edge::new(n(a), n(b)))
                .collect();
            let coloring: Coloring = colors
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.map(|c| (n(i as u32), Color(c))))
                .collect();

            let mut expected = 0;
            for e in &edges {
                if let (Some(x), Some(y)) = (coloring.get(&e.a), coloring.get(&e.b)) {
                    if x == y {
                        expected += 1;
                    }
                }
            }

            // Splitting the coloring between own and beliefs must not matter.
            let (own, beliefs): (Coloring, Coloring) =
                coloring.iter().partition(|(id, _)| id.0 % 2 == 0);
            prop_assert_eq!(penalty_of(&edges, &own, &beliefs), expected);
            prop_assert_eq!(penalty(&edges, |id| coloring.get(&id).copied()), expected);
        }
    }
}
