//! Navigation graph BFS (spec §4.12): `suggest_action(current, target)` returns the first
//! action on the shortest recorded path between two layout fingerprints.

use crate::store::Store;
use std::collections::{HashMap, VecDeque};

/// Breadth-first search over `graph_edges` from `current` to `target`, returning the
/// shortest action path (edge count, not elapsed-time weighted — spec §4.12 "BFS computes
/// shortest action path").
pub fn shortest_path(store: &Store, current: &str, target: &str) -> Option<Vec<String>> {
    if current == target {
        return Some(Vec::new());
    }

    let mut visited = HashMap::new();
    visited.insert(current.to_string(), (None::<String>, None::<String>));
    let mut queue = VecDeque::new();
    queue.push_back(current.to_string());

    while let Some(hash) = queue.pop_front() {
        let edges = store.graph_edges_from(&hash).ok()?;
        for edge in edges {
            if visited.contains_key(&edge.to_hash) {
                continue;
            }
            visited.insert(edge.to_hash.clone(), (Some(hash.clone()), Some(edge.action.clone())));
            if edge.to_hash == target {
                return Some(reconstruct(&visited, target));
            }
            queue.push_back(edge.to_hash);
        }
    }
    None
}

fn reconstruct(visited: &HashMap<String, (Option<String>, Option<String>)>, target: &str) -> Vec<String> {
    let mut actions = Vec::new();
    let mut cursor = target.to_string();
    while let Some((Some(prev), Some(action))) = visited.get(&cursor) {
        actions.push(action.clone());
        cursor = prev.clone();
    }
    actions.reverse();
    actions
}

/// Returns the first action on the shortest path from `current` to `target`, if any route
/// exists (spec §4.12 `suggest_action`).
pub fn suggest_action(store: &Store, current: &str, target: &str) -> Option<String> {
    shortest_path(store, current, target)?.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_graph(store: &Store) {
        for hash in ["home", "settings", "display", "dark-mode"] {
            store.graph_upsert_node(hash, "Demo", hash, 1.0).unwrap();
        }
        store.graph_upsert_edge("home", "settings", "click Settings", true, 1.0, 1.0).unwrap();
        store.graph_upsert_edge("settings", "display", "click Display", true, 1.0, 2.0).unwrap();
        store.graph_upsert_edge("display", "dark-mode", "click Dark Mode", true, 1.0, 3.0).unwrap();
        // A longer alternate route that BFS must not prefer.
        store.graph_upsert_edge("home", "display", "click Display Shortcut", true, 1.0, 1.0).unwrap();
    }

    #[test]
    fn bfs_finds_shortest_path() {
        let store = Store::open_in_memory().unwrap();
        seed_graph(&store);
        let path = shortest_path(&store, "home", "dark-mode").unwrap();
        assert_eq!(path, vec!["click Display Shortcut".to_string(), "click Dark Mode".to_string()]);
    }

    #[test]
    fn suggest_action_returns_first_step() {
        let store = Store::open_in_memory().unwrap();
        seed_graph(&store);
        assert_eq!(suggest_action(&store, "home", "settings"), Some("click Settings".to_string()));
    }

    #[test]
    fn no_path_returns_none() {
        let store = Store::open_in_memory().unwrap();
        seed_graph(&store);
        assert_eq!(suggest_action(&store, "dark-mode", "home"), None);
    }

    #[test]
    fn same_node_returns_empty_path() {
        let store = Store::open_in_memory().unwrap();
        seed_graph(&store);
        assert_eq!(shortest_path(&store, "home", "home"), Some(Vec::new()));
    }
}
