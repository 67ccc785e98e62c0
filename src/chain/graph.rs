//! Graph checks and wave selection

use crate::chain::types::{Chain, NodeState};
use crate::errors::{OrchestratorError, Result};
use std::collections::{HashMap, HashSet, VecDeque};

/// Validate `(id, depends_on)` pairs and return ids in topological order
///
/// Rejects duplicate ids, edges to unknown ids and cycles. Order is stable
/// with respect to the input among nodes of equal depth.
pub fn topological_order(nodes: &[(String, Vec<String>)]) -> Result<Vec<String>> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, (id, _)) in nodes.iter().enumerate() {
        if index.insert(id.as_str(), i).is_some() {
            return Err(OrchestratorError::DuplicateNode(id.clone()));
        }
    }

    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, (id, deps)) in nodes.iter().enumerate() {
        let unique: HashSet<&str> = deps.iter().map(String::as_str).collect();
        for dep in unique {
            let &d = index.get(dep).ok_or_else(|| OrchestratorError::UnknownDependency {
                node: id.clone(),
                dependency: dep.to_string(),
            })?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = queue.pop_front() {
        order.push(nodes[i].0.clone());
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != nodes.len() {
        let mut cyclic: Vec<String> = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].0.clone())
            .collect();
        cyclic.sort();
        return Err(OrchestratorError::CyclicChainDefinition { nodes: cyclic });
    }
    Ok(order)
}

/// Skip every PENDING node with a FAILED or SKIPPED dependency, to a fixpoint
///
/// Returns the ids skipped, in topological order.
pub fn propagate_skips(chain: &mut Chain) -> Result<Vec<String>> {
    let mut skipped = Vec::new();
    // One pass in topological order reaches the fixpoint
    for id in chain.order.clone() {
        let blocker = match chain.nodes.get(&id) {
            Some(node) if node.state == NodeState::Pending => node
                .depends_on
                .iter()
                .filter_map(|dep| chain.nodes.get(dep))
                .find(|dep| matches!(dep.state, NodeState::Failed | NodeState::Skipped))
                .map(|dep| format!("dependency {} {}", dep.id, dep.state.as_str().to_lowercase())),
            _ => None,
        };
        if let (Some(reason), Some(node)) = (blocker, chain.nodes.get_mut(&id)) {
            node.skip(reason)?;
            skipped.push(id);
        }
    }
    Ok(skipped)
}

/// PENDING nodes whose dependencies all reached SUCCESS, plus nodes left READY
pub fn ready_ids(chain: &Chain) -> Vec<String> {
    chain
        .ordered_nodes()
        .filter(|node| match node.state {
            NodeState::Ready => true,
            NodeState::Pending => dependencies_succeeded(chain, &node.depends_on),
            _ => false,
        })
        .map(|node| node.id.clone())
        .collect()
}

pub fn dependencies_succeeded(chain: &Chain, deps: &[String]) -> bool {
    deps.iter().all(|dep| {
        chain
            .nodes
            .get(dep)
            .map(|n| n.state == NodeState::Success)
            .unwrap_or(false)
    })
}

/// Ids of nodes that list `id` as a dependency
pub fn dependents_of<'a>(chain: &'a Chain, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    chain
        .ordered_nodes()
        .filter(move |n| n.depends_on.iter().any(|d| d == id))
        .map(|n| n.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(edges: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        edges
            .iter()
            .map(|(id, deps)| (id.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_topological_order() {
        let order = topological_order(&pairs(&[
            ("vuln", &["nmap", "whatweb"]),
            ("nmap", &[]),
            ("whatweb", &[]),
            ("exploit", &["vuln"]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["nmap", "whatweb", "vuln", "exploit"]);
    }

    #[test]
    fn test_two_node_cycle_rejected() {
        let err = topological_order(&pairs(&[("a", &["b"]), ("b", &["a"])])).unwrap_err();
        match err {
            OrchestratorError::CyclicChainDefinition { nodes } => assert_eq!(nodes, vec!["a", "b"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_self_loop_rejected() {
        assert!(matches!(
            topological_order(&pairs(&[("a", &["a"])])),
            Err(OrchestratorError::CyclicChainDefinition { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency_and_duplicates() {
        assert!(matches!(
            topological_order(&pairs(&[("a", &["ghost"])])),
            Err(OrchestratorError::UnknownDependency { .. })
        ));
        assert!(matches!(
            topological_order(&pairs(&[("a", &[]), ("a", &[])])),
            Err(OrchestratorError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_repeated_edge_counted_once() {
        let order = topological_order(&pairs(&[("a", &[]), ("b", &["a", "a"])])).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }
}
