//! Advisory next steps

use crate::chain::findings::Findings;
use crate::chain::graph::dependencies_succeeded;
use crate::chain::types::{Chain, Suggestion};

/// Unexecuted nodes whose dependencies all succeeded, best first
///
/// Ranked recon, then vulnerability scanning, then attacks, then
/// exploitation; ties broken by node id.
pub fn suggest_next_steps(chain: &Chain) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = chain
        .ordered_nodes()
        .filter(|n| n.state.is_open() && dependencies_succeeded(chain, &n.depends_on))
        .map(|node| Suggestion {
            node_id: node.id.clone(),
            tool: node.tool.clone(),
            category: node.category,
            priority: node.category.priority(),
            params: node.params.clone(),
            missing_params: node.unresolved.clone(),
            reason: reason_for(chain, &node.depends_on, node.category.as_str()),
        })
        .collect();
    suggestions.sort_by(|a, b| (a.priority, &a.node_id).cmp(&(b.priority, &b.node_id)));
    suggestions
}

fn reason_for(chain: &Chain, deps: &[String], phase: &str) -> String {
    if deps.is_empty() {
        return format!("No prerequisites; starts the {} phase", phase);
    }

    let observed: Vec<String> = deps
        .iter()
        .filter_map(|dep| chain.nodes.get(dep))
        .filter_map(|parent| {
            let findings = parent.result.as_deref().map(Findings::from_result)?;
            findings.describe().map(|d| format!("{} found {}", parent.id, d))
        })
        .collect();

    if observed.is_empty() {
        format!("Prerequisites completed: {}", deps.join(", "))
    } else {
        observed.join("; ")
    }
}
