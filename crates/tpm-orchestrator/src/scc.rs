//! Serializes the resolved graph by contracting strongly-connected
//! components (Tarjan) and emitting them in topological order — once for
//! `dependencies` (configuration order) and once for `pre_dependencies`
//! (unpack/removal order), per spec §4.6/§5.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use tpm_core::Architecture;
use tpm_depres::InstallationGraph;

pub type PackageKey = (String, Architecture);

/// Which edge set to order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Dependencies,
    PreDependencies,
}

/// Returns package identities grouped into strongly-connected components,
/// each component already internally ordered (arbitrarily, but
/// deterministically by name/arch), and components themselves in
/// topological order with respect to `edge_kind`.
#[must_use]
pub fn topological_order(graph: &InstallationGraph, edge_kind: EdgeKind) -> Vec<Vec<PackageKey>> {
    let mut g: DiGraphMap<usize, ()> = DiGraphMap::new();
    let keys: Vec<PackageKey> = graph.nodes.iter().map(|n| (n.name.clone(), n.arch)).collect();
    for i in 0..keys.len() {
        g.add_node(i);
    }
    for (i, node) in graph.nodes.iter().enumerate() {
        let edges = match edge_kind {
            EdgeKind::Dependencies => &node.dependencies,
            EdgeKind::PreDependencies => &node.pre_dependencies,
        };
        for (dep_name, dep_arch) in edges {
            if let Some(j) = keys.iter().position(|k| k.0 == *dep_name && k.1 == *dep_arch) {
                // An edge from `i` to its dependency `j`: `i` must come
                // after `j` in the emitted order, so the graph edge points
                // from the dependency to the dependent for a forward
                // topological walk.
                g.add_edge(j, i, ());
            }
        }
    }

    // `tarjan_scc` returns components in reverse topological order already.
    let mut sccs = tarjan_scc(&g);
    sccs.reverse();

    sccs.into_iter()
        .map(|mut component| {
            component.sort_unstable();
            component.into_iter().map(|i| keys[i].clone()).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_depres::ResolvedNode;

    fn node(name: &str, deps: &[&str]) -> ResolvedNode {
        ResolvedNode {
            name: name.into(),
            arch: Architecture::Amd64,
            chosen_version: None,
            installed_version: None,
            is_selected: true,
            installed_automatically: false,
            dependencies: deps.iter().map(|d| (d.to_string(), Architecture::Amd64)).collect(),
            pre_dependencies: vec![],
        }
    }

    #[test]
    fn dependencies_are_ordered_before_dependents() {
        let graph = InstallationGraph {
            nodes: vec![node("app", &["libfoo"]), node("libfoo", &[])],
        };
        let order = topological_order(&graph, EdgeKind::Dependencies);
        let flat: Vec<&str> = order.iter().flatten().map(|k| k.0.as_str()).collect();
        assert_eq!(flat, vec!["libfoo", "app"]);
    }

    #[test]
    fn a_dependency_cycle_collapses_into_one_component() {
        let graph = InstallationGraph {
            nodes: vec![node("a", &["b"]), node("b", &["a"])],
        };
        let order = topological_order(&graph, EdgeKind::Dependencies);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].len(), 2);
    }
}
