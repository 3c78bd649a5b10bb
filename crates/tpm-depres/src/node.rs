//! The installation-graph node arena (spec §4.5).

use tpm_core::{AHashMap, AHashSet, Architecture, Formula, VersionNumber};

/// An arena index into [`crate::solver::Solver`]'s node table. Cheap to
/// copy and stable for the lifetime of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// The source of a constraint recorded on a node: either the distinguished
/// user pin (`⊥`) or a back-reference to the dependent node that imposed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintSource {
    /// The user-specified pin, written into `constraints` under `⊥`.
    UserPin,
    /// Imposed by another node's chosen version.
    Dependent(NodeId),
}

/// One node of the installation graph: a `(name, arch)` identity plus every
/// piece of solver-owned bookkeeping for it.
#[derive(Debug, Clone)]
pub struct IgNode {
    pub name: String,
    pub arch: Architecture,
    /// Constraints imposed on this node, keyed by source. `ConstraintSource::UserPin`
    /// is the distinguished `⊥` key.
    pub constraints: AHashMap<ConstraintSource, Formula>,
    pub dependencies: Vec<NodeId>,
    pub pre_dependencies: Vec<NodeId>,
    pub reverse_dependencies: AHashSet<NodeId>,
    pub reverse_pre_dependencies: AHashSet<NodeId>,
    pub chosen_version: Option<VersionNumber>,
    pub installed_version: Option<VersionNumber>,
    /// File paths this node's chosen version claims in the shared file trie,
    /// tracked so a later version change can release exactly these entries.
    pub owned_files: Vec<String>,
    pub is_selected: bool,
    pub installed_automatically: bool,
    pub marked_for_removal: bool,
    /// Monotonic counter of the `t_now` at which this node was last ejected.
    pub t_eject: u64,
    /// Round-robin cursor used when picking which dependent to eject.
    pub eject_index: usize,
    /// Whether this node currently sits in the active queue — lets the
    /// solver skip a redundant push in O(1).
    pub(crate) queued: bool,
}

impl IgNode {
    pub(crate) fn new(name: String, arch: Architecture) -> Self {
        Self {
            name,
            arch,
            constraints: AHashMap::new(),
            dependencies: Vec::new(),
            pre_dependencies: Vec::new(),
            reverse_dependencies: AHashSet::new(),
            reverse_pre_dependencies: AHashSet::new(),
            chosen_version: None,
            installed_version: None,
            owned_files: Vec::new(),
            is_selected: false,
            installed_automatically: false,
            marked_for_removal: false,
            t_eject: 0,
            eject_index: 0,
            queued: false,
        }
    }

    /// Every live constraint formula on this node, user pin first.
    pub fn live_constraints(&self) -> impl Iterator<Item = (&ConstraintSource, &Formula)> {
        self.constraints.iter()
    }

    /// Whether `version` satisfies every live constraint on this node.
    /// A constraint's source node is irrelevant to evaluation — only the
    /// target package's own source/binary version matters, so we treat the
    /// binary version as both fields when the formula targets `Source`
    /// (a depres node tracks only the chosen binary here; `source_version`
    /// equality is enforced by the DB layer at commit time).
    #[must_use]
    pub fn satisfies_all(&self, version: &VersionNumber) -> bool {
        self.constraints.values().all(|f| f.satisfies(version, version))
    }
}
