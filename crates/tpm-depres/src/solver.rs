//! The iterative score-guided solver: seeding, the main work-queue loop,
//! and post-loop garbage collection (spec §4.5).

use std::collections::VecDeque;

use tpm_core::{AHashMap, AHashSet, Architecture, Error, Result, VersionNumber};
use tpm_filetrie::Trie;
use tpm_provider::Provider;
use tpm_transport::PackageDescriptor;
use tracing::{debug, warn};

use crate::node::{ConstraintSource, IgNode, NodeId};
use crate::policy::Policy;
use crate::scoring::{self, ConstraintFit, Score};
use crate::types::{InstallationGraph, InstalledPackage, ResolvedNode, SelectedPackage};

/// How many times the same `(version, score-bits)` pair may recur on one
/// node before the solver concludes it is oscillating and gives up.
const OSCILLATION_ABORT_COUNT: u32 = 10;
/// Past this many recurrences a diagnostic is logged, but resolution keeps
/// running in case the graph still settles before the abort threshold.
const OSCILLATION_WARN_COUNT: u32 = 8;

/// Tunable knobs for one resolution run.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub policy: Policy,
    /// Forces every reachable node back onto the queue once seeding
    /// completes, even if its installed version still satisfies every
    /// live constraint (set for `--upgrade`/`--install` runs that should
    /// consider newly published versions, not just `--mark-auto`-style
    /// bookkeeping runs).
    pub evaluate_all: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            evaluate_all: false,
        }
    }
}

/// Counters surfaced to the caller once resolution finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    pub rounds: u64,
    pub ejections: u64,
    pub nodes_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OscillationKey {
    version: VersionNumber,
    alpha_bits: u64,
}

/// One scored candidate version, retained only for the duration of one
/// node's evaluation round.
struct Candidate {
    version: VersionNumber,
    descriptor: Option<PackageDescriptor>,
    files: Vec<String>,
    score: Score,
}

/// Runs one resolution: seeds an installation graph from the currently
/// installed set and the user's selections, then iterates the work queue
/// until every reachable node has a stable chosen version.
pub struct Solver<'p> {
    provider: &'p Provider,
    config: SolverConfig,
    nodes: Vec<IgNode>,
    index: AHashMap<(String, Architecture), NodeId>,
    queue: VecDeque<NodeId>,
    file_owners: Trie<NodeId>,
    t_now: u64,
    stats: SolverStats,
    oscillation_history: AHashMap<NodeId, Vec<OscillationKey>>,
}

impl<'p> Solver<'p> {
    #[must_use]
    pub fn new(provider: &'p Provider, config: SolverConfig) -> Self {
        Self {
            provider,
            config,
            nodes: Vec::new(),
            index: AHashMap::new(),
            queue: VecDeque::new(),
            file_owners: Trie::new(),
            t_now: 0,
            stats: SolverStats::default(),
            oscillation_history: AHashMap::new(),
        }
    }

    /// Runs seeding, the main loop, and garbage collection, returning the
    /// surviving graph.
    pub fn resolve(mut self, installed: &[InstalledPackage], selected: &[SelectedPackage]) -> Result<InstallationGraph> {
        self.seed(installed, selected)?;
        self.run_main_loop()?;
        self.collect_garbage();
        self.check_integrity()?;
        Ok(self.into_graph())
    }

    #[must_use]
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    fn get_or_create_node(&mut self, name: &str, arch: Architecture) -> NodeId {
        let key = (name.to_string(), arch);
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(IgNode::new(name.to_string(), arch));
        self.index.insert(key, id);
        id
    }

    fn enqueue(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        if !node.queued && !node.marked_for_removal {
            node.queued = true;
            self.queue.push_back(id);
        }
    }

    fn fetch_descriptor(&self, name: &str, arch: Architecture, version: &VersionNumber) -> Option<PackageDescriptor> {
        match self.provider.get_package(name, arch, version) {
            Ok(Some(pkg)) => match pkg.mdata() {
                Ok(desc) => Some(desc),
                Err(e) => {
                    warn!(name, %arch, %version, error = %e, "skipping package with unreadable descriptor");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(name, %arch, %version, error = %e, "provider failed to read package");
                None
            }
        }
    }

    fn fetch_files(&self, name: &str, arch: Architecture, version: &VersionNumber) -> Vec<String> {
        match self.provider.get_package(name, arch, version) {
            Ok(Some(pkg)) => match pkg.file_list() {
                Ok(files) => files.into_iter().map(|f| f.path).collect(),
                Err(e) => {
                    warn!(name, %arch, %version, error = %e, "skipping unreadable file index");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        }
    }

    // ---- seeding -----------------------------------------------------

    fn seed(&mut self, installed: &[InstalledPackage], selected: &[SelectedPackage]) -> Result<()> {
        for pkg in installed {
            let id = self.get_or_create_node(&pkg.name, pkg.arch);
            let node = &mut self.nodes[id.0];
            node.installed_version = Some(pkg.version.clone());
            node.chosen_version = Some(pkg.version.clone());
            node.installed_automatically = pkg.installed_automatically;
            self.enqueue(id);
        }

        for pkg in selected {
            let id = self.get_or_create_node(&pkg.name, pkg.arch);
            {
                let node = &mut self.nodes[id.0];
                node.is_selected = true;
                node.installed_automatically = false;
            }
            self.add_user_constraint(id, pkg.formula.clone());
            self.enqueue(id);
        }

        // Register dependency edges for every already-chosen version so the
        // graph is fully wired before the first round runs.
        let chosen: Vec<NodeId> = (0..self.nodes.len()).map(NodeId).collect();
        for id in chosen {
            if let Some(version) = self.nodes[id.0].chosen_version.clone() {
                let files = self.fetch_files(&self.nodes[id.0].name.clone(), self.nodes[id.0].arch, &version);
                self.claim_files(id, &files);
                if let Some(desc) = self.fetch_descriptor(&self.nodes[id.0].name.clone(), self.nodes[id.0].arch, &version) {
                    self.register_dependencies(id, &desc);
                }
            }
            if self.config.evaluate_all {
                self.enqueue(id);
            }
        }
        Ok(())
    }

    fn add_user_constraint(&mut self, id: NodeId, formula: tpm_core::Formula) {
        let node = &mut self.nodes[id.0];
        let combined = match node.constraints.remove(&ConstraintSource::UserPin) {
            Some(existing) => tpm_core::Formula::And(Some(Box::new(existing)), Some(Box::new(formula))),
            None => formula,
        };
        node.constraints.insert(ConstraintSource::UserPin, combined);
    }

    // ---- main loop -----------------------------------------------------

    fn run_main_loop(&mut self) -> Result<()> {
        while let Some(id) = self.queue.pop_front() {
            self.nodes[id.0].queued = false;
            if self.nodes[id.0].marked_for_removal {
                continue;
            }
            self.t_now += 1;
            self.stats.rounds += 1;
            self.process_node(id)?;
        }
        Ok(())
    }

    fn process_node(&mut self, id: NodeId) -> Result<()> {
        let name = self.nodes[id.0].name.clone();
        let arch = self.nodes[id.0].arch;

        let mut versions: Vec<VersionNumber> = self.provider.list_package_versions(&name, arch)?.into_iter().collect();
        if let Some(installed) = self.nodes[id.0].installed_version.clone() {
            if !versions.contains(&installed) {
                versions.push(installed);
            }
        }
        versions.sort();

        if versions.is_empty() {
            self.handle_unsatisfiable(id);
            return Ok(());
        }

        let total = versions.len();
        let mut candidates = Vec::with_capacity(total);
        for (rank, version) in versions.into_iter().enumerate() {
            let descriptor = self.fetch_descriptor(&name, arch, &version);
            let files = self.fetch_files(&name, arch, &version);
            let score = self.score_candidate(id, &version, rank, total, descriptor.as_ref(), &files);
            candidates.push(Candidate { version, descriptor, files, score });
        }

        let best_index = candidates
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.score.alpha.partial_cmp(&b.score.alpha).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .expect("candidates is non-empty");

        if candidates[best_index].score.is_rejection() {
            self.handle_unsatisfiable(id);
            return Ok(());
        }

        if self.nodes[id.0].chosen_version.as_ref() == Some(&candidates[best_index].version) {
            return Ok(());
        }

        if self.check_oscillation(id, &candidates[best_index]) {
            let offenders = self.oscillation_diagnostic();
            return Err(Error::Solver(format!(
                "resolution for {name}/{arch} did not converge after {OSCILLATION_ABORT_COUNT} oscillations (recurring: {offenders})"
            )));
        }

        if self.is_unwanted(id, &candidates, best_index) {
            self.mark_for_removal(id);
            return Ok(());
        }

        self.commit_choice(id, candidates.swap_remove(best_index));
        Ok(())
    }

    /// Whether `id` is an installed-but-no-longer-needed package eligible
    /// for removal: it must be installed, scored poorly either on its own
    /// candidate or on its installed version (with no newer candidate
    /// winning), and have no selected package transitively depending on it.
    fn is_unwanted(&self, id: NodeId, candidates: &[Candidate], best_index: usize) -> bool {
        let node = &self.nodes[id.0];
        let Some(installed) = node.installed_version.as_ref() else {
            return false;
        };
        let best = &candidates[best_index];
        let installed_score_triggers = candidates
            .iter()
            .find(|c| &c.version == installed)
            .is_some_and(|c| c.score.alpha < -6.5 && best.version <= *installed);
        let score_triggers = best.score.alpha < -6.5 || installed_score_triggers;
        if !score_triggers {
            return false;
        }
        !node.is_selected && !self.has_selected_dependent(id)
    }

    /// Walks `reverse_dependencies`/`reverse_pre_dependencies` transitively,
    /// looking for any dependent that is itself a user selection.
    fn has_selected_dependent(&self, id: NodeId) -> bool {
        let mut stack: Vec<NodeId> = self.nodes[id.0]
            .reverse_dependencies
            .iter()
            .chain(self.nodes[id.0].reverse_pre_dependencies.iter())
            .copied()
            .collect();
        let mut seen: AHashSet<NodeId> = AHashSet::new();
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            if self.nodes[cur.0].is_selected {
                return true;
            }
            stack.extend(self.nodes[cur.0].reverse_dependencies.iter().copied());
            stack.extend(self.nodes[cur.0].reverse_pre_dependencies.iter().copied());
        }
        false
    }

    fn score_candidate(
        &self,
        id: NodeId,
        version: &VersionNumber,
        rank: usize,
        total: usize,
        descriptor: Option<&PackageDescriptor>,
        files: &[String],
    ) -> Score {
        let node = &self.nodes[id.0];
        let theta = scoring::theta(self.t_now, node.t_eject);

        let user_pin = node.constraints.get(&ConstraintSource::UserPin);
        let fit = if let Some(formula) = user_pin {
            if formula.satisfies(version, version) {
                ConstraintFit::UserPinSatisfied
            } else {
                ConstraintFit::UserPinViolated
            }
        } else {
            let conflicted = node
                .constraints
                .iter()
                .any(|(_, formula)| !formula.satisfies(version, version));
            if conflicted {
                ConstraintFit::DependentConflict
            } else {
                ConstraintFit::Unconstrained
            }
        };
        let c = scoring::constraint_fit_term(fit, theta);

        let mut eject_count = 0u32;
        if let Some(desc) = descriptor {
            for dep in desc.dependencies.iter().chain(desc.pre_dependencies.iter()) {
                if let Some(&target) = self.index.get(&(dep.name.clone(), dep.arch)) {
                    if let Some(chosen) = &self.nodes[target.0].chosen_version {
                        if !dep.constraint.satisfies(chosen, chosen) {
                            eject_count += 1;
                        }
                    }
                }
            }
        }
        let d = scoring::dependency_eject_term(eject_count, theta);

        let mut conflicting_owners = AHashSet::new();
        for path in files {
            if let Some(&owner) = self.file_owners.get_file_payload(path) {
                if owner != id {
                    conflicting_owners.insert(owner);
                }
            }
        }
        let f = scoring::file_conflict_term(conflicting_owners.len() as u32);

        let is_installed_equal = node.installed_version.as_ref() == Some(version);
        let b = scoring::bias_term(self.config.policy, rank, total, node.is_selected, is_installed_equal);

        scoring::score(c, d, f, b)
    }

    fn check_oscillation(&mut self, id: NodeId, best: &Candidate) -> bool {
        let key = OscillationKey {
            version: best.version.clone(),
            alpha_bits: best.score.alpha.to_bits(),
        };
        let history = self.oscillation_history.entry(id).or_default();
        let count = history.iter().filter(|k| **k == key).count() as u32 + 1;
        history.push(key);
        if count >= OSCILLATION_WARN_COUNT {
            warn!(
                name = %self.nodes[id.0].name,
                arch = %self.nodes[id.0].arch,
                count,
                "candidate recurring without settling"
            );
        }
        count >= OSCILLATION_ABORT_COUNT
    }

    /// Every `(name, arch)` whose recurring-candidate counter has passed
    /// [`OSCILLATION_WARN_COUNT`], sorted with the worst offender first —
    /// the abort path reports the whole set, not just the node that
    /// happened to trip the threshold.
    fn oscillation_diagnostic(&self) -> String {
        let mut offenders: Vec<(&str, Architecture, u32)> = self
            .oscillation_history
            .iter()
            .filter_map(|(id, history)| {
                let mut counts: AHashMap<&OscillationKey, u32> = AHashMap::new();
                for key in history {
                    *counts.entry(key).or_insert(0) += 1;
                }
                let max_count = counts.values().copied().max().unwrap_or(0);
                if max_count > OSCILLATION_WARN_COUNT {
                    Some((self.nodes[id.0].name.as_str(), self.nodes[id.0].arch, max_count))
                } else {
                    None
                }
            })
            .collect();
        offenders.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));
        offenders
            .into_iter()
            .map(|(name, arch, count)| format!("{name}/{arch} x{count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn handle_unsatisfiable(&mut self, id: NodeId) {
        if self.try_eject_a_dependent(id) {
            return;
        }
        self.mark_for_removal(id);
    }

    /// Round-robin-selects one of `id`'s dependents and re-queues it so it
    /// re-evaluates its own choice, which may relax or drop the constraint
    /// it imposed on `id`.
    fn try_eject_a_dependent(&mut self, id: NodeId) -> bool {
        let dependents: Vec<NodeId> = self.nodes[id.0]
            .reverse_dependencies
            .iter()
            .chain(self.nodes[id.0].reverse_pre_dependencies.iter())
            .copied()
            .collect();
        if dependents.is_empty() {
            return false;
        }
        let cursor = self.nodes[id.0].eject_index % dependents.len();
        let target = dependents[cursor];
        self.nodes[id.0].eject_index = self.nodes[id.0].eject_index.wrapping_add(1);
        self.nodes[target.0].t_eject = self.t_now;
        self.stats.ejections += 1;
        self.enqueue(target);
        true
    }

    fn commit_choice(&mut self, id: NodeId, candidate: Candidate) {
        let had_previous = self.nodes[id.0].chosen_version.is_some();
        if had_previous {
            self.nodes[id.0].t_eject = self.t_now;
            self.stats.ejections += 1;
        }
        self.release_files(id);
        self.claim_files(id, &candidate.files);
        self.clear_dependency_edges(id);
        self.nodes[id.0].chosen_version = Some(candidate.version);
        if let Some(desc) = candidate.descriptor {
            self.register_dependencies(id, &desc);
        }
        debug!(
            name = %self.nodes[id.0].name,
            arch = %self.nodes[id.0].arch,
            version = %self.nodes[id.0].chosen_version.as_ref().unwrap(),
            alpha = candidate.score.alpha,
            "chose version"
        );
    }

    fn claim_files(&mut self, id: NodeId, files: &[String]) {
        for path in files {
            if let Some(&owner) = self.file_owners.get_file_payload(path) {
                if owner == id {
                    continue;
                }
                self.file_owners.remove_element(path);
                self.nodes[owner.0].owned_files.retain(|p| p != path);
                self.nodes[owner.0].t_eject = self.t_now;
                self.enqueue(owner);
            }
            self.file_owners.insert_file(path, id);
        }
        self.nodes[id.0].owned_files = files.to_vec();
    }

    fn release_files(&mut self, id: NodeId) {
        let files = std::mem::take(&mut self.nodes[id.0].owned_files);
        for path in &files {
            if self.file_owners.get_file_payload(path) == Some(&id) {
                self.file_owners.remove_element(path);
            }
        }
    }

    fn register_dependencies(&mut self, id: NodeId, desc: &PackageDescriptor) {
        let targets: Vec<NodeId> = desc.dependencies.iter().map(|d| self.get_or_create_node(&d.name, d.arch)).collect();
        for (target, dep) in targets.iter().zip(desc.dependencies.iter()) {
            self.nodes[target.0].reverse_dependencies.insert(id);
            self.nodes[target.0].constraints.insert(ConstraintSource::Dependent(id), dep.constraint.clone());
            self.enqueue_if_invalidated(*target, &dep.constraint);
        }
        self.nodes[id.0].dependencies = targets;

        let pre_targets: Vec<NodeId> = desc.pre_dependencies.iter().map(|d| self.get_or_create_node(&d.name, d.arch)).collect();
        for (target, dep) in pre_targets.iter().zip(desc.pre_dependencies.iter()) {
            self.nodes[target.0].reverse_pre_dependencies.insert(id);
            self.nodes[target.0].constraints.insert(ConstraintSource::Dependent(id), dep.constraint.clone());
            self.enqueue_if_invalidated(*target, &dep.constraint);
        }
        self.nodes[id.0].pre_dependencies = pre_targets;
    }

    /// Re-queues `target` only if the constraint just imposed on it would
    /// actually invalidate its current chosen version — a newly registered
    /// edge that the existing choice already satisfies shouldn't perturb an
    /// otherwise-settled node.
    fn enqueue_if_invalidated(&mut self, target: NodeId, constraint: &tpm_core::Formula) {
        let invalidated = match &self.nodes[target.0].chosen_version {
            Some(v) => !constraint.satisfies(v, v),
            None => true,
        };
        if invalidated {
            self.enqueue(target);
        }
    }

    fn clear_dependency_edges(&mut self, id: NodeId) {
        let old_deps = std::mem::take(&mut self.nodes[id.0].dependencies);
        for target in old_deps {
            self.nodes[target.0].reverse_dependencies.remove(&id);
            self.nodes[target.0].constraints.remove(&ConstraintSource::Dependent(id));
            self.enqueue(target);
        }
        let old_pre = std::mem::take(&mut self.nodes[id.0].pre_dependencies);
        for target in old_pre {
            self.nodes[target.0].reverse_pre_dependencies.remove(&id);
            self.nodes[target.0].constraints.remove(&ConstraintSource::Dependent(id));
            self.enqueue(target);
        }
    }

    fn mark_for_removal(&mut self, id: NodeId) {
        if self.nodes[id.0].marked_for_removal {
            return;
        }
        self.nodes[id.0].marked_for_removal = true;
        self.release_files(id);
        self.clear_dependency_edges(id);
        self.stats.nodes_removed += 1;
    }

    // ---- garbage collection -------------------------------------------

    fn collect_garbage(&mut self) {
        loop {
            let roots: Vec<NodeId> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.is_selected && !n.marked_for_removal)
                .map(|(i, _)| NodeId(i))
                .collect();

            let mut reachable: AHashSet<NodeId> = AHashSet::new();
            let mut stack = roots;
            while let Some(id) = stack.pop() {
                if !reachable.insert(id) {
                    continue;
                }
                let node = &self.nodes[id.0];
                for dep in node.dependencies.iter().chain(node.pre_dependencies.iter()) {
                    if !reachable.contains(dep) && !self.nodes[dep.0].marked_for_removal {
                        stack.push(*dep);
                    }
                }
            }

            let mut changed = false;
            for i in 0..self.nodes.len() {
                if !self.nodes[i].marked_for_removal && !reachable.contains(&NodeId(i)) {
                    self.mark_for_removal(NodeId(i));
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn check_integrity(&self) -> Result<()> {
        for node in &self.nodes {
            if node.marked_for_removal {
                continue;
            }
            if node.chosen_version.is_none() {
                return Err(Error::Solver(format!("{}/{} has no chosen version after resolution", node.name, node.arch)));
            }
            if node.is_selected {
                for dep in node.dependencies.iter().chain(node.pre_dependencies.iter()) {
                    if self.nodes[dep.0].marked_for_removal {
                        return Err(Error::Solver(format!(
                            "{}/{} depends on {}/{}, which could not be resolved",
                            node.name, node.arch, self.nodes[dep.0].name, self.nodes[dep.0].arch
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn into_graph(self) -> InstallationGraph {
        let surviving: AHashSet<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.marked_for_removal)
            .map(|(i, _)| NodeId(i))
            .collect();
        let identities: Vec<(String, Architecture)> = self.nodes.iter().map(|n| (n.name.clone(), n.arch)).collect();

        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .filter(|(i, _)| surviving.contains(&NodeId(*i)))
            .map(|(_, n)| ResolvedNode {
                dependencies: n
                    .dependencies
                    .iter()
                    .filter(|d| surviving.contains(d))
                    .map(|d| identities[d.0].clone())
                    .collect(),
                pre_dependencies: n
                    .pre_dependencies
                    .iter()
                    .filter(|d| surviving.contains(d))
                    .map(|d| identities[d.0].clone())
                    .collect(),
                name: n.name,
                arch: n.arch,
                chosen_version: n.chosen_version,
                installed_version: n.installed_version,
                is_selected: n.is_selected,
                installed_automatically: n.installed_automatically,
            })
            .collect();

        InstallationGraph { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpm_provider::{DirectoryRepository, Provider};

    fn candidate(version: &str) -> Candidate {
        Candidate {
            version: VersionNumber::parse(version).unwrap(),
            descriptor: None,
            files: Vec::new(),
            score: scoring::score(0.0, 0.0, 0.0, 0.0),
        }
    }

    #[test]
    fn check_oscillation_aborts_after_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let mut solver = Solver::new(&provider, SolverConfig::default());
        let a = solver.get_or_create_node("a", Architecture::Amd64);

        let mut aborted = false;
        for _ in 0..OSCILLATION_ABORT_COUNT {
            if solver.check_oscillation(a, &candidate("1.0")) {
                aborted = true;
                break;
            }
        }
        assert!(aborted);
    }

    #[test]
    fn oscillation_diagnostic_lists_every_offender_sorted_by_count() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let mut solver = Solver::new(&provider, SolverConfig::default());
        let a = solver.get_or_create_node("a", Architecture::Amd64);
        let b = solver.get_or_create_node("b", Architecture::Amd64);
        let c = solver.get_or_create_node("c", Architecture::Amd64);

        let key = OscillationKey { version: VersionNumber::parse("1.0").unwrap(), alpha_bits: 0 };
        solver.oscillation_history.insert(a, vec![key.clone(); 9]);
        solver.oscillation_history.insert(b, vec![key.clone(); 12]);
        solver.oscillation_history.insert(c, vec![key; 3]);

        assert_eq!(solver.oscillation_diagnostic(), "b/amd64 x12, a/amd64 x9");
    }

    #[test]
    fn check_oscillation_warns_without_aborting_below_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Provider::new(vec![Box::new(DirectoryRepository::new(dir.path().to_path_buf()))]);
        let mut solver = Solver::new(&provider, SolverConfig::default());
        let a = solver.get_or_create_node("a", Architecture::Amd64);

        for _ in 0..(OSCILLATION_WARN_COUNT) {
            assert!(!solver.check_oscillation(a, &candidate("1.0")));
        }
    }
}
