use std::collections::{BTreeMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use repoforge_protocol::{BuildClass, JobKey};

/// The slice of a queued job's data the scheduler needs to decide
/// dispatchability. Cheap to build fresh every `AssignJobs` cycle from the
/// coordinator's live `Q`.
#[derive(Debug, Clone)]
pub struct GraphJob {
    pub key: JobKey,
    pub pkgnames: Vec<String>,
    pub dependencies: Vec<String>,
    pub build_class: BuildClass,
    pub assigned: bool,
}

/// A dependency graph over the current queue, built fresh every scheduling
/// cycle. Nodes are jobs (including already-running ones, since they may
/// satisfy others' dependencies); edges point from a job to the jobs it
/// depends on. The graph may contain cycles — `possible_jobs` tolerates
/// them rather than requiring a topological order.
pub struct JobGraph {
    graph: DiGraph<JobKey, ()>,
    index_of: BTreeMap<JobKey, NodeIndex>,
    jobs: BTreeMap<JobKey, GraphJob>,
    order: Vec<JobKey>,
}

impl JobGraph {
    pub fn build(mut jobs: Vec<GraphJob>) -> Self {
        jobs.sort_by(|a, b| a.key.cmp(&b.key));

        let mut graph = DiGraph::new();
        let mut index_of = BTreeMap::new();
        let mut order = Vec::with_capacity(jobs.len());

        for job in &jobs {
            let idx = graph.add_node(job.key.clone());
            index_of.insert(job.key.clone(), idx);
            order.push(job.key.clone());
        }

        let mut pkgname_to_key: BTreeMap<&str, &JobKey> = BTreeMap::new();
        for job in &jobs {
            for name in &job.pkgnames {
                pkgname_to_key.insert(name.as_str(), &job.key);
            }
        }

        for job in &jobs {
            let from = index_of[&job.key];
            for dep in &job.dependencies {
                if let Some(dep_key) = pkgname_to_key.get(dep.as_str()) {
                    if let Some(&to) = index_of.get(*dep_key) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        let by_key = jobs.into_iter().map(|j| (j.key.clone(), j)).collect();

        Self {
            graph,
            index_of,
            jobs: by_key,
            order,
        }
    }

    /// Ordered list of job keys a node with `node_class`/`node_pure_name` may
    /// dispatch right now. Implements the `PossibleJobs` walk: a single pass
    /// over the queue's stable order,
    /// tracking which jobs have become unresolvable because something they
    /// (transitively) depend on is already assigned or was just claimed by
    /// an earlier, equally-eligible job in this same pass.
    pub fn possible_jobs(&self, node_class: u8, node_pure_name: &str) -> Vec<JobKey> {
        let mut unresolvable: HashSet<NodeIndex> = HashSet::new();
        let mut result = Vec::new();

        for key in &self.order {
            let idx = self.index_of[key];
            let job = &self.jobs[key];

            if job.assigned {
                self.mark_dependants_unresolvable(idx, &mut unresolvable);
                continue;
            }
            if unresolvable.contains(&idx) {
                continue;
            }
            if job.build_class.runnable_on(node_class, node_pure_name) {
                result.push(key.clone());
                self.mark_dependants_unresolvable(idx, &mut unresolvable);
            }
        }

        result
    }

    /// Every node with a (possibly indirect) edge into `idx` — i.e. every
    /// job that depends on the job at `idx`, directly or transitively.
    fn mark_dependants_unresolvable(&self, idx: NodeIndex, unresolvable: &mut HashSet<NodeIndex>) {
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, idx);
        while let Some(next) = bfs.next(reversed) {
            if next != idx {
                unresolvable.insert(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pkgbase: &str) -> JobKey {
        JobKey {
            target_repo: "chaotic-aur".to_string(),
            arch: "x86_64".to_string(),
            pkgbase: repoforge_protocol::PkgBase::try_from(pkgbase.to_string()).unwrap(),
        }
    }

    fn job(pkgbase: &str, pkgnames: &[&str], deps: &[&str], class: BuildClass, assigned: bool) -> GraphJob {
        GraphJob {
            key: key(pkgbase),
            pkgnames: pkgnames.iter().map(|s| s.to_string()).collect(),
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
            build_class: class,
            assigned,
        }
    }

    #[test]
    fn unassigned_small_job_is_immediately_possible() {
        let graph = JobGraph::build(vec![job("pkg-a", &["pkg-a"], &[], BuildClass::small(), false)]);
        assert_eq!(graph.possible_jobs(0, "node-a"), vec![key("pkg-a")]);
    }

    #[test]
    fn dependant_of_assigned_job_is_unresolvable() {
        let graph = JobGraph::build(vec![
            job("pkg-a", &["pkg-a"], &["pkg-b"], BuildClass::small(), false),
            job("pkg-b", &["pkg-b"], &[], BuildClass::small(), true),
        ]);
        // pkg-b is already building; pkg-a depends on it and must not be
        // offered until pkg-b's build settles.
        assert_eq!(graph.possible_jobs(0, "node-a"), Vec::<JobKey>::new());
    }

    #[test]
    fn cyclic_dependencies_do_not_abort_traversal() {
        let graph = JobGraph::build(vec![
            job("pkg-a", &["pkg-a"], &["pkg-b"], BuildClass::small(), false),
            job("pkg-b", &["pkg-b"], &["pkg-a"], BuildClass::small(), false),
        ]);
        // Neither is assigned, so the first resolvable one (by stable
        // order) is returned and the other becomes unresolvable as its
        // transitive dependant.
        assert_eq!(graph.possible_jobs(0, "node-a"), vec![key("pkg-a")]);
    }

    #[test]
    fn numeric_class_filters_by_node_strength() {
        let graph = JobGraph::build(vec![job("pkg-a", &["pkg-a"], &[], BuildClass::heavy(), false)]);
        assert!(graph.possible_jobs(0, "small-node").is_empty());
        assert_eq!(graph.possible_jobs(2, "heavy-node"), vec![key("pkg-a")]);
    }

    #[test]
    fn sticky_class_only_matches_exact_node_name() {
        let graph = JobGraph::build(vec![job(
            "pkg-a",
            &["pkg-a"],
            &[],
            BuildClass::Sticky("builder7".to_string()),
            false,
        )]);
        assert!(graph.possible_jobs(2, "builder8").is_empty());
        assert_eq!(graph.possible_jobs(2, "builder7"), vec![key("pkg-a")]);
    }

    #[test]
    fn unknown_dependency_is_silently_skipped() {
        let graph = JobGraph::build(vec![job(
            "pkg-a",
            &["pkg-a"],
            &["does-not-exist"],
            BuildClass::small(),
            false,
        )]);
        assert_eq!(graph.possible_jobs(0, "node-a"), vec![key("pkg-a")]);
    }
}
