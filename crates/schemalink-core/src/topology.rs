//! Embedding recursion check, heights and emission order.
//!
//! Edges run from a struct to every struct it embeds through a struct-typed
//! field. Heights are only meaningful once [`check_recursion`] reports
//! nothing.

use serde::Serialize;

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{Config, StructId};

/// Reject every struct field whose embedding chain leads back to its owner.
pub(crate) fn check_recursion(config: &Config) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    for id in config.struct_ids() {
        for (field, target) in config.embeds(id) {
            if reaches(config, target, id) {
                diagnostics.push_error(
                    Channel::Recursion,
                    &config.field(field).pos,
                    "recursive reference",
                );
            }
        }
    }

    tracing::debug!(event = "recursion_checked", errors = diagnostics.error_count());
    diagnostics
}

/// Whether `goal` is `from` or embedded by it, directly or transitively.
fn reaches(config: &Config, from: StructId, goal: StructId) -> bool {
    let mut visited = vec![false; config.struct_count()];
    let mut stack = vec![from];

    while let Some(current) = stack.pop() {
        if current == goal {
            return true;
        }
        if std::mem::replace(&mut visited[current.index()], true) {
            continue;
        }
        stack.extend(config.embeds(current).map(|(_, target)| target));
    }

    false
}

/// Summary of the embedding graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Heights and emission order of every struct.
///
/// `height` is 0 for a struct that embeds nothing and one more than its
/// tallest embedded struct otherwise. `generation` is the traversal that
/// first reached the struct; a struct shared by several embedders is walked
/// once. `order` lists leaves first, ties broken by declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub summary: TopologySummary,
    pub heights: Vec<usize>,
    pub generations: Vec<usize>,
    pub order: Vec<StructId>,
}

impl Topology {
    pub fn height(&self, id: StructId) -> usize {
        self.heights[id.index()]
    }

    pub fn generation(&self, id: StructId) -> usize {
        self.generations[id.index()]
    }

    /// Position of a struct in the emission order.
    pub fn rank(&self, id: StructId) -> Option<usize> {
        self.order.iter().position(|other| *other == id)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

struct Walk<'a> {
    config: &'a Config,
    marks: Vec<Mark>,
    heights: Vec<usize>,
    generations: Vec<usize>,
}

impl Walk<'_> {
    fn visit(&mut self, id: StructId, generation: usize) -> usize {
        match self.marks[id.index()] {
            Mark::Done => return self.heights[id.index()],
            // Cycles are reported by the recursion check; contribute nothing.
            Mark::Active => return 0,
            Mark::Unvisited => {}
        }

        self.marks[id.index()] = Mark::Active;
        self.generations[id.index()] = generation;

        let targets: Vec<StructId> = self.config.embeds(id).map(|(_, target)| target).collect();
        let height = targets
            .into_iter()
            .map(|target| self.visit(target, generation) + 1)
            .max()
            .unwrap_or(0);

        self.heights[id.index()] = height;
        self.marks[id.index()] = Mark::Done;
        height
    }
}

/// Compute heights, traversal generations and the emission order.
pub fn compute_topology(config: &Config) -> Topology {
    let count = config.struct_count();
    let mut walk = Walk {
        config,
        marks: vec![Mark::Unvisited; count],
        heights: vec![0; count],
        generations: vec![0; count],
    };

    let mut generation = 0;
    for id in config.struct_ids() {
        if walk.marks[id.index()] != Mark::Unvisited {
            continue;
        }
        generation += 1;
        walk.visit(id, generation);
    }

    let mut order: Vec<StructId> = config.struct_ids().collect();
    order.sort_by_key(|id| (walk.heights[id.index()], id.index()));

    let edges = config
        .struct_ids()
        .map(|id| config.embeds(id).count())
        .sum();

    Topology {
        summary: TopologySummary {
            nodes: count,
            edges,
        },
        heights: walk.heights,
        generations: walk.generations,
        order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Pos;
    use crate::model::{Action, FieldId, FieldType, Reference, Symbol};

    /// Config with one rowid per struct; `embed` wires struct fields by hand.
    struct Graph {
        config: Config,
        rowids: Vec<FieldId>,
    }

    impl Graph {
        fn new(names: &[&str]) -> Self {
            let mut config = Config::new();
            let mut rowids = Vec::new();
            for (line, name) in names.iter().enumerate() {
                let id = config.add_struct(*name, Pos::new("graph.json", line + 1, 1));
                let rowid = config.add_field(id, "id", Pos::file("graph.json"), FieldType::Int);
                config.field_mut(rowid).flags.rowid = true;
                rowids.push(rowid);
            }
            Self { config, rowids }
        }

        fn embed(&mut self, from: usize, to: usize, line: usize) -> FieldId {
            let owner = StructId(from);
            let pos = Pos::new("graph.json", line, 1);
            let source = self.config.add_field(owner, format!("fk{line}"), pos.clone(), FieldType::Int);
            let reference = Reference {
                source,
                target: self.rowids[to],
                on_update: Action::None,
                on_delete: Action::None,
            };
            self.config.field_mut(source).reference = Some(reference);
            let field = self.config.add_field(
                owner,
                format!("s{line}"),
                pos.clone(),
                FieldType::Struct(Symbol::new(format!("fk{line}"), pos)),
            );
            self.config.field_mut(field).reference = Some(reference);
            field
        }
    }

    #[test]
    fn two_cycle_is_recursive_on_both_sides() {
        let mut graph = Graph::new(&["a", "b"]);
        graph.embed(0, 1, 10);
        graph.embed(1, 0, 20);

        let diagnostics = check_recursion(&graph.config);
        let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "graph.json:10:1: error: recursive reference",
                "graph.json:20:1: error: recursive reference",
            ]
        );
    }

    #[test]
    fn self_embedding_is_recursive() {
        let mut graph = Graph::new(&["node"]);
        graph.embed(0, 0, 5);
        assert_eq!(check_recursion(&graph.config).errors_in(Channel::Recursion), 1);
    }

    #[test]
    fn cycle_elsewhere_does_not_flag_the_entry_field() {
        let mut graph = Graph::new(&["a", "b", "c"]);
        graph.embed(0, 1, 10);
        graph.embed(1, 2, 20);
        graph.embed(2, 1, 30);

        let diagnostics = check_recursion(&graph.config);
        let lines: Vec<usize> = diagnostics
            .iter()
            .filter_map(|diag| diag.pos.as_ref().map(|pos| pos.line))
            .collect();
        assert_eq!(lines, vec![20, 30]);
    }

    #[test]
    fn embedder_is_taller_and_emitted_later() {
        let mut graph = Graph::new(&["post", "user"]);
        graph.embed(0, 1, 10);
        assert!(check_recursion(&graph.config).is_empty());

        let topology = compute_topology(&graph.config);
        let (post, user) = (StructId(0), StructId(1));
        assert!(topology.height(post) > topology.height(user));
        assert_eq!(topology.order, vec![user, post]);
        assert_eq!(topology.summary, TopologySummary { nodes: 2, edges: 1 });
    }

    #[test]
    fn diamond_is_walked_once_per_generation() {
        let mut graph = Graph::new(&["x", "y", "z", "w"]);
        graph.embed(0, 1, 10);
        graph.embed(0, 2, 11);
        graph.embed(1, 3, 12);
        graph.embed(2, 3, 13);

        let topology = compute_topology(&graph.config);
        let [x, y, z, w] = [0, 1, 2, 3].map(StructId);
        assert_eq!(topology.height(w), 0);
        assert_eq!(topology.height(y), 1);
        assert_eq!(topology.height(z), 1);
        assert_eq!(topology.height(x), 2);
        assert!([x, y, z, w].iter().all(|id| topology.generation(*id) == 1));
        assert_eq!(topology.order, vec![w, y, z, x]);
    }

    #[test]
    fn shared_leaf_keeps_its_first_generation() {
        let mut graph = Graph::new(&["leaf", "left", "right"]);
        graph.embed(1, 0, 10);
        graph.embed(2, 0, 11);

        let topology = compute_topology(&graph.config);
        let [leaf, left, right] = [0, 1, 2].map(StructId);
        assert_eq!(topology.generation(leaf), 1);
        assert_eq!(topology.generation(left), 2);
        assert_eq!(topology.generation(right), 3);
        assert_eq!(topology.height(leaf), 0);
        assert_eq!(topology.rank(leaf), Some(0));
    }

    #[test]
    fn strictness_holds_for_mixed_depth_edges() {
        // r embeds a and b directly, a also embeds b
        let mut graph = Graph::new(&["r", "a", "b"]);
        graph.embed(0, 2, 10);
        graph.embed(0, 1, 11);
        graph.embed(1, 2, 12);

        let topology = compute_topology(&graph.config);
        for id in graph.config.struct_ids() {
            for (_, target) in graph.config.embeds(id) {
                assert!(topology.height(id) > topology.height(target));
                assert!(topology.rank(target) < topology.rank(id));
            }
        }
    }
}
