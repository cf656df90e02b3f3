//! Stage graph construction
//!
//! Stages are added by name, edges declare "must finish before", and the
//! built graph exposes its execution levels: every stage sits one level
//! below its deepest predecessor, so each level boundary is a join
//! barrier.

use crate::error::GraphError;
use crate::stage::Stage;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::Arc;

/// Validated, acyclic stage graph
pub struct StageGraph {
    stages: Vec<Arc<dyn Stage>>,
    graph: DiGraphMap<usize, ()>,
    levels: Vec<Vec<usize>>,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field("stages", &self.stage_names())
            .field("levels", &self.levels)
            .finish()
    }
}

impl StageGraph {
    /// Start building a graph
    #[inline]
    #[must_use]
    pub fn builder() -> StageGraphBuilder {
        StageGraphBuilder::default()
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if empty (never true for a built graph)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in declaration order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Stages grouped by execution level, declaration order within a level
    pub fn levels(&self) -> impl Iterator<Item = Vec<&Arc<dyn Stage>>> + '_ {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| &self.stages[i]).collect())
    }

    /// Number of levels
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Direct predecessors of a stage
    #[must_use]
    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        let Some(index) = self.index_of(name) else {
            return Vec::new();
        };
        let mut preds: Vec<usize> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .collect();
        preds.sort_unstable();
        preds.into_iter().map(|i| self.stages[i].name()).collect()
    }

    /// Level a stage runs at
    #[must_use]
    pub fn level_of(&self, name: &str) -> Option<usize> {
        let index = self.index_of(name)?;
        self.levels.iter().position(|level| level.contains(&index))
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name() == name)
    }
}

/// Builder for [`StageGraph`]
#[derive(Default)]
pub struct StageGraphBuilder {
    stages: Vec<Arc<dyn Stage>>,
    edges: Vec<(String, String)>,
}

impl StageGraphBuilder {
    /// Add a stage
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Declare that `from` must complete before `to` starts
    #[must_use]
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Declare several predecessors of one stage
    #[must_use]
    pub fn after<I, S>(mut self, to: &str, predecessors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for from in predecessors {
            self.edges.push((from.into(), to.to_string()));
        }
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// Returns [`GraphError`] for empty graphs, duplicate names, unknown
    /// stages in edges, self loops, or cycles.
    pub fn build(self) -> Result<StageGraph, GraphError> {
        if self.stages.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut graph = DiGraphMap::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if index.insert(stage.name().to_string(), i).is_some() {
                return Err(GraphError::DuplicateStage(stage.name().to_string()));
            }
            graph.add_node(i);
        }

        for (from, to) in &self.edges {
            let a = *index
                .get(from)
                .ok_or_else(|| GraphError::UnknownStage(from.clone()))?;
            let b = *index
                .get(to)
                .ok_or_else(|| GraphError::UnknownStage(to.clone()))?;
            if a == b {
                return Err(GraphError::SelfLoop(from.clone()));
            }
            graph.add_edge(a, b, ());
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            GraphError::CycleDetected(self.stages[cycle.node_id()].name().to_string())
        })?;

        let mut depth = vec![0usize; self.stages.len()];
        for &node in &order {
            depth[node] = graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|pred| depth[pred] + 1)
                .max()
                .unwrap_or(0);
        }

        let max_depth = depth.iter().copied().max().unwrap_or(0);
        let levels = (0..=max_depth)
            .map(|level| (0..self.stages.len()).filter(|&i| depth[i] == level).collect())
            .collect();

        Ok(StageGraph {
            stages: self.stages,
            graph,
            levels,
        })
    }
}
