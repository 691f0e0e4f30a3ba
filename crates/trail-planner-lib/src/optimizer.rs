//! Route optimization as a mixed-integer linear program
//!
//! Every trail graph edge gets two binaries, one per traversal direction.
//! The model maximizes walked distance inside a length window, while keeping
//! the selection a walk: node degree at most 2, flow balanced everywhere
//! except at a single start, and edges drawn from a bounded number of
//! connected components.
//!
//! Solving uses `good_lp` with the pure-Rust `microlp` backend.

use crate::geometry;
use crate::utils::NodeKey;
use crate::{Config, Path, PlannerError, Result, TrailGraph};
use geo::LineString;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    Constraint, Expression, IntoAffineExpression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable, variable,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Binary values above this are treated as selected
const SELECTED_THRESHOLD: f64 = 0.5;

/// Parameters of one route request
#[derive(Clone, Debug, PartialEq)]
pub struct RouteQuery {
    /// Minimum total distance in kilometers
    pub min_distance: f64,
    /// Maximum total distance in kilometers
    pub max_distance: f64,
    /// Maximum number of connected components the route may use
    pub unique_starts: usize,
}

impl Default for RouteQuery {
    fn default() -> Self {
        Self::new(0.0, 30.0)
    }
}

impl RouteQuery {
    /// A query for a route between `min_distance` and `max_distance` km
    /// confined to one component
    pub fn new(min_distance: f64, max_distance: f64) -> Self {
        Self {
            min_distance,
            max_distance,
            unique_starts: 1,
        }
    }

    pub fn with_unique_starts(mut self, unique_starts: usize) -> Self {
        self.unique_starts = unique_starts;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.min_distance.is_finite() || !self.max_distance.is_finite() {
            return Err(PlannerError::ModelConstruction(format!(
                "distance bounds must be finite, got [{}, {}]",
                self.min_distance, self.max_distance
            )));
        }
        if self.min_distance < 0.0 || self.max_distance < self.min_distance {
            return Err(PlannerError::ModelConstruction(format!(
                "invalid distance window [{}, {}] km",
                self.min_distance, self.max_distance
            )));
        }
        if self.unique_starts == 0 {
            return Err(PlannerError::ModelConstruction(
                "unique_starts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One directed traversal of a path chosen by the optimizer
#[derive(Clone, Debug)]
pub struct SelectedEdge {
    pub path: Arc<Path>,
    pub from: NodeKey,
    pub to: NodeKey,
    /// Walked from the path's destination to its origin
    pub reversed: bool,
}

impl SelectedEdge {
    /// Path geometry in walking order
    pub fn geometry(&self) -> LineString<f64> {
        if self.reversed {
            geometry::reversed(self.path.geometry())
        } else {
            self.path.geometry().clone()
        }
    }

    /// Length in kilometers
    #[inline]
    pub fn distance(&self) -> f64 {
        self.path.distance()
    }
}

/// A solved route
#[derive(Clone, Debug, Default)]
pub struct RouteSolution {
    edges: Vec<SelectedEdge>,
    total_distance: f64,
    start: Option<NodeKey>,
    active_components: Vec<usize>,
}

impl RouteSolution {
    /// Selected directed edges, in graph edge order
    #[inline]
    pub fn selected_edges(&self) -> &[SelectedEdge] {
        &self.edges
    }

    /// Selected paths, one entry per traversal
    pub fn paths(&self) -> Vec<Arc<Path>> {
        self.edges.iter().map(|edge| edge.path.clone()).collect()
    }

    /// Total distance in kilometers
    #[inline]
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Node whose start variable is set, if any
    #[inline]
    pub fn start_node(&self) -> Option<NodeKey> {
        self.start
    }

    /// Components the route was allowed to draw from
    #[inline]
    pub fn active_components(&self) -> &[usize] {
        &self.active_components
    }

    /// Number of selected traversals touching each node (self loops count twice)
    pub fn node_degrees(&self) -> HashMap<NodeKey, usize> {
        let mut degrees = HashMap::new();
        for edge in &self.edges {
            *degrees.entry(edge.from).or_insert(0) += 1;
            *degrees.entry(edge.to).or_insert(0) += 1;
        }
        degrees
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// What a solve produced
#[derive(Clone, Debug)]
pub enum RouteOutcome {
    Solved(RouteSolution),
    /// No selection satisfies the constraints
    Infeasible { reason: String },
    /// The solver did not finish within the configured limit
    TimedOut { limit: Duration },
}

impl RouteOutcome {
    pub fn solution(&self) -> Option<&RouteSolution> {
        match self {
            Self::Solved(solution) => Some(solution),
            _ => None,
        }
    }

    #[inline]
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved(_))
    }

    /// Convert into a solution, turning other outcomes into errors
    pub fn into_result(self) -> Result<RouteSolution> {
        match self {
            Self::Solved(solution) => Ok(solution),
            Self::Infeasible { reason } => Err(PlannerError::InfeasibleRoute(reason)),
            Self::TimedOut { limit } => Err(PlannerError::SolverTimeout(limit)),
        }
    }
}

/// Builds and solves the route model for a trail graph
///
/// The outcome of the last query is cached: solving the same query again
/// returns it without rebuilding the model.
#[derive(Debug)]
pub struct RouteOptimizer<'g> {
    graph: &'g TrailGraph,
    time_limit: Option<Duration>,
    cache: Option<(RouteQuery, RouteOutcome)>,
    models_solved: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'g> RouteOptimizer<'g> {
    pub fn new(graph: &'g TrailGraph) -> Self {
        Self {
            graph,
            time_limit: None,
            cache: None,
            models_solved: 0,
        }
    }

    pub fn from_config(graph: &'g TrailGraph, config: &Config) -> Self {
        Self {
            time_limit: config.solver_time_limit,
            ..Self::new(graph)
        }
    }

    /// Give up on a solve after `limit` and report [`RouteOutcome::TimedOut`].
    ///
    /// The solver itself cannot be interrupted: the abandoned worker thread
    /// keeps running until the model finishes and its result is discarded.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Solve `query`, reusing the cached outcome if it was the last query.
    ///
    /// A query that fails to build or solve leaves the cached outcome intact.
    pub fn solve(&mut self, query: RouteQuery) -> Result<&RouteOutcome> {
        let reuse = self
            .cache
            .as_ref()
            .is_some_and(|(cached, _)| *cached == query);
        if reuse {
            tracing::debug!("Reusing cached route outcome");
        } else {
            let outcome = self.run(&query)?;
            self.cache = Some((query, outcome));
        }
        self.outcome()
            .ok_or_else(|| PlannerError::Solver("no cached route outcome".to_string()))
    }

    /// Outcome of the last successful solve
    pub fn outcome(&self) -> Option<&RouteOutcome> {
        self.cache.as_ref().map(|(_, outcome)| outcome)
    }

    /// Edges of the last solved route (empty if none)
    pub fn selected_edges(&self) -> &[SelectedEdge] {
        self.outcome()
            .and_then(RouteOutcome::solution)
            .map(RouteSolution::selected_edges)
            .unwrap_or_default()
    }

    /// Distance of the last solved route in kilometers (0 if none)
    pub fn total_distance(&self) -> f64 {
        self.outcome()
            .and_then(RouteOutcome::solution)
            .map_or(0.0, RouteSolution::total_distance)
    }

    pub fn start_node(&self) -> Option<NodeKey> {
        self.outcome()
            .and_then(RouteOutcome::solution)
            .and_then(RouteSolution::start_node)
    }

    /// Number of models built and handed to the solver so far
    #[inline]
    pub fn models_solved(&self) -> usize {
        self.models_solved
    }

    fn run(&mut self, query: &RouteQuery) -> Result<RouteOutcome> {
        #[cfg(feature = "profiling")]
        profiling::scope!("optimizer::run");

        query.validate()?;
        if self.graph.is_empty() {
            return Err(PlannerError::ModelConstruction(
                "trail graph has no paths".to_string(),
            ));
        }

        let available = self.graph.total_distance();
        if query.min_distance > available {
            return Ok(RouteOutcome::Infeasible {
                reason: format!(
                    "minimum distance {} km exceeds the {:.2} km of available trail",
                    query.min_distance, available
                ),
            });
        }

        let model = RouteModel::build(self.graph, query)?;
        tracing::info!(
            "Solving route model: {} edges, {} nodes, {} components, window [{}, {}] km",
            self.graph.edge_count(),
            self.graph.node_count(),
            self.graph.component_count(),
            query.min_distance,
            query.max_distance
        );
        self.models_solved += 1;
        let started = Instant::now();

        let result = match self.time_limit {
            None => model.solve(),
            Some(limit) => {
                let (sender, receiver) = mpsc::channel();
                std::thread::Builder::new()
                    .name("route-solver".to_string())
                    .spawn(move || {
                        // The receiver is gone if the caller timed out
                        let _ = sender.send(model.solve());
                    })?;
                match receiver.recv_timeout(limit) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!("Route solver exceeded its {:?} limit", limit);
                        return Ok(RouteOutcome::TimedOut { limit });
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(PlannerError::Solver(
                            "solver thread exited without a result".to_string(),
                        ));
                    }
                }
            }
        };

        match result {
            Ok(values) => {
                let solution = self.collect_solution(&values);
                tracing::info!(
                    "Route solved in {:?}: {} edges, {:.2} km",
                    started.elapsed(),
                    solution.edges.len(),
                    solution.total_distance
                );
                Ok(RouteOutcome::Solved(solution))
            }
            Err(ResolutionError::Infeasible) => Ok(RouteOutcome::Infeasible {
                reason: format!(
                    "no walk of {} to {} km within {} component(s)",
                    query.min_distance, query.max_distance, query.unique_starts
                ),
            }),
            Err(err) => Err(PlannerError::Solver(err.to_string())),
        }
    }

    fn collect_solution(&self, values: &ModelValues) -> RouteSolution {
        let key = |index| self.graph.node_key(index);
        let mut edges = Vec::new();
        for ((origin, destination, path), &(forward, reverse)) in
            self.graph.edges().zip(values.edges.iter())
        {
            let (Some(origin), Some(destination)) = (key(origin), key(destination)) else {
                continue;
            };
            if forward > SELECTED_THRESHOLD {
                edges.push(SelectedEdge {
                    path: path.clone(),
                    from: origin,
                    to: destination,
                    reversed: false,
                });
            }
            if reverse > SELECTED_THRESHOLD {
                edges.push(SelectedEdge {
                    path: path.clone(),
                    from: destination,
                    to: origin,
                    reversed: true,
                });
            }
        }

        let start = values
            .starts
            .iter()
            .position(|&value| value > SELECTED_THRESHOLD)
            .and_then(|index| self.graph.nodes().nth(index));
        let active_components = values
            .groups
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > SELECTED_THRESHOLD)
            .map(|(component, _)| component)
            .collect();
        let total_distance = edges.iter().map(SelectedEdge::distance).sum();

        RouteSolution {
            edges,
            total_distance,
            start,
            active_components,
        }
    }
}

/// Variable values read back from a solved model
#[derive(Debug)]
struct ModelValues {
    /// `(forward, reverse)` per graph edge, in edge order
    edges: Vec<(f64, f64)>,
    /// Start value per node, in node order
    starts: Vec<f64>,
    /// Active value per component
    groups: Vec<f64>,
}

/// The MILP for one query, ready to hand to a solver
struct RouteModel {
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    edge_vars: Vec<(Variable, Variable)>,
    start_vars: Vec<Variable>,
    group_vars: Vec<Variable>,
}

impl RouteModel {
    fn build(graph: &TrailGraph, query: &RouteQuery) -> Result<Self> {
        let mut vars = ProblemVariables::new();
        let mut constraints = Vec::new();
        let zero: Expression = 0.into();

        let node_count = graph.node_count();
        let start_vars: Vec<Variable> = (0..node_count)
            .map(|_| vars.add(variable().binary()))
            .collect();
        let group_vars: Vec<Variable> = (0..graph.component_count())
            .map(|_| vars.add(variable().binary()))
            .collect();

        let mut outgoing = vec![zero.clone(); node_count];
        let mut incoming = vec![zero.clone(); node_count];
        let mut degree = vec![zero.clone(); node_count];
        let mut total = zero.clone();
        let mut edge_vars = Vec::with_capacity(graph.edge_count());

        for (origin, destination, path) in graph.edges() {
            let (u, v) = (origin.index(), destination.index());
            let group = graph
                .component_of(origin)
                .and_then(|component| group_vars.get(component))
                .copied()
                .ok_or_else(|| {
                    PlannerError::ModelConstruction(format!(
                        "path {} has an endpoint outside the graph",
                        path.name()
                    ))
                })?;
            if u >= node_count || v >= node_count {
                return Err(PlannerError::ModelConstruction(format!(
                    "path {} has an endpoint outside the graph",
                    path.name()
                )));
            }

            let forward = vars.add(variable().binary());
            let reverse = vars.add(variable().binary());
            let length = path.distance();

            // One direction at most
            constraints.push((forward.into_expression() + reverse).leq(1));
            // Only inside an active component
            constraints.push((group.into_expression() - forward).geq(0));
            constraints.push((group.into_expression() - reverse).geq(0));

            total += forward * length;
            total += reverse * length;

            outgoing[u] += forward;
            incoming[v] += forward;
            outgoing[v] += reverse;
            incoming[u] += reverse;
            degree[u] += forward.into_expression() + reverse;
            degree[v] += forward.into_expression() + reverse;

            edge_vars.push((forward, reverse));
        }

        for (((out, inc), deg), &start) in outgoing
            .into_iter()
            .zip(incoming)
            .zip(degree)
            .zip(start_vars.iter())
        {
            let balance = out - inc + start;
            constraints.push(balance.clone().geq(0));
            constraints.push(balance.leq(1));
            constraints.push(deg.leq(2));
        }

        let mut starts = zero.clone();
        for &start in &start_vars {
            starts += start;
        }
        constraints.push(starts.leq(1));

        let mut groups = zero;
        for &group in &group_vars {
            groups += group;
        }
        constraints.push(groups.leq(query.unique_starts as f64));

        constraints.push(total.clone().geq(query.min_distance));
        constraints.push(total.clone().leq(query.max_distance));

        Ok(Self {
            vars,
            objective: total,
            constraints,
            edge_vars,
            start_vars,
            group_vars,
        })
    }

    fn solve(self) -> std::result::Result<ModelValues, ResolutionError> {
        let mut model = self.vars.maximise(self.objective).using(microlp);
        for constraint in self.constraints {
            model.add_constraint(constraint);
        }
        let solution = model.solve()?;

        Ok(ModelValues {
            edges: self
                .edge_vars
                .iter()
                .map(|&(forward, reverse)| (solution.value(forward), solution.value(reverse)))
                .collect(),
            starts: self.start_vars.iter().map(|&v| solution.value(v)).collect(),
            groups: self.group_vars.iter().map(|&v| solution.value(v)).collect(),
        })
    }
}
