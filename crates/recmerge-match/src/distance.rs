//! Fuzzy entity matching through a numeric distance function.
//!
//! [`DistanceComparator`] considers two elements the same entity when a
//! supplied distance between them is at or under a threshold. Its match
//! table is built globally rather than pairwise: normalization functions
//! first bucket the lists into unambiguous hint groups, then the
//! remaining elements are matched by minimal-cost bipartite assignment,
//! restricted to connected components of the under-threshold graph.
//!
//! Assignment pairs tied at the same minimal distance are all reported,
//! so downstream ambiguity detection can turn them into manual-merge
//! conflicts instead of silently picking one.

use std::collections::HashMap;
use std::sync::Arc;

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;
use serde_json::Value;
use tracing::debug;

use crate::comparator::{Comparator, MatchTable, NormalizeFn};

/// Distances closer than this count as a tie.
const TIE_EPSILON: f64 = 1e-9;

/// Fixed-point scale applied to distances before integer assignment.
const COST_SCALE: f64 = 1e6;

/// Numeric distance between two values.
pub type DistanceFn = Arc<dyn Fn(&Value, &Value) -> f64 + Send + Sync>;

/// Minimal-cost bipartite assignment over a cost matrix.
pub trait AssignmentSolver: Send + Sync {
    /// Returns `(row, column)` pairs assigning each row (or each column,
    /// whichever side is smaller) exactly once with minimal total cost.
    fn assign(&self, costs: &[Vec<f64>]) -> Vec<(usize, usize)>;
}

/// Default solver backed by the Kuhn-Munkres (Hungarian) algorithm.
#[derive(Clone, Copy, Debug, Default)]
pub struct KuhnMunkresSolver;

impl AssignmentSolver for KuhnMunkresSolver {
    fn assign(&self, costs: &[Vec<f64>]) -> Vec<(usize, usize)> {
        let rows = costs.len();
        let cols = costs.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Vec::new();
        }
        let scale = |v: f64| (v * COST_SCALE).round() as i64;

        // kuhn_munkres_min requires at most as many rows as columns.
        let transposed = rows > cols;
        let matrix = if transposed {
            Matrix::from_rows(
                (0..cols).map(|j| costs.iter().map(|row| scale(row[j])).collect::<Vec<_>>()),
            )
        } else {
            Matrix::from_rows(
                costs
                    .iter()
                    .map(|row| row.iter().copied().map(scale).collect::<Vec<_>>()),
            )
        };
        let Ok(matrix) = matrix else {
            return Vec::new();
        };

        let (_, assignment) = kuhn_munkres_min(&matrix);
        assignment
            .into_iter()
            .enumerate()
            .map(|(r, c)| if transposed { (c, r) } else { (r, c) })
            .collect()
    }
}

/// Comparator matching entities whose distance is under a threshold.
#[derive(Clone)]
pub struct DistanceComparator {
    distance: DistanceFn,
    threshold: f64,
    norm_functions: Vec<NormalizeFn>,
    solver: Arc<dyn AssignmentSolver>,
}

impl DistanceComparator {
    /// Comparator over `distance` with the given acceptance `threshold`.
    pub fn new(
        threshold: f64,
        distance: impl Fn(&Value, &Value) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            distance: Arc::new(distance),
            threshold,
            norm_functions: Vec::new(),
            solver: Arc::new(KuhnMunkresSolver),
        }
    }

    /// Append a bucketing normalization applied before global assignment.
    ///
    /// Normalizations run in the order they were added; elements matched
    /// by an earlier one are excluded from later phases.
    pub fn with_norm_function(
        mut self,
        normalize: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.norm_functions.push(Arc::new(normalize));
        self
    }

    /// Replace the default assignment solver.
    pub fn with_solver(mut self, solver: impl AssignmentSolver + 'static) -> Self {
        self.solver = Arc::new(solver);
        self
    }

    fn dist(&self, a: &Value, b: &Value) -> f64 {
        (self.distance)(a, b)
    }

    /// Match remaining elements whose normalized values form unambiguous
    /// buckets. A bucket pair is unambiguous when both sides have the
    /// same size and at least one side is all-identical.
    fn match_by_norm(
        &self,
        l1: &[Value],
        l2: &[Value],
        normalize: &NormalizeFn,
        rem1: &mut Vec<usize>,
        rem2: &mut Vec<usize>,
        table: &mut MatchTable,
    ) {
        let mut buckets1: Vec<(Value, Vec<usize>)> = Vec::new();
        for &i in rem1.iter() {
            let key = normalize(&l1[i]);
            match buckets1.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(i),
                None => buckets1.push((key, vec![i])),
            }
        }
        let mut buckets2: HashMap<Value, Vec<usize>> = HashMap::new();
        for &j in rem2.iter() {
            buckets2.entry(normalize(&l2[j])).or_default().push(j);
        }

        let mut matched1 = Vec::new();
        let mut matched2 = Vec::new();
        for (key, members1) in &buckets1 {
            let Some(members2) = buckets2.get(key) else {
                continue;
            };
            let ambiguous = !(members1.len() == members2.len()
                && (members2.iter().all(|&j| l2[j] == l2[members2[0]])
                    || members1.iter().all(|&i| l1[i] == l1[members1[0]])));
            if ambiguous {
                continue;
            }
            for (&i, &j) in members1.iter().zip(members2) {
                if self.dist(&l1[i], &l2[j]) > self.threshold {
                    continue;
                }
                table.add(i, j);
                matched1.push(i);
                matched2.push(j);
            }
        }
        rem1.retain(|i| !matched1.contains(i));
        rem2.retain(|j| !matched2.contains(j));
    }

    /// Assign the remaining elements per connected component of the
    /// under-threshold graph, reporting all minimal-distance ties.
    fn match_by_assignment(
        &self,
        l1: &[Value],
        l2: &[Value],
        rem1: &[usize],
        rem2: &[usize],
        table: &mut MatchTable,
    ) {
        let costs: Vec<Vec<f64>> = rem1
            .iter()
            .map(|&i| rem2.iter().map(|&j| self.dist(&l1[i], &l2[j])).collect())
            .collect();

        for (rows, cols) in connected_components(&costs, self.threshold) {
            let part: Vec<Vec<f64>> = rows
                .iter()
                .map(|&r| cols.iter().map(|&c| costs[r][c]).collect())
                .collect();
            for (r, c) in self.solver.assign(&part) {
                let accepted = part[r][c];
                if accepted > self.threshold {
                    continue;
                }
                // Everything tied with the accepted pair is a match too.
                for (other_c, &cost) in part[r].iter().enumerate() {
                    if (accepted - cost).abs() < TIE_EPSILON {
                        table.add(rem1[rows[r]], rem2[cols[other_c]]);
                    }
                }
                for (other_r, row) in part.iter().enumerate() {
                    if (accepted - row[c]).abs() < TIE_EPSILON {
                        table.add(rem1[rows[other_r]], rem2[cols[c]]);
                    }
                }
            }
        }
    }
}

impl Comparator for DistanceComparator {
    fn equal(&self, a: &Value, b: &Value) -> bool {
        self.dist(a, b) <= self.threshold
    }

    fn match_table(&self, l1: &[Value], l2: &[Value]) -> MatchTable {
        let mut table = MatchTable::new(l1.len(), l2.len());
        let mut rem1: Vec<usize> = (0..l1.len()).collect();
        let mut rem2: Vec<usize> = (0..l2.len()).collect();

        for normalize in &self.norm_functions {
            self.match_by_norm(l1, l2, normalize, &mut rem1, &mut rem2, &mut table);
        }
        debug!(
            remaining_l1 = rem1.len(),
            remaining_l2 = rem2.len(),
            "bucketing done, running global assignment"
        );
        self.match_by_assignment(l1, l2, &rem1, &rem2, &mut table);
        table
    }
}

/// Connected components of the bipartite graph whose edges join rows and
/// columns with cost at or under `threshold`. Returns (row, column) index
/// groups; isolated vertices are omitted.
fn connected_components(costs: &[Vec<f64>], threshold: f64) -> Vec<(Vec<usize>, Vec<usize>)> {
    let rows = costs.len();
    let cols = costs.first().map_or(0, Vec::len);
    let mut find = UnionFind::new(rows + cols);
    for (r, row) in costs.iter().enumerate() {
        for (c, &cost) in row.iter().enumerate() {
            if cost <= threshold {
                find.union(r, rows + c);
            }
        }
    }

    let mut components: HashMap<usize, (Vec<usize>, Vec<usize>)> = HashMap::new();
    for (r, row) in costs.iter().enumerate() {
        if row.iter().any(|&cost| cost <= threshold) {
            components.entry(find.root(r)).or_default().0.push(r);
        }
    }
    for c in 0..cols {
        if costs.iter().any(|row| row[c] <= threshold) {
            components.entry(find.root(rows + c)).or_default().1.push(c);
        }
    }
    let mut out: Vec<_> = components.into_values().collect();
    out.sort();
    out
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn root(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.root(a);
        let rb = self.root(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}
