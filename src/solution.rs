//! Route representation and manipulation.
//!
//! Routes are plain `Vec<usize>` node sequences in one of two forms:
//! closed (`n + 1` entries, first node repeated at the end) or open
//! (a permutation of `0..n` with the return edge implied). This module
//! converts between them, applies elementary moves and wraps a finished
//! closed route into a [`Solution`].

use crate::matrix::{Cost, CostMatrix};
use serde::{Deserialize, Serialize};

/// A closed route produced by one of the algorithms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// The tour as a closed sequence of node indices (first == last)
    pub tour: Vec<usize>,
    /// Total tour cost
    pub cost: Cost,
    /// Whether the tour visits every node over reachable edges
    pub feasible: bool,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations or generations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            tour: Vec::new(),
            cost: Cost::Unreachable,
            feasible: false,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Create a solution from a closed tour
    pub fn from_tour(matrix: &CostMatrix, tour: Vec<usize>, algorithm: &str) -> Self {
        let cost = matrix.route_cost(&tour);
        Solution {
            tour,
            cost,
            feasible: cost.is_finite(),
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Create a solution from an open-form permutation
    pub fn from_open_route(matrix: &CostMatrix, route: &[usize], algorithm: &str) -> Self {
        Self::from_tour(matrix, close_route(route), algorithm)
    }

    /// Recompute cost and feasibility after the tour was modified
    pub fn validate(&mut self, matrix: &CostMatrix) {
        self.cost = matrix.route_cost(&self.tour);
        self.feasible = self.cost.is_finite();
    }

    /// Check if all nodes are visited exactly once
    pub fn is_complete(&self, n: usize) -> bool {
        self.tour.len() == n + 1
            && self.tour.first() == self.tour.last()
            && is_permutation(&self.tour[..n], n)
    }

    /// The tour without its closing node
    pub fn open_tour(&self) -> Vec<usize> {
        open_route(&self.tour)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Feasible: {}", self.feasible)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Tour: {:?}", self.tour)
    }
}

/// Append the first node to an open route.
pub fn close_route(route: &[usize]) -> Vec<usize> {
    let mut closed = Vec::with_capacity(route.len() + 1);
    closed.extend_from_slice(route);
    if let Some(&first) = route.first() {
        closed.push(first);
    }
    closed
}

/// Drop the trailing repeat of a closed route.
pub fn open_route(route: &[usize]) -> Vec<usize> {
    match route {
        [] => Vec::new(),
        [rest @ .., _] => rest.to_vec(),
    }
}

/// True when `route` contains every index of `0..n` exactly once.
pub fn is_permutation(route: &[usize], n: usize) -> bool {
    if route.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &node in route {
        if node >= n || seen[node] {
            return false;
        }
        seen[node] = true;
    }
    true
}

/// Move `start` back to position 0 by swapping it with whatever sits there.
///
/// Does nothing if `start` is already first or absent from the route.
pub fn pin_start(route: &mut [usize], start: usize) {
    if route.first() == Some(&start) {
        return;
    }
    if let Some(pos) = route.iter().position(|&x| x == start) {
        route.swap(0, pos);
    }
}

/// Rotate an open route so that it begins at `start`; the cycle is unchanged.
pub fn rotate_to_start(route: &mut [usize], start: usize) {
    if let Some(pos) = route.iter().position(|&x| x == start) {
        route.rotate_left(pos);
    }
}

/// An elementary neighborhood move on an open route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Reverse the segment `[i..=j]`
    Reverse(usize, usize),
    /// Exchange positions `i` and `j`
    Swap(usize, usize),
    /// Remove the node at `from` and reinsert it at `to` (index taken before removal)
    Shift { from: usize, to: usize },
}

impl Move {
    pub fn apply(&self, route: &mut Vec<usize>) {
        match *self {
            Move::Reverse(i, j) => {
                let (lo, hi) = if i <= j { (i, j) } else { (j, i) };
                route[lo..=hi].reverse();
            }
            Move::Swap(i, j) => route.swap(i, j),
            Move::Shift { from, to } => {
                let node = route.remove(from);
                let insert_pos = if to > from { to - 1 } else { to };
                route.insert(insert_pos, node);
            }
        }
    }

    /// Apply the move to a copy of `route`.
    pub fn applied(&self, route: &[usize]) -> Vec<usize> {
        let mut next = route.to_vec();
        self.apply(&mut next);
        next
    }
}
