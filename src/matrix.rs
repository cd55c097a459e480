//! Cost model for explicit-matrix TSP instances.
//!
//! A [`CostMatrix`] holds one [`Cost`] per ordered pair of nodes. Pairs that
//! cannot be traversed are stored as [`Cost::Unreachable`], and any route that
//! uses such a pair (or that is too short to visit every node) costs
//! `Unreachable` as a whole.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

use crate::error::{Error, Result};

/// Traversal cost of an edge or a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cost {
    /// A non-negative finite cost
    Finite(f64),
    /// No usable path; absorbs every addition
    Unreachable,
}

impl Cost {
    pub const ZERO: Cost = Cost::Finite(0.0);

    /// Map a raw float onto a cost, treating infinity as unreachable.
    pub fn from_f64(value: f64) -> Self {
        if value.is_infinite() {
            Cost::Unreachable
        } else {
            Cost::Finite(value)
        }
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        matches!(self, Cost::Finite(_))
    }

    #[inline]
    pub fn value(self) -> Option<f64> {
        match self {
            Cost::Finite(c) => Some(c),
            Cost::Unreachable => None,
        }
    }

    /// Float view of the cost, `f64::INFINITY` when unreachable.
    #[inline]
    pub fn as_f64(self) -> f64 {
        self.value().unwrap_or(f64::INFINITY)
    }
}

impl Default for Cost {
    fn default() -> Self {
        Cost::ZERO
    }
}

impl Add for Cost {
    type Output = Cost;

    #[inline]
    fn add(self, rhs: Cost) -> Cost {
        match (self, rhs) {
            (Cost::Finite(a), Cost::Finite(b)) => Cost::Finite(a + b),
            _ => Cost::Unreachable,
        }
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Cost::Finite(a), Cost::Finite(b)) => a.partial_cmp(b),
            (Cost::Finite(_), Cost::Unreachable) => Some(Ordering::Less),
            (Cost::Unreachable, Cost::Finite(_)) => Some(Ordering::Greater),
            (Cost::Unreachable, Cost::Unreachable) => Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Finite(c) => fmt::Display::fmt(c, f),
            Cost::Unreachable => fmt::Display::fmt(&f64::INFINITY, f),
        }
    }
}

/// Square matrix of pairwise traversal costs, indexed `0..n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostMatrix {
    costs: Vec<Vec<Cost>>,
}

impl CostMatrix {
    /// Build a matrix, rejecting non-square input and negative or NaN costs.
    pub fn new(costs: Vec<Vec<Cost>>) -> Result<Self> {
        let n = costs.len();
        for (i, row) in costs.iter().enumerate() {
            if row.len() != n {
                return Err(Error::invalid_matrix(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, cost) in row.iter().enumerate() {
                if let Cost::Finite(c) = *cost {
                    if c.is_nan() || c < 0.0 {
                        return Err(Error::invalid_matrix(format!(
                            "entry ({}, {}) = {} is not a non-negative cost",
                            i, j, c
                        )));
                    }
                }
            }
        }
        Ok(CostMatrix { costs })
    }

    /// Wrap costs already known to be square and non-negative.
    pub(crate) fn from_validated(costs: Vec<Vec<Cost>>) -> Self {
        CostMatrix { costs }
    }

    /// Build a matrix from raw floats; `f64::INFINITY` marks an unreachable pair.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let costs = rows
            .into_iter()
            .map(|row| row.into_iter().map(Cost::from_f64).collect())
            .collect();
        Self::new(costs)
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Cost of travelling from `i` to `j`
    #[inline]
    pub fn cost(&self, i: usize, j: usize) -> Cost {
        self.costs[i][j]
    }

    pub fn rows(&self) -> &[Vec<Cost>] {
        &self.costs
    }

    /// Cost of a closed route (see [`route_cost`]).
    pub fn route_cost(&self, route: &[usize]) -> Cost {
        route_cost(route, self)
    }

    /// Cost of an open route, closed back to its first node.
    pub fn open_route_cost(&self, route: &[usize]) -> Cost {
        open_route_cost(route, self)
    }

    /// Summary of the matrix contents
    pub fn statistics(&self) -> MatrixStatistics {
        let n = self.len();
        let mut finite: Vec<f64> = Vec::new();
        let mut unreachable_pairs = 0;
        let mut symmetric = true;

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                match self.cost(i, j) {
                    Cost::Finite(c) => finite.push(c),
                    Cost::Unreachable => unreachable_pairs += 1,
                }
                if j > i && self.cost(i, j) != self.cost(j, i) {
                    symmetric = false;
                }
            }
        }

        let avg_cost = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        let min_cost = finite.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_cost = finite.iter().cloned().fold(0.0, f64::max);

        MatrixStatistics {
            dimension: n,
            unreachable_pairs,
            symmetric,
            min_cost: if finite.is_empty() { 0.0 } else { min_cost },
            max_cost,
            avg_cost,
        }
    }
}

/// Total cost of a closed route (`len == n + 1`, first node repeated last).
///
/// Routes shorter than `n + 1` are incomplete and cost [`Cost::Unreachable`];
/// so does any route crossing an unreachable pair.
pub fn route_cost(route: &[usize], matrix: &CostMatrix) -> Cost {
    if route.len() < matrix.len() + 1 {
        return Cost::Unreachable;
    }

    let mut total = 0.0;
    for pair in route.windows(2) {
        match matrix.cost(pair[0], pair[1]) {
            Cost::Finite(c) => total += c,
            Cost::Unreachable => return Cost::Unreachable,
        }
    }
    Cost::Finite(total)
}

/// Cost of an open-form route including the implied return edge.
pub fn open_route_cost(route: &[usize], matrix: &CostMatrix) -> Cost {
    if route.is_empty() {
        return route_cost(route, matrix);
    }
    let closed: Vec<usize> = route.iter().chain(std::iter::once(&route[0])).copied().collect();
    route_cost(&closed, matrix)
}

/// Statistics about a cost matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixStatistics {
    pub dimension: usize,
    pub unreachable_pairs: usize,
    pub symmetric: bool,
    pub min_cost: f64,
    pub max_cost: f64,
    pub avg_cost: f64,
}

impl fmt::Display for MatrixStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix: {} x {}", self.dimension, self.dimension)?;
        writeln!(f, "  Unreachable pairs: {}", self.unreachable_pairs)?;
        writeln!(f, "  Symmetric: {}", self.symmetric)?;
        writeln!(f, "  Min cost: {:.2}", self.min_cost)?;
        writeln!(f, "  Max cost: {:.2}", self.max_cost)?;
        writeln!(f, "  Avg cost: {:.2}", self.avg_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_matrix() -> CostMatrix {
        CostMatrix::from_rows(vec![
            vec![0.0, 1.0, 9.0, 9.0],
            vec![1.0, 0.0, 1.0, 9.0],
            vec![9.0, 1.0, 0.0, 1.0],
            vec![9.0, 9.0, 1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_closed_route_cost() {
        let matrix = chain_matrix();
        assert_eq!(route_cost(&[0, 1, 2, 3, 0], &matrix), Cost::Finite(12.0));
        assert_eq!(matrix.route_cost(&[0, 2, 1, 3, 0]), Cost::Finite(28.0));
    }

    #[test]
    fn test_short_route_is_unreachable() {
        let matrix = chain_matrix();
        assert_eq!(route_cost(&[0, 1, 2, 0], &matrix), Cost::Unreachable);
        assert_eq!(route_cost(&[], &matrix), Cost::Unreachable);
    }

    #[test]
    fn test_unreachable_edge_invalidates_route() {
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, 2.0, f64::INFINITY],
            vec![2.0, 0.0, 3.0],
            vec![4.0, 3.0, 0.0],
        ])
        .unwrap();
        assert_eq!(matrix.route_cost(&[0, 2, 1, 0]), Cost::Unreachable);
        assert_eq!(matrix.route_cost(&[0, 1, 2, 0]), Cost::Finite(9.0));
    }

    #[test]
    fn test_open_route_cost_adds_return_edge() {
        let matrix = chain_matrix();
        assert_eq!(matrix.open_route_cost(&[0, 1, 2, 3]), Cost::Finite(12.0));
        assert_eq!(matrix.open_route_cost(&[1, 2, 3, 0]), Cost::Finite(12.0));
    }

    #[test]
    fn test_cost_arithmetic_and_ordering() {
        assert_eq!(Cost::Finite(1.5) + Cost::Finite(2.0), Cost::Finite(3.5));
        assert_eq!(Cost::Finite(1.0) + Cost::Unreachable, Cost::Unreachable);
        assert!(Cost::Finite(1e300) < Cost::Unreachable);
        assert!(!(Cost::Unreachable < Cost::Unreachable));
        assert_eq!(Cost::Unreachable.as_f64(), f64::INFINITY);
    }

    #[test]
    fn test_rejects_malformed_matrix() {
        assert!(CostMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]).is_err());
        assert!(CostMatrix::from_rows(vec![vec![0.0, -1.0], vec![1.0, 0.0]]).is_err());
    }

    #[test]
    fn test_statistics() {
        let stats = chain_matrix().statistics();
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.unreachable_pairs, 0);
        assert!(stats.symmetric);
        assert_eq!(stats.max_cost, 9.0);
        assert_eq!(stats.min_cost, 1.0);
    }
}
