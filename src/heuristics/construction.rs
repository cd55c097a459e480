//! Construction heuristics: build a closed route from scratch.

use crate::matrix::{Cost, CostMatrix};
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub trait ConstructionHeuristic {
    fn construct(&self, matrix: &CostMatrix, rng: &mut ChaCha8Rng) -> Solution;
    fn name(&self) -> &str;
}

/// Where a construction starts its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCity {
    Fixed(usize),
    /// Uniform over `0..n`, drawn from the caller's generator
    Random,
}

impl StartCity {
    fn resolve(self, n: usize, rng: &mut ChaCha8Rng) -> usize {
        match self {
            StartCity::Fixed(start) => start,
            StartCity::Random => rng.gen_range(0..n),
        }
    }
}

impl Default for StartCity {
    fn default() -> Self {
        StartCity::Fixed(0)
    }
}

/// Closest unvisited node reachable from `current`; ties go to the lowest index.
fn find_nearest(matrix: &CostMatrix, current: usize, visited: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for candidate in 0..matrix.len() {
        if visited[candidate] {
            continue;
        }
        if let Cost::Finite(d) = matrix.cost(current, candidate) {
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((candidate, d));
            }
        }
    }
    best.map(|(node, _)| node)
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly visiting the cheapest unvisited node.
/// When the remaining nodes are all unreachable from the current one the
/// tour is closed early and comes out shorter than `n + 1`, which the cost
/// model reports as unreachable.
pub struct NearestNeighborHeuristic {
    pub start: StartCity,
}

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic { start: StartCity::default() }
    }

    pub fn from_start(start: usize) -> Self {
        NearestNeighborHeuristic { start: StartCity::Fixed(start) }
    }

    pub fn randomized() -> Self {
        NearestNeighborHeuristic { start: StartCity::Random }
    }

    /// Closed nearest-neighbor route from a fixed start.
    pub fn route_from(matrix: &CostMatrix, start: usize) -> Vec<usize> {
        let n = matrix.len();
        if n == 0 {
            return Vec::new();
        }

        let mut tour = Vec::with_capacity(n + 1);
        let mut visited = vec![false; n];
        tour.push(start);
        visited[start] = true;

        let mut current = start;
        while tour.len() < n {
            match find_nearest(matrix, current, &visited) {
                Some(next) => {
                    tour.push(next);
                    visited[next] = true;
                    current = next;
                }
                None => break,
            }
        }

        tour.push(start);
        tour
    }
}

impl Default for NearestNeighborHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, matrix: &CostMatrix, rng: &mut ChaCha8Rng) -> Solution {
        let start = std::time::Instant::now();
        if matrix.is_empty() {
            return Solution::from_tour(matrix, Vec::new(), self.name());
        }

        let first = self.start.resolve(matrix.len(), rng);
        let tour = Self::route_from(matrix, first);

        let mut solution = Solution::from_tour(matrix, tour, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        match self.start {
            StartCity::Fixed(_) => "NearestNeighbor",
            StartCity::Random => "NearestNeighbor-Randomized",
        }
    }
}

/// Cheapest Insertion Heuristic
///
/// Starts from the cycle `[start, nearest(start), start]`, then repeatedly
/// picks the unvisited node closest to the cycle and inserts it on the edge
/// where it adds the least cost.
pub struct CheapestInsertionHeuristic {
    pub start: StartCity,
}

impl CheapestInsertionHeuristic {
    pub fn new() -> Self {
        CheapestInsertionHeuristic { start: StartCity::default() }
    }

    pub fn from_start(start: usize) -> Self {
        CheapestInsertionHeuristic { start: StartCity::Fixed(start) }
    }

    pub fn randomized() -> Self {
        CheapestInsertionHeuristic { start: StartCity::Random }
    }

    /// Extra cost of putting `node` between `prev` and `next`.
    ///
    /// `None` when one of the new edges is unreachable. Replacing an
    /// unreachable edge with two reachable ones is always preferred.
    fn insertion_delta(matrix: &CostMatrix, prev: usize, node: usize, next: usize) -> Option<f64> {
        let added = matrix.cost(prev, node) + matrix.cost(node, next);
        match (added, matrix.cost(prev, next)) {
            (Cost::Unreachable, _) => None,
            (Cost::Finite(a), Cost::Finite(r)) => Some(a - r),
            (Cost::Finite(_), Cost::Unreachable) => Some(f64::NEG_INFINITY),
        }
    }

    /// Unvisited node with the smallest cost to any node already in the cycle.
    fn closest_to_cycle(matrix: &CostMatrix, cycle: &[usize], inserted: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, Cost)> = None;
        for candidate in 0..matrix.len() {
            if inserted[candidate] {
                continue;
            }
            let dist = cycle
                .iter()
                .map(|&member| matrix.cost(candidate, member))
                .fold(Cost::Unreachable, |acc, c| if c < acc { c } else { acc });
            if best.map_or(true, |(_, best_dist)| dist < best_dist) {
                best = Some((candidate, dist));
            }
        }
        best.map(|(node, _)| node)
    }

    /// Position `i` in `1..tour.len()` such that inserting before `tour[i]` is cheapest.
    ///
    /// The last candidate is the closing edge back to the start, so every edge
    /// of the cycle is considered (not only the interior ones).
    fn best_position(matrix: &CostMatrix, tour: &[usize], node: usize) -> usize {
        let mut best: Option<(usize, f64)> = None;
        for pos in 1..tour.len() {
            if let Some(delta) = Self::insertion_delta(matrix, tour[pos - 1], node, tour[pos]) {
                if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                    best = Some((pos, delta));
                }
            }
        }
        best.map(|(pos, _)| pos).unwrap_or(1)
    }

    /// Closed cheapest-insertion route from a fixed start.
    pub fn route_from(matrix: &CostMatrix, start: usize) -> Vec<usize> {
        let n = matrix.len();
        match n {
            0 => return Vec::new(),
            1 => return vec![start, start],
            _ => {}
        }

        let mut inserted = vec![false; n];
        inserted[start] = true;
        let nearest = find_nearest(matrix, start, &inserted)
            .or_else(|| (0..n).find(|&v| v != start))
            .unwrap_or(start);
        inserted[nearest] = true;

        let mut tour = vec![start, nearest, start];
        while tour.len() < n + 1 {
            let cycle_len = tour.len() - 1;
            let node = match Self::closest_to_cycle(matrix, &tour[..cycle_len], &inserted) {
                Some(node) => node,
                None => break,
            };
            let pos = Self::best_position(matrix, &tour, node);
            tour.insert(pos, node);
            inserted[node] = true;
        }

        tour
    }
}

impl Default for CheapestInsertionHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for CheapestInsertionHeuristic {
    fn construct(&self, matrix: &CostMatrix, rng: &mut ChaCha8Rng) -> Solution {
        let start = std::time::Instant::now();
        if matrix.is_empty() {
            return Solution::from_tour(matrix, Vec::new(), self.name());
        }

        let first = self.start.resolve(matrix.len(), rng);
        let tour = Self::route_from(matrix, first);

        let mut solution = Solution::from_tour(matrix, tour, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        "CheapestInsertion"
    }
}
