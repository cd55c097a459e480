//! Local search improvement heuristics.
//!
//! This module implements:
//! - Random neighborhood moves (2-opt, swap, inversion, shift)
//! - Full 2-opt descent over every segment pair
//! - Bounded neighborhood searches that try `n` random moves and keep the
//!   improving ones (the refinement step of the memetic algorithm)
//!
//! All searches work on open-form routes and preserve permutation validity.

use crate::matrix::CostMatrix;
use crate::solution::{close_route, open_route, pin_start, Move};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Trait for local search improvement methods
pub trait LocalSearch {
    /// Improve an open-form route in place; returns true if its cost decreased.
    fn improve(&self, matrix: &CostMatrix, route: &mut Vec<usize>, rng: &mut ChaCha8Rng) -> bool;
    fn name(&self) -> &str;
}

/// Neighborhood move types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Reverse the segment between two distinct cut points
    TwoOpt,
    /// Exchange two distinct positions
    Swap,
    /// Reverse the segment between two random cut points (possibly equal)
    Inversion,
    /// Remove one node and reinsert it elsewhere
    Shift,
}

impl MoveKind {
    pub const ALL: [MoveKind; 4] = [MoveKind::Shift, MoveKind::Swap, MoveKind::Inversion, MoveKind::TwoOpt];

    /// Draw a random move of this kind for a route of length `n`.
    ///
    /// Returns `None` for `n <= 2`. With `fixed_start`, 2-opt cut points
    /// stay at or after position 1.
    pub fn random_move(self, n: usize, fixed_start: bool, rng: &mut ChaCha8Rng) -> Option<Move> {
        if n <= 2 {
            return None;
        }

        let mv = match self {
            MoveKind::TwoOpt => {
                let lo = if fixed_start { 1 } else { 0 };
                let i = rng.gen_range(lo..n - 1);
                let j = rng.gen_range(i + 1..n);
                Move::Reverse(i, j)
            }
            MoveKind::Swap => {
                let i = rng.gen_range(0..n);
                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                Move::Swap(i, j)
            }
            MoveKind::Inversion => {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                Move::Reverse(a.min(b), a.max(b))
            }
            MoveKind::Shift => {
                let from = rng.gen_range(0..n);
                let mut to = rng.gen_range(0..n - 1);
                if to >= from {
                    to += 1;
                }
                Move::Shift { from, to }
            }
        };
        Some(mv)
    }

    /// Apply one random move of this kind to a copy of `route`.
    ///
    /// If a fixed start city is displaced by the move it is swapped back to
    /// position 0.
    pub fn perturb(self, route: &[usize], fixed_start: Option<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut next = route.to_vec();
        if let Some(mv) = self.random_move(route.len(), fixed_start.is_some(), rng) {
            mv.apply(&mut next);
            if let Some(start) = fixed_start {
                pin_start(&mut next, start);
            }
        }
        next
    }

    pub fn name(self) -> &'static str {
        match self {
            MoveKind::TwoOpt => "2-Opt",
            MoveKind::Swap => "Swap",
            MoveKind::Inversion => "Inversion",
            MoveKind::Shift => "Shift",
        }
    }
}

/// Full 2-Opt Local Search
///
/// Works on the closed route with the first node held in place. Every
/// segment `[i..=j]` is reversed in turn and the reversal is kept whenever it
/// lowers the route cost; scanning continues with the improved route. Passes
/// repeat until one completes without improvement.
pub struct TwoOptSearch;

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch
    }

    /// Run the descent on a closed route and return the improved route.
    pub fn optimize_closed(&self, matrix: &CostMatrix, route: &[usize]) -> Vec<usize> {
        let mut best = route.to_vec();
        let mut best_cost = matrix.route_cost(&best);
        let len = best.len();
        if len < 4 {
            return best;
        }

        let mut passes = 0;
        let mut improved = true;
        while improved {
            improved = false;
            passes += 1;
            for i in 1..len - 2 {
                for j in i + 1..len - 1 {
                    let mut candidate = best.clone();
                    candidate[i..=j].reverse();
                    let cost = matrix.route_cost(&candidate);
                    if cost < best_cost {
                        best = candidate;
                        best_cost = cost;
                        improved = true;
                    }
                }
            }
        }

        log::trace!("2-opt converged after {} passes at cost {:.2}", passes, best_cost);
        best
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSearch for TwoOptSearch {
    fn improve(&self, matrix: &CostMatrix, route: &mut Vec<usize>, _rng: &mut ChaCha8Rng) -> bool {
        if route.len() < 3 {
            return false;
        }
        let closed = close_route(route);
        let before = matrix.route_cost(&closed);
        let optimized = self.optimize_closed(matrix, &closed);
        let after = matrix.route_cost(&optimized);
        *route = open_route(&optimized);
        after < before
    }

    fn name(&self) -> &str {
        "2-Opt"
    }
}

/// Bounded neighborhood search
///
/// Tries one random move per node (`n` trials in total) and keeps a trial
/// only when it strictly lowers the closed-route cost. This is a cheap,
/// approximate hill-climb, not a descent to a local optimum.
pub struct NeighborhoodSearch {
    pub kind: MoveKind,
    pub fixed_start: Option<usize>,
}

impl NeighborhoodSearch {
    pub fn new(kind: MoveKind) -> Self {
        NeighborhoodSearch { kind, fixed_start: None }
    }

    pub fn with_fixed_start(kind: MoveKind, start: usize) -> Self {
        NeighborhoodSearch { kind, fixed_start: Some(start) }
    }
}

impl LocalSearch for NeighborhoodSearch {
    fn improve(&self, matrix: &CostMatrix, route: &mut Vec<usize>, rng: &mut ChaCha8Rng) -> bool {
        let n = route.len();
        if n <= 2 {
            return false;
        }

        let mut best_cost = matrix.open_route_cost(route);
        let mut improved = false;
        for _ in 0..n {
            let candidate = self.kind.perturb(route, self.fixed_start, rng);
            let cost = matrix.open_route_cost(&candidate);
            if cost < best_cost {
                *route = candidate;
                best_cost = cost;
                improved = true;
            }
        }
        improved
    }

    fn name(&self) -> &str {
        self.kind.name()
    }
}

/// How the memetic algorithm picks the refinement applied to offspring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSearchPolicy {
    /// Uniform choice among shift, swap, inversion and 2-opt for every pair of children
    Random,
    /// Always the same bounded search
    Fixed(MoveKind),
    /// Full 2-opt descent
    FullTwoOpt,
}

impl LocalSearchPolicy {
    /// Build the search to apply to the next pair of children.
    pub fn pick(self, fixed_start: Option<usize>, rng: &mut ChaCha8Rng) -> Box<dyn LocalSearch> {
        let kind = match self {
            LocalSearchPolicy::FullTwoOpt => return Box::new(TwoOptSearch::new()),
            LocalSearchPolicy::Fixed(kind) => kind,
            LocalSearchPolicy::Random => *MoveKind::ALL.choose(rng).unwrap_or(&MoveKind::TwoOpt),
        };
        Box::new(NeighborhoodSearch { kind, fixed_start })
    }
}

impl Default for LocalSearchPolicy {
    fn default() -> Self {
        LocalSearchPolicy::Random
    }
}
