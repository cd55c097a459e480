//! Population engine: individuals, fitness and ranking.

use crate::heuristics::construction::NearestNeighborHeuristic;
use crate::matrix::{Cost, CostMatrix};
use crate::solution::{open_route, pin_start, rotate_to_start};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::cmp::Reverse;

/// Fitness of a route cost: `1 / (cost + 1)`, or exactly 0 when unreachable.
#[inline]
pub fn fitness(cost: Cost) -> f64 {
    match cost {
        Cost::Finite(c) => 1.0 / (c + 1.0),
        Cost::Unreachable => 0.0,
    }
}

/// Individual in the genetic algorithm population
#[derive(Debug, Clone)]
pub struct Individual {
    /// Open-form route (permutation of `0..n`, return edge implied)
    pub route: Vec<usize>,
    /// Closed-route cost
    pub cost: Cost,
    /// Fitness (higher is better)
    pub fitness: f64,
}

impl Individual {
    pub fn new(route: Vec<usize>, matrix: &CostMatrix) -> Self {
        let cost = matrix.open_route_cost(&route);
        Individual {
            route,
            cost,
            fitness: fitness(cost),
        }
    }

    pub fn feasible(&self) -> bool {
        self.cost.is_finite()
    }
}

/// A generation's individuals sorted by decreasing fitness.
///
/// Built once per generation by [`evaluate`] and only read afterwards.
#[derive(Debug, Clone)]
pub struct RankedPopulation {
    individuals: Vec<Individual>,
}

impl RankedPopulation {
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Fittest individual of the generation
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    /// The `k` fittest individuals
    pub fn top(&self, k: usize) -> &[Individual] {
        &self.individuals[..k.min(self.individuals.len())]
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn total_fitness(&self) -> f64 {
        self.individuals.iter().map(|ind| ind.fitness).sum()
    }

    pub fn feasible_count(&self) -> usize {
        self.individuals.iter().filter(|ind| ind.feasible()).count()
    }

    /// Average number of positions at which pairs of the first 20 routes differ
    pub fn diversity(&self) -> f64 {
        let sample = &self.individuals[..self.individuals.len().min(20)];
        let mut total_diff = 0.0;
        let mut count = 0;

        for i in 0..sample.len() {
            for j in i + 1..sample.len() {
                let diff = sample[i]
                    .route
                    .iter()
                    .zip(sample[j].route.iter())
                    .filter(|(a, b)| a != b)
                    .count();
                total_diff += diff as f64;
                count += 1;
            }
        }

        if count > 0 {
            total_diff / count as f64
        } else {
            0.0
        }
    }
}

/// Build the generation-0 routes.
///
/// A quarter of the population (`pop_size / 4`) comes from nearest-neighbor
/// tours with random starts when `use_heuristic` is set; the rest are uniform
/// random permutations. A nearest-neighbor tour that could not visit every
/// node is replaced by a random permutation.
///
/// With `fixed_start`, every route begins at that node: seeded tours are
/// rotated (same cycle), random ones get the node swapped to the front.
pub fn initialize_population(
    pop_size: usize,
    n: usize,
    use_heuristic: bool,
    matrix: &CostMatrix,
    fixed_start: Option<usize>,
    rng: &mut ChaCha8Rng,
) -> Vec<Vec<usize>> {
    let mut population = Vec::with_capacity(pop_size);
    let num_heuristic = if use_heuristic && n > 0 { pop_size / 4 } else { 0 };

    for _ in 0..num_heuristic {
        let start = rng.gen_range(0..n);
        let tour = NearestNeighborHeuristic::route_from(matrix, start);
        let mut route = if tour.len() == n + 1 {
            open_route(&tour)
        } else {
            random_route(n, rng)
        };
        if let Some(s) = fixed_start {
            rotate_to_start(&mut route, s);
        }
        population.push(route);
    }

    while population.len() < pop_size {
        let mut route = random_route(n, rng);
        if let Some(s) = fixed_start {
            pin_start(&mut route, s);
        }
        population.push(route);
    }

    log::debug!(
        "Initialized population: {} routes ({} nearest-neighbor seeded)",
        population.len(),
        num_heuristic
    );
    population
}

/// Uniform random permutation of `0..n`
pub fn random_route(n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut route: Vec<usize> = (0..n).collect();
    route.shuffle(rng);
    route
}

/// Score every route and rank by decreasing fitness (stable for ties).
pub fn evaluate(population: Vec<Vec<usize>>, matrix: &CostMatrix) -> RankedPopulation {
    let mut individuals: Vec<Individual> = population
        .into_iter()
        .map(|route| Individual::new(route, matrix))
        .collect();
    individuals.sort_by_key(|ind| Reverse(OrderedFloat(ind.fitness)));
    RankedPopulation { individuals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::is_permutation;

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
    fn test_fitness_formula() {
        assert_eq!(fitness(Cost::Finite(0.0)), 1.0);
        assert_eq!(fitness(Cost::Finite(3.0)), 0.25);
        assert_eq!(fitness(Cost::Unreachable), 0.0);
    }

    #[test]
    fn test_cost_fitness_monotonicity() {
        let costs = [0.0, 0.5, 3.0, 12.0, 12.5, 1e6];
        for &a in &costs {
            for &b in &costs {
                let (fa, fb) = (fitness(Cost::Finite(a)), fitness(Cost::Finite(b)));
                assert_eq!(a < b, fa > fb);
            }
        }
    }

    #[test]
    fn test_initialize_population_sizes_and_validity() {
        let matrix = chain_matrix();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let population = initialize_population(10, 4, true, &matrix, None, &mut rng);

        assert_eq!(population.len(), 10);
        for route in &population {
            assert!(is_permutation(route, 4));
        }
        // nearest-neighbor seeds on the chain never exceed 20
        for route in &population[..2] {
            assert!(matrix.open_route_cost(route) <= Cost::Finite(20.0));
        }
    }

    #[test]
    fn test_initialize_population_without_heuristic() {
        let matrix = chain_matrix();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let population = initialize_population(7, 4, false, &matrix, None, &mut rng);
        assert_eq!(population.len(), 7);
        assert!(population.iter().all(|r| is_permutation(r, 4)));
    }

    #[test]
    fn test_initialize_population_with_fixed_start() {
        let matrix = chain_matrix();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let population = initialize_population(12, 4, true, &matrix, Some(2), &mut rng);
        assert!(population.iter().all(|r| r[0] == 2 && is_permutation(r, 4)));
    }

    #[test]
    fn test_disconnected_seeds_fall_back_to_permutations() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, 1.0, inf],
            vec![1.0, 0.0, inf],
            vec![inf, inf, 0.0],
        ])
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let population = initialize_population(8, 3, true, &matrix, None, &mut rng);
        assert!(population.iter().all(|r| is_permutation(r, 3)));
    }

    #[test]
    fn test_evaluate_ranks_by_fitness() {
        let matrix = chain_matrix();
        let population = vec![vec![0, 2, 1, 3], vec![0, 1, 2, 3], vec![0, 1, 3, 2]];
        let ranked = evaluate(population, &matrix);

        let costs: Vec<Cost> = ranked.individuals().iter().map(|i| i.cost).collect();
        assert_eq!(costs, vec![Cost::Finite(12.0), Cost::Finite(20.0), Cost::Finite(28.0)]);
        assert_eq!(ranked.best().unwrap().route, vec![0, 1, 2, 3]);
        assert_eq!(ranked.top(2).len(), 2);
        assert_eq!(ranked.top(10).len(), 3);
    }

    #[test]
    fn test_evaluate_keeps_insertion_order_for_ties() {
        let matrix = chain_matrix();
        let population = vec![vec![1, 2, 3, 0], vec![0, 1, 2, 3], vec![3, 2, 1, 0]];
        let ranked = evaluate(population.clone(), &matrix);
        let routes: Vec<Vec<usize>> = ranked.individuals().iter().map(|i| i.route.clone()).collect();
        assert_eq!(routes, population);
    }

    #[test]
    fn test_infeasible_individuals_rank_last() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, 1.0, inf],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ])
        .unwrap();
        let ranked = evaluate(vec![vec![0, 2, 1], vec![0, 1, 2]], &matrix);
        assert_eq!(ranked.best().unwrap().route, vec![0, 1, 2]);
        assert_eq!(ranked.individuals()[1].fitness, 0.0);
        assert_eq!(ranked.feasible_count(), 1);
    }
}
