//! Genetic and memetic algorithms for the TSP.
//!
//! One generation is `EVALUATE -> BREED -> REPLACE`:
//! - the current routes are scored and ranked ([`evaluate`]),
//! - the history and the global best are updated,
//! - elites are copied, then pairs of parents are selected, crossed over,
//!   mutated and (memetic only) refined by a local search,
//! - the bred routes become the next population.
//!
//! The population is a plain value moved through each generation; the only
//! mutable state a run owns is its RNG.

use crate::error::{Error, Result};
use crate::heuristics::local_search::{LocalSearchPolicy, MoveKind};
use crate::heuristics::operators::{CrossoverType, MutationType, SelectionType};
use crate::heuristics::population::{evaluate, initialize_population, RankedPopulation};
use crate::matrix::{Cost, CostMatrix};
use crate::solution::{close_route, pin_start, Solution};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Genetic Algorithm configuration
#[derive(Debug, Clone)]
pub struct GAConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Crossover probability
    pub crossover_prob: f64,
    /// Mutation probability (per child)
    pub mutation_prob: f64,
    /// Selection method
    pub selection_type: SelectionType,
    /// Tournament size for selection
    pub tournament_size: usize,
    /// Crossover operator
    pub crossover_type: CrossoverType,
    /// Mutation operator
    pub mutation_type: MutationType,
    /// Fraction of the population copied unchanged into the next generation
    pub elitism_rate: f64,
    /// Keep this city at position 0 of every route
    pub fixed_start: Option<usize>,
    /// Seed a quarter of the initial population with nearest-neighbor tours
    pub use_heuristic: bool,
    /// Refine offspring with a local search (memetic algorithm)
    pub local_search: Option<LocalSearchPolicy>,
    /// Stop after this many generations without improving the best cost
    pub max_no_improve: Option<usize>,
    /// Random seed
    pub seed: u64,
}

impl Default for GAConfig {
    fn default() -> Self {
        GAConfig {
            population_size: 200,
            max_generations: 500,
            crossover_prob: 0.9,
            mutation_prob: 0.05,
            selection_type: SelectionType::Tournament,
            tournament_size: 5,
            crossover_type: CrossoverType::Order,
            mutation_type: MutationType::Inversion,
            elitism_rate: 0.1,
            fixed_start: None,
            use_heuristic: true,
            local_search: None,
            max_no_improve: None,
            seed: 42,
        }
    }
}

impl GAConfig {
    /// Memetic preset: swap mutation plus a random local search per pair of children
    pub fn memetic() -> Self {
        GAConfig {
            mutation_type: MutationType::Swap,
            local_search: Some(LocalSearchPolicy::Random),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of elites: `max(1, ceil(population_size * elitism_rate))`, capped
    /// at the population size.
    pub fn elite_count(&self) -> usize {
        let count = (self.population_size as f64 * self.elitism_rate).ceil() as usize;
        count.max(1).min(self.population_size)
    }

    /// Check parameter ranges for a matrix with `n` cities.
    pub fn validate(&self, n: usize) -> Result<()> {
        if self.population_size == 0 {
            return Err(Error::invalid_config("population_size must be at least 1"));
        }
        if self.tournament_size == 0 {
            return Err(Error::invalid_config("tournament_size must be at least 1"));
        }
        for (name, value) in [
            ("crossover_prob", self.crossover_prob),
            ("mutation_prob", self.mutation_prob),
            ("elitism_rate", self.elitism_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::invalid_config(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if let Some(start) = self.fixed_start {
            if start >= n {
                return Err(Error::invalid_config(format!(
                    "fixed_start {} is outside 0..{}",
                    start, n
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one evolutionary run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Best route found, in closed form
    pub best_route: Vec<usize>,
    /// Its cost (`Unreachable` if no feasible route was ever seen)
    pub best_cost: Cost,
    /// Best fitness of each evaluated generation
    pub history: Vec<f64>,
    /// Number of generations evaluated
    pub generations: usize,
    /// Wall-clock time in seconds
    pub elapsed: f64,
}

impl RunResult {
    pub fn into_solution(self, matrix: &CostMatrix, algorithm: &str) -> Solution {
        let mut solution = Solution::from_tour(matrix, self.best_route, algorithm);
        solution.computation_time = self.elapsed;
        solution.iterations = Some(self.generations);
        solution
    }
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm<'a> {
    matrix: &'a CostMatrix,
    config: GAConfig,
    rng: ChaCha8Rng,
}

impl<'a> GeneticAlgorithm<'a> {
    pub fn new(matrix: &'a CostMatrix, config: GAConfig) -> Result<Self> {
        if matrix.is_empty() {
            return Err(Error::invalid_matrix("cannot optimize an empty matrix"));
        }
        config.validate(matrix.len())?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(GeneticAlgorithm { matrix, config, rng })
    }

    pub fn config(&self) -> &GAConfig {
        &self.config
    }

    fn label(&self) -> &'static str {
        if self.config.local_search.is_some() {
            "Memetic"
        } else {
            "GA"
        }
    }

    /// Run the algorithm to completion
    pub fn run(&mut self) -> RunResult {
        let start = Instant::now();
        let n = self.matrix.len();

        let mut population = initialize_population(
            self.config.population_size,
            n,
            self.config.use_heuristic,
            self.matrix,
            self.config.fixed_start,
            &mut self.rng,
        );

        let mut best: Option<(Vec<usize>, Cost)> = None;
        let mut history = Vec::with_capacity(self.config.max_generations);
        let mut generation = 0;
        let mut no_improve = 0;

        while generation < self.config.max_generations {
            let ranked = evaluate(population, self.matrix);
            let Some(leader) = ranked.best() else { break };
            history.push(leader.fitness);

            let improved = best.as_ref().map_or(true, |(_, cost)| leader.cost < *cost);
            if improved {
                best = Some((close_route(&leader.route), leader.cost));
                no_improve = 0;
            } else {
                no_improve += 1;
            }
            generation += 1;

            log::debug!(
                "[{}] Gen {}  Best cost {:.3}  Generation best {:.3}  Feasible {}/{}  Diversity {:.2}",
                self.label(),
                generation,
                best.as_ref().map_or(Cost::Unreachable, |(_, c)| *c),
                leader.cost,
                ranked.feasible_count(),
                ranked.len(),
                ranked.diversity()
            );

            if let Some(limit) = self.config.max_no_improve {
                if no_improve >= limit {
                    log::debug!("[{}] No improvement for {} generations, stopping", self.label(), limit);
                    break;
                }
            }

            population = self.evolve(&ranked);
        }

        let (best_route, best_cost) = best.unwrap_or((Vec::new(), Cost::Unreachable));
        let elapsed = start.elapsed().as_secs_f64();
        log::info!(
            "[{}] Finished after {} generations: cost {:.2} in {:.3}s",
            self.label(),
            generation,
            best_cost,
            elapsed
        );

        RunResult {
            best_route,
            best_cost,
            history,
            generations: generation,
            elapsed,
        }
    }

    /// Run and wrap the best route into a [`Solution`]
    pub fn solve(&mut self) -> Solution {
        let name = self.label();
        let result = self.run();
        result.into_solution(self.matrix, name)
    }

    /// Breed the next population from a ranked generation.
    fn evolve(&mut self, ranked: &RankedPopulation) -> Vec<Vec<usize>> {
        let pop_size = self.config.population_size;
        let fixed_start = self.config.fixed_start;

        let mut next: Vec<Vec<usize>> = ranked
            .top(self.config.elite_count())
            .iter()
            .map(|ind| ind.route.clone())
            .collect();

        while next.len() < pop_size {
            let parents = self.config.selection_type.select(
                ranked,
                2,
                self.config.tournament_size,
                &mut self.rng,
            );
            let (parent1, parent2) = (&parents[0].route, &parents[1].route);

            let (mut child1, mut child2) = if self.rng.gen::<f64>() < self.config.crossover_prob {
                self.config.crossover_type.crossover(parent1, parent2, &mut self.rng)
            } else {
                (parent1.clone(), parent2.clone())
            };
            if let Some(s) = fixed_start {
                pin_start(&mut child1, s);
                pin_start(&mut child2, s);
            }

            let mutation = self.config.mutation_type;
            let prob = self.config.mutation_prob;
            child1 = mutation.mutate(&child1, prob, fixed_start, &mut self.rng);
            child2 = mutation.mutate(&child2, prob, fixed_start, &mut self.rng);

            if let Some(policy) = self.config.local_search {
                let search = policy.pick(fixed_start, &mut self.rng);
                search.improve(self.matrix, &mut child1, &mut self.rng);
                search.improve(self.matrix, &mut child2, &mut self.rng);
            }

            for child in [child1, child2] {
                if next.len() >= pop_size {
                    break;
                }
                // Clones of a parent get a forced segment reversal (distinct cuts, so it always changes)
                let child = if child == *parent1 || child == *parent2 {
                    MoveKind::TwoOpt.perturb(&child, fixed_start, &mut self.rng)
                } else {
                    child
                };
                next.push(child);
            }
        }

        next
    }
}

/// Memetic Algorithm (GA + local search on every pair of offspring)
pub struct MemeticAlgorithm<'a> {
    ga: GeneticAlgorithm<'a>,
}

impl<'a> MemeticAlgorithm<'a> {
    pub fn new(matrix: &'a CostMatrix) -> Result<Self> {
        Self::with_config(matrix, GAConfig::memetic())
    }

    /// Uses `config` as given, adding the random local-search policy if it has none.
    pub fn with_config(matrix: &'a CostMatrix, mut config: GAConfig) -> Result<Self> {
        config.local_search.get_or_insert(LocalSearchPolicy::Random);
        Ok(MemeticAlgorithm {
            ga: GeneticAlgorithm::new(matrix, config)?,
        })
    }

    pub fn run(&mut self) -> RunResult {
        self.ga.run()
    }

    pub fn solve(&mut self) -> Solution {
        self.ga.solve()
    }
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

    /// Cities on a line at positions 0, 1, ..., n-1 (optimal tour 2 * (n - 1))
    fn line_matrix(n: usize) -> CostMatrix {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        CostMatrix::from_rows(rows).unwrap()
    }

    fn small_config() -> GAConfig {
        GAConfig {
            population_size: 20,
            max_generations: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_genetic_algorithm_finds_chain_optimum() {
        let matrix = chain_matrix();
        let mut ga = GeneticAlgorithm::new(&matrix, small_config()).unwrap();
        let result = ga.run();

        assert_eq!(result.best_cost, Cost::Finite(12.0));
        assert_eq!(result.best_route.len(), 5);
        assert_eq!(result.best_route.first(), result.best_route.last());
        assert!(is_permutation(&result.best_route[..4], 4));
        assert_eq!(matrix.route_cost(&result.best_route), result.best_cost);
    }

    #[test]
    fn test_history_is_monotone_with_elitism() {
        let matrix = line_matrix(10);
        let mut ga = GeneticAlgorithm::new(&matrix, small_config()).unwrap();
        let result = ga.run();

        assert_eq!(result.history.len(), 30);
        assert_eq!(result.generations, 30);
        assert!(result.history.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_same_seed_same_result() {
        let matrix = line_matrix(9);
        let config = GAConfig {
            crossover_type: CrossoverType::PartiallyMapped,
            selection_type: SelectionType::Roulette,
            ..small_config()
        };
        let a = GeneticAlgorithm::new(&matrix, config.clone()).unwrap().run();
        let b = GeneticAlgorithm::new(&matrix, config).unwrap().run();
        assert_eq!(a.best_route, b.best_route);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_fixed_start_is_respected() {
        let matrix = line_matrix(8);
        let config = GAConfig {
            fixed_start: Some(5),
            ..small_config()
        };
        let result = GeneticAlgorithm::new(&matrix, config).unwrap().run();
        assert_eq!(result.best_route[0], 5);
        assert_eq!(result.best_route[8], 5);
        assert!(is_permutation(&result.best_route[..8], 8));
    }

    #[test]
    fn test_early_stopping() {
        let matrix = chain_matrix();
        let config = GAConfig {
            max_generations: 500,
            max_no_improve: Some(5),
            ..small_config()
        };
        let result = GeneticAlgorithm::new(&matrix, config).unwrap().run();
        assert!(result.generations < 500);
        assert_eq!(result.history.len(), result.generations);
    }

    #[test]
    fn test_disconnected_matrix_reports_unreachable() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, 1.0, inf],
            vec![1.0, 0.0, inf],
            vec![inf, inf, 0.0],
        ])
        .unwrap();
        let result = GeneticAlgorithm::new(&matrix, small_config()).unwrap().run();
        assert_eq!(result.best_cost, Cost::Unreachable);
        assert_eq!(result.best_route.len(), 4);
        assert!(result.history.iter().all(|&f| f == 0.0));
    }

    #[test]
    fn test_single_city() {
        let matrix = CostMatrix::from_rows(vec![vec![0.0]]).unwrap();
        let result = GeneticAlgorithm::new(&matrix, small_config()).unwrap().run();
        assert_eq!(result.best_route, vec![0, 0]);
        assert_eq!(result.best_cost, Cost::Finite(0.0));
    }

    #[test]
    fn test_elite_count() {
        let config = GAConfig::default();
        assert_eq!(config.elite_count(), 20);
        let config = GAConfig {
            population_size: 7,
            elitism_rate: 0.1,
            ..Default::default()
        };
        assert_eq!(config.elite_count(), 1);
        let config = GAConfig {
            population_size: 5,
            elitism_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(config.elite_count(), 1);
    }

    #[test]
    fn test_evolve_keeps_size_and_elites() {
        let matrix = line_matrix(9);
        for &pop_size in &[1, 2, 3, 7, 13] {
            for memetic in [false, true] {
                let config = GAConfig {
                    population_size: pop_size,
                    crossover_type: CrossoverType::PartiallyMapped,
                    mutation_type: MutationType::Shift,
                    mutation_prob: 0.5,
                    elitism_rate: 0.2,
                    fixed_start: Some(3),
                    local_search: memetic.then_some(LocalSearchPolicy::Random),
                    seed: pop_size as u64,
                    ..Default::default()
                };
                let mut ga = GeneticAlgorithm::new(&matrix, config).unwrap();
                let population = initialize_population(pop_size, 9, true, &matrix, Some(3), &mut ga.rng);
                let ranked = evaluate(population, &matrix);

                let next = ga.evolve(&ranked);
                assert_eq!(next.len(), pop_size);
                let elites = ga.config().elite_count();
                for (route, elite) in next.iter().zip(ranked.top(elites)) {
                    assert_eq!(*route, elite.route);
                }
                assert_eq!(next[0], ranked.best().unwrap().route);
                for route in &next {
                    assert!(is_permutation(route, 9));
                    assert_eq!(route[0], 3);
                }
            }
        }
    }

    #[test]
    fn test_evolve_perturbs_clones_of_parents() {
        let matrix = line_matrix(6);
        let route = vec![2, 0, 4, 1, 5, 3];
        for memetic in [false, true] {
            let config = GAConfig {
                population_size: 7,
                crossover_prob: 0.0,
                mutation_prob: 0.0,
                elitism_rate: 0.3,
                fixed_start: Some(2),
                local_search: memetic.then_some(LocalSearchPolicy::Random),
                ..Default::default()
            };
            let mut ga = GeneticAlgorithm::new(&matrix, config).unwrap();
            let ranked = evaluate(vec![route.clone(); 7], &matrix);

            let next = ga.evolve(&ranked);
            assert_eq!(next.len(), 7);
            assert_eq!(ga.config().elite_count(), 3);
            assert!(next[..3].iter().all(|r| *r == route));
            for child in &next[3..] {
                assert_ne!(*child, route);
                assert!(is_permutation(child, 6));
                assert_eq!(child[0], 2);
            }
        }
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let matrix = chain_matrix();
        let bad = [
            GAConfig { population_size: 0, ..Default::default() },
            GAConfig { crossover_prob: 1.5, ..Default::default() },
            GAConfig { mutation_prob: f64::NAN, ..Default::default() },
            GAConfig { fixed_start: Some(4), ..Default::default() },
            GAConfig { tournament_size: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(GeneticAlgorithm::new(&matrix, config).is_err());
        }
        let empty = CostMatrix::from_rows(Vec::new()).unwrap();
        assert!(GeneticAlgorithm::new(&empty, GAConfig::default()).is_err());
    }

    #[test]
    fn test_memetic_algorithm() {
        let matrix = line_matrix(8);
        let config = GAConfig {
            population_size: 16,
            max_generations: 20,
            ..GAConfig::memetic()
        };
        let mut memetic = MemeticAlgorithm::with_config(&matrix, config).unwrap();
        let solution = memetic.solve();

        assert!(solution.feasible);
        assert!(solution.is_complete(8));
        assert_eq!(solution.algorithm, "Memetic");
        assert_eq!(solution.iterations, Some(20));
    }

    #[test]
    fn test_memetic_preset() {
        let config = GAConfig::memetic();
        assert_eq!(config.mutation_type, MutationType::Swap);
        assert_eq!(config.local_search, Some(LocalSearchPolicy::Random));
        assert_eq!(config.population_size, 200);

        let matrix = chain_matrix();
        let memetic = MemeticAlgorithm::with_config(&matrix, small_config()).unwrap();
        assert!(memetic.ga.config().local_search.is_some());
    }
}
