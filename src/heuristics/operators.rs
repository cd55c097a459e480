//! Genetic operators: parent selection, crossover and mutation.
//!
//! Crossovers and mutations work on open-form routes (permutations of
//! `0..n`) and always return valid permutations.

use crate::heuristics::local_search::MoveKind;
use crate::heuristics::population::{Individual, RankedPopulation};
use rand::prelude::*;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Parent selection methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionType {
    /// Best of `tournament_size` individuals drawn without replacement
    Tournament,
    /// Fitness-proportional (roulette wheel)
    Roulette,
}

impl SelectionType {
    /// Draw `count` parents; the same individual may be drawn more than once.
    pub fn select<'a>(
        self,
        ranked: &'a RankedPopulation,
        count: usize,
        tournament_size: usize,
        rng: &mut ChaCha8Rng,
    ) -> Vec<&'a Individual> {
        if ranked.is_empty() {
            return Vec::new();
        }
        (0..count)
            .map(|_| match self {
                SelectionType::Tournament => tournament(ranked.individuals(), tournament_size, rng),
                SelectionType::Roulette => roulette(ranked, rng),
            })
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            SelectionType::Tournament => "Tournament",
            SelectionType::Roulette => "Roulette",
        }
    }
}

fn tournament<'a>(individuals: &'a [Individual], size: usize, rng: &mut ChaCha8Rng) -> &'a Individual {
    let k = size.clamp(1, individuals.len());
    let mut winner = &individuals[0];
    let mut best_fitness = f64::NEG_INFINITY;
    for idx in index::sample(rng, individuals.len(), k).iter() {
        let candidate = &individuals[idx];
        if candidate.fitness > best_fitness {
            best_fitness = candidate.fitness;
            winner = candidate;
        }
    }
    winner
}

fn roulette<'a>(ranked: &'a RankedPopulation, rng: &mut ChaCha8Rng) -> &'a Individual {
    let individuals = ranked.individuals();
    let total = ranked.total_fitness();

    // All infeasible: every individual is equally (un)likely
    if total <= 0.0 {
        return &individuals[rng.gen_range(0..individuals.len())];
    }

    let r: f64 = rng.gen();
    let mut acc = 0.0;
    for ind in individuals {
        acc += ind.fitness / total;
        if r <= acc {
            return ind;
        }
    }

    // Rounding left the cumulative sum just below r
    individuals
        .iter()
        .rev()
        .find(|ind| ind.fitness > 0.0)
        .unwrap_or(&individuals[individuals.len() - 1])
}

/// Crossover operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverType {
    /// Order crossover (OX)
    Order,
    /// Partially mapped crossover (PMX)
    PartiallyMapped,
}

impl CrossoverType {
    /// Produce two children from two parents with random cut points.
    ///
    /// OX draws two distinct cut points; PMX draws them independently, so
    /// its segment may be a single position. Parents shorter than 2 are cloned.
    pub fn crossover(self, parent1: &[usize], parent2: &[usize], rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
        let n = parent1.len();
        if n < 2 || parent2.len() != n {
            return (parent1.to_vec(), parent2.to_vec());
        }

        let (c1, c2) = match self {
            CrossoverType::Order => {
                let cuts = index::sample(rng, n, 2);
                let (a, b) = (cuts.index(0), cuts.index(1));
                (a.min(b), a.max(b))
            }
            CrossoverType::PartiallyMapped => {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                (a.min(b), a.max(b))
            }
        };
        self.crossover_at(parent1, parent2, c1, c2)
    }

    /// Crossover with the segment `[c1..=c2]` given explicitly (order of the
    /// cut points does not matter; they are clamped to the route).
    pub fn crossover_at(self, parent1: &[usize], parent2: &[usize], c1: usize, c2: usize) -> (Vec<usize>, Vec<usize>) {
        let n = parent1.len();
        if n == 0 || parent2.len() != n {
            return (parent1.to_vec(), parent2.to_vec());
        }
        let start = c1.min(c2).min(n - 1);
        let end = c1.max(c2).min(n - 1);

        match self {
            CrossoverType::Order => (
                ox_build_child(parent1, parent2, start, end),
                ox_build_child(parent2, parent1, start, end),
            ),
            CrossoverType::PartiallyMapped => (
                pmx_build_child(parent1, parent2, start, end),
                pmx_build_child(parent2, parent1, start, end),
            ),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CrossoverType::Order => "OX",
            CrossoverType::PartiallyMapped => "PMX",
        }
    }
}

/// Copy `template[start..=end]`, then fill the remaining positions with the
/// donor's cities in circular order, both cursors starting after `end`.
fn ox_build_child(template: &[usize], donor: &[usize], start: usize, end: usize) -> Vec<usize> {
    let n = template.len();
    let mut child = vec![usize::MAX; n];
    let mut present = vec![false; n];

    for i in start..=end {
        child[i] = template[i];
        present[template[i]] = true;
    }

    let mut pos = (end + 1) % n;
    for offset in 0..n {
        let city = donor[(end + 1 + offset) % n];
        if present[city] {
            continue;
        }
        child[pos] = city;
        present[city] = true;
        pos = (pos + 1) % n;
    }

    child
}

/// Copy `template[start..=end]`; every other position takes the donor's city,
/// following the segment mapping `template[k] -> donor[k]` while that city is
/// already in the segment.
fn pmx_build_child(template: &[usize], donor: &[usize], start: usize, end: usize) -> Vec<usize> {
    let n = template.len();
    let mut child = vec![usize::MAX; n];
    // position of each segment city in the template, usize::MAX outside the segment
    let mut segment_pos = vec![usize::MAX; n];

    for k in start..=end {
        child[k] = template[k];
        segment_pos[template[k]] = k;
    }

    for i in (0..start).chain(end + 1..n) {
        let mut city = donor[i];
        while segment_pos[city] != usize::MAX {
            city = donor[segment_pos[city]];
        }
        child[i] = city;
    }

    child
}

/// Mutation operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationType {
    /// Exchange two distinct positions
    Swap,
    /// Reverse a random segment
    Inversion,
    /// Move one city to another position
    Shift,
}

impl MutationType {
    /// Mutate with probability `prob`; otherwise return the route unchanged.
    ///
    /// Probability 0 never mutates (and draws nothing from `rng`). A fixed
    /// start city displaced by the move is swapped back to the front.
    pub fn mutate(self, route: &[usize], prob: f64, fixed_start: Option<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if prob > 0.0 && rng.gen::<f64>() < prob {
            self.move_kind().perturb(route, fixed_start, rng)
        } else {
            route.to_vec()
        }
    }

    pub fn move_kind(self) -> MoveKind {
        match self {
            MutationType::Swap => MoveKind::Swap,
            MutationType::Inversion => MoveKind::Inversion,
            MutationType::Shift => MoveKind::Shift,
        }
    }

    pub fn name(self) -> &'static str {
        self.move_kind().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::population::evaluate;
    use crate::matrix::CostMatrix;
    use crate::solution::is_permutation;
    use proptest::prelude::*;

    fn random_perm(n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(rng);
        perm
    }

    fn uniform_matrix(n: usize) -> CostMatrix {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { 1.0 + (i + j) as f64 }).collect())
            .collect();
        CostMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_ox_known_cuts() {
        let a = vec![0, 1, 2, 3, 4];
        let b = vec![4, 3, 2, 1, 0];
        let (c1, c2) = CrossoverType::Order.crossover_at(&a, &b, 1, 3);

        assert_eq!(&c1[1..=3], &[1, 2, 3]);
        assert_eq!(c1, vec![4, 1, 2, 3, 0]);
        assert_eq!(c2, vec![0, 3, 2, 1, 4]);
    }

    #[test]
    fn test_ox_full_segment_copies_parent() {
        let a = vec![2, 0, 3, 1];
        let b = vec![1, 3, 0, 2];
        let (c1, c2) = CrossoverType::Order.crossover_at(&a, &b, 0, 3);
        assert_eq!(c1, a);
        assert_eq!(c2, b);
    }

    #[test]
    fn test_pmx_mapping_chain() {
        // segment [0..=1]; position 2 resolves 0 -> 1 -> 2 in the first child
        let a = vec![0, 1, 2];
        let b = vec![1, 2, 0];
        let (c1, c2) = CrossoverType::PartiallyMapped.crossover_at(&a, &b, 0, 1);
        assert!(is_permutation(&c1, 3));
        assert!(is_permutation(&c2, 3));
        assert_eq!(&c1[..2], &[0, 1]);
        assert_eq!(c1, vec![0, 1, 2]);
        assert_eq!(c2, vec![1, 2, 0]);
    }

    #[test]
    fn test_pmx_degenerate_segment() {
        let a = vec![3, 1, 4, 0, 2];
        let b = vec![0, 4, 2, 3, 1];
        let (c1, c2) = CrossoverType::PartiallyMapped.crossover_at(&a, &b, 2, 2);
        assert_eq!(c1[2], 4);
        assert_eq!(c2[2], 2);
        assert!(is_permutation(&c1, 5));
        assert!(is_permutation(&c2, 5));
    }

    #[test]
    fn test_crossover_on_tiny_routes() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (c1, c2) = CrossoverType::Order.crossover(&[0], &[0], &mut rng);
        assert_eq!((c1, c2), (vec![0], vec![0]));
        let (c1, c2) = CrossoverType::PartiallyMapped.crossover(&[0, 1], &[1, 0], &mut rng);
        assert!(is_permutation(&c1, 2) && is_permutation(&c2, 2));
    }

    #[test]
    fn test_mutation_probability_zero_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let route = random_perm(12, &mut rng);
        for mutation in [MutationType::Swap, MutationType::Inversion, MutationType::Shift] {
            for _ in 0..50 {
                assert_eq!(mutation.mutate(&route, 0.0, None, &mut rng), route);
            }
        }
    }

    #[test]
    fn test_swap_mutation_changes_two_positions() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let route: Vec<usize> = (0..8).collect();
        let mutated = MutationType::Swap.mutate(&route, 1.0, None, &mut rng);
        let diff = route.iter().zip(&mutated).filter(|(a, b)| a != b).count();
        assert_eq!(diff, 2);
    }

    #[test]
    fn test_mutation_keeps_fixed_start() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let route = vec![3, 0, 1, 2, 4, 5];
        for mutation in [MutationType::Swap, MutationType::Inversion, MutationType::Shift] {
            for _ in 0..30 {
                let mutated = mutation.mutate(&route, 1.0, Some(3), &mut rng);
                assert_eq!(mutated[0], 3);
                assert!(is_permutation(&mutated, 6));
            }
        }
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let matrix = uniform_matrix(5);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let population: Vec<Vec<usize>> = (0..10).map(|_| random_perm(5, &mut rng)).collect();
        let ranked = evaluate(population, &matrix);

        // a tournament over the whole population always returns the best
        let parents = SelectionType::Tournament.select(&ranked, 4, 10, &mut rng);
        assert_eq!(parents.len(), 4);
        let best = ranked.best().unwrap().fitness;
        assert!(parents.iter().all(|p| p.fitness == best));
    }

    #[test]
    fn test_roulette_on_all_infeasible_population() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, inf, inf],
            vec![inf, 0.0, inf],
            vec![inf, inf, 0.0],
        ])
        .unwrap();
        let ranked = evaluate(vec![vec![0, 1, 2], vec![2, 1, 0], vec![1, 0, 2]], &matrix);
        assert_eq!(ranked.total_fitness(), 0.0);

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let parents = SelectionType::Roulette.select(&ranked, 2, 5, &mut rng);
        assert_eq!(parents.len(), 2);
        assert!(parents.iter().all(|p| is_permutation(&p.route, 3)));
    }

    #[test]
    fn test_roulette_skips_zero_fitness() {
        let inf = f64::INFINITY;
        let matrix = CostMatrix::from_rows(vec![
            vec![0.0, 1.0, inf],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ])
        .unwrap();
        let ranked = evaluate(vec![vec![0, 2, 1], vec![0, 1, 2]], &matrix);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let parents = SelectionType::Roulette.select(&ranked, 20, 5, &mut rng);
        assert!(parents.iter().all(|p| p.route == vec![0, 1, 2]));
    }

    proptest! {
        #[test]
        fn prop_crossover_yields_permutations(n in 1_usize..40, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let a = random_perm(n, &mut rng);
            let b = random_perm(n, &mut rng);
            for crossover in [CrossoverType::Order, CrossoverType::PartiallyMapped] {
                let (c1, c2) = crossover.crossover(&a, &b, &mut rng);
                prop_assert!(is_permutation(&c1, n));
                prop_assert!(is_permutation(&c2, n));
            }
        }

        #[test]
        fn prop_crossover_at_any_cuts(n in 1_usize..25, c1 in 0_usize..25, c2 in 0_usize..25, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let a = random_perm(n, &mut rng);
            let b = random_perm(n, &mut rng);
            for crossover in [CrossoverType::Order, CrossoverType::PartiallyMapped] {
                let (x, y) = crossover.crossover_at(&a, &b, c1, c2);
                prop_assert!(is_permutation(&x, n));
                prop_assert!(is_permutation(&y, n));
            }
        }

        #[test]
        fn prop_mutation_yields_permutations(n in 0_usize..40, seed in any::<u64>(), prob in 0.0_f64..=1.0) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let route = random_perm(n, &mut rng);
            for mutation in [MutationType::Swap, MutationType::Inversion, MutationType::Shift] {
                let mutated = mutation.mutate(&route, prob, None, &mut rng);
                prop_assert!(is_permutation(&mutated, n));
            }
        }
    }
}
