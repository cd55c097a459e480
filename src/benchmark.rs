//! Multi-run experiments and result reporting.
//!
//! Every algorithm is run `num_runs` times on a problem with seeds
//! `base_seed, base_seed + 1, ...`; runs are independent and may execute in
//! parallel. Per-run rows and aggregated statistics can be exported to CSV
//! and summarized in a Markdown table.

use crate::error::Result;
use crate::heuristics::construction::{
    CheapestInsertionHeuristic, ConstructionHeuristic, NearestNeighborHeuristic,
};
use crate::heuristics::genetic::{GAConfig, GeneticAlgorithm, MemeticAlgorithm};
use crate::heuristics::local_search::TwoOptSearch;
use crate::instance::Problem;
use crate::matrix::CostMatrix;
use crate::solution::Solution;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// The four solution methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// Nearest neighbor from a random start, improved by full 2-opt
    NearestNeighborTwoOpt,
    /// Cheapest insertion from a random start
    CheapestInsertion,
    Genetic,
    Memetic,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::NearestNeighborTwoOpt,
        Algorithm::CheapestInsertion,
        Algorithm::Genetic,
        Algorithm::Memetic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::NearestNeighborTwoOpt => "NN+2-Opt",
            Algorithm::CheapestInsertion => "CheapestInsertion",
            Algorithm::Genetic => "Genetic",
            Algorithm::Memetic => "Memetic",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one algorithm once with the given seed.
///
/// `ga_config` is used by the genetic and memetic algorithms (its seed is
/// replaced by `seed`; the memetic run adds a local-search policy if it has
/// none). The construction methods draw their start city from `seed`.
pub fn solve(algorithm: Algorithm, matrix: &CostMatrix, seed: u64, ga_config: &GAConfig) -> Result<Solution> {
    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut solution = match algorithm {
        Algorithm::NearestNeighborTwoOpt => {
            let initial = NearestNeighborHeuristic::randomized().construct(matrix, &mut rng);
            let tour = TwoOptSearch::new().optimize_closed(matrix, &initial.tour);
            let solution = Solution::from_tour(matrix, tour, algorithm.name());
            log::debug!("NN cost {:.2} -> 2-opt cost {:.2}", initial.cost, solution.cost);
            solution
        }
        Algorithm::CheapestInsertion => CheapestInsertionHeuristic::randomized().construct(matrix, &mut rng),
        Algorithm::Genetic => {
            let config = ga_config.clone().with_seed(seed);
            GeneticAlgorithm::new(matrix, config)?.solve()
        }
        Algorithm::Memetic => {
            let config = ga_config.clone().with_seed(seed);
            MemeticAlgorithm::with_config(matrix, config)?.solve()
        }
    };

    solution.algorithm = algorithm.name().to_string();
    solution.computation_time = start.elapsed().as_secs_f64();
    Ok(solution)
}

/// Result of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Problem label
    pub problem: String,
    /// Algorithm name
    pub algorithm: String,
    /// Run index
    pub run: usize,
    /// Seed used by the run
    pub seed: u64,
    /// Route cost (empty when the route is infeasible)
    pub cost: Option<f64>,
    /// Whether the route is feasible
    pub feasible: bool,
    /// Computation time in seconds
    pub time: f64,
    /// Number of generations (evolutionary algorithms only)
    pub iterations: Option<usize>,
    /// Route as city ids
    pub route: String,
}

/// Aggregated statistics of one algorithm on one problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub problem: String,
    pub algorithm: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    /// Best cost over feasible runs
    pub best_cost: Option<f64>,
    /// Mean cost over feasible runs
    pub mean_cost: Option<f64>,
    /// Sample standard deviation of feasible costs
    pub std_cost: Option<f64>,
    /// Mean time over all runs
    pub mean_time: f64,
    /// Best route as city ids
    pub best_route: String,
    /// Best route in local indices (closed form)
    #[serde(skip)]
    pub best_tour: Vec<usize>,
}

fn fmt_cost(cost: Option<f64>) -> String {
    cost.map_or_else(|| "-".to_string(), |c| format!("{:.2}", c))
}

impl fmt::Display for AlgorithmStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} on problem {}", self.algorithm, self.problem)?;
        writeln!(f, "  Feasible runs: {}/{}", self.num_feasible, self.num_runs)?;
        writeln!(f, "  Best cost: {}", fmt_cost(self.best_cost))?;
        writeln!(f, "  Mean cost: {}", fmt_cost(self.mean_cost))?;
        writeln!(f, "  Std cost:  {}", fmt_cost(self.std_cost))?;
        writeln!(f, "  Mean time: {:.4}s", self.mean_time)
    }
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of runs per algorithm
    pub num_runs: usize,
    /// Seed of the first run; run `i` uses `base_seed + i`
    pub base_seed: u64,
    /// Run in parallel
    pub parallel: bool,
    /// Show a progress bar
    pub show_progress: bool,
    /// Configuration of the genetic algorithm
    pub genetic: GAConfig,
    /// Configuration of the memetic algorithm
    pub memetic: GAConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 20,
            base_seed: 0,
            parallel: true,
            show_progress: true,
            genetic: GAConfig::default(),
            memetic: GAConfig::memetic(),
        }
    }
}

impl BenchmarkConfig {
    fn ga_config(&self, algorithm: Algorithm) -> &GAConfig {
        match algorithm {
            Algorithm::Memetic => &self.memetic,
            _ => &self.genetic,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<AlgorithmResult>,
    statistics: Vec<AlgorithmStatistics>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
            statistics: Vec::new(),
        }
    }

    fn progress_bar(&self, problem: &Problem, algorithm: Algorithm) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(self.config.num_runs as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {pos}/{len} runs ({elapsed})")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(format!("{} / {}", problem.name, algorithm));
        bar
    }

    /// Run `num_runs` seeds of `algorithm` on `problem`, record the rows and
    /// return the aggregated statistics.
    pub fn run(&mut self, problem: &Problem, algorithm: Algorithm) -> Result<AlgorithmStatistics> {
        log::info!(
            "Running {} x {} on problem {} ({} cities)",
            self.config.num_runs,
            algorithm,
            problem.name,
            problem.len()
        );

        let ga_config = self.config.ga_config(algorithm);
        let base_seed = self.config.base_seed;
        let bar = self.progress_bar(problem, algorithm);

        let run_one = |run: usize| -> Result<Solution> {
            let seed = base_seed.wrapping_add(run as u64);
            let solution = solve(algorithm, &problem.matrix, seed, ga_config);
            bar.inc(1);
            solution
        };

        let solutions: Vec<Solution> = if self.config.parallel {
            (0..self.config.num_runs)
                .into_par_iter()
                .map(run_one)
                .collect::<Result<_>>()?
        } else {
            (0..self.config.num_runs)
                .map(run_one)
                .collect::<Result<_>>()?
        };
        bar.finish_and_clear();

        for (run, solution) in solutions.iter().enumerate() {
            self.record_result(problem, algorithm, run, solution);
        }

        let stats = compute_statistics(problem, algorithm, &solutions);
        log::info!(
            "{} on {}: best {} mean {} ({} feasible of {})",
            algorithm,
            problem.name,
            fmt_cost(stats.best_cost),
            fmt_cost(stats.mean_cost),
            stats.num_feasible,
            stats.num_runs
        );
        self.statistics.push(stats.clone());
        Ok(stats)
    }

    /// Run every algorithm on `problem`.
    pub fn run_all(&mut self, problem: &Problem) -> Result<Vec<AlgorithmStatistics>> {
        Algorithm::ALL
            .iter()
            .map(|&algorithm| self.run(problem, algorithm))
            .collect()
    }

    fn record_result(&mut self, problem: &Problem, algorithm: Algorithm, run: usize, solution: &Solution) {
        self.results.push(AlgorithmResult {
            problem: problem.name.clone(),
            algorithm: algorithm.name().to_string(),
            run,
            seed: self.config.base_seed.wrapping_add(run as u64),
            cost: solution.cost.value(),
            feasible: solution.feasible,
            time: solution.computation_time,
            iterations: solution.iterations,
            route: join_ids(&problem.route_ids(&solution.tour)),
        });
    }

    /// Export per-run results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for result in &self.results {
            writer.serialize(result)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export aggregated statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for stat in &self.statistics {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Append one Markdown row per statistics entry, writing the table header
    /// first if the file is new or empty.
    pub fn append_markdown_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        append_markdown_rows(path.as_ref(), &self.statistics)
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("          TSP Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        report.push_str(&"-".repeat(86));
        report.push('\n');
        report.push_str(&format!(
            "{:<12} {:<18} {:>10} {:>12} {:>12} {:>8} {:>10}\n",
            "Problem", "Algorithm", "Feasible", "Best", "Mean", "Std", "Avg Time"
        ));
        report.push_str(&"-".repeat(86));
        report.push('\n');

        for stat in &self.statistics {
            report.push_str(&format!(
                "{:<12} {:<18} {:>10} {:>12} {:>12} {:>8} {:>10.4}\n",
                stat.problem,
                stat.algorithm,
                format!("{}/{}", stat.num_feasible, stat.num_runs),
                fmt_cost(stat.best_cost),
                fmt_cost(stat.mean_cost),
                fmt_cost(stat.std_cost),
                stat.mean_time
            ));
        }

        report.push_str(&"-".repeat(86));
        report.push('\n');

        report.push_str("\nBest routes:\n");
        for stat in self.statistics.iter().filter(|s| s.best_cost.is_some()) {
            report.push_str(&format!(
                "  {} / {}: {}\n",
                stat.problem, stat.algorithm, stat.best_route
            ));
        }

        report
    }

    pub fn results(&self) -> &[AlgorithmResult] {
        &self.results
    }

    pub fn statistics(&self) -> &[AlgorithmStatistics] {
        &self.statistics
    }
}

/// Aggregate the solutions of one algorithm on one problem.
///
/// Costs are taken over feasible runs only; time over all runs.
pub fn compute_statistics(problem: &Problem, algorithm: Algorithm, solutions: &[Solution]) -> AlgorithmStatistics {
    let feasible: Vec<&Solution> = solutions.iter().filter(|s| s.feasible).collect();
    let costs: Vec<f64> = feasible.iter().filter_map(|s| s.cost.value()).collect();

    let best = feasible
        .iter()
        .copied()
        .min_by(|a, b| a.cost.as_f64().total_cmp(&b.cost.as_f64()));

    let (mean_cost, std_cost) = if costs.is_empty() {
        (None, None)
    } else if costs.len() == 1 {
        (Some(costs[0]), Some(0.0))
    } else {
        (Some(costs.iter().mean()), Some(costs.iter().std_dev()))
    };

    let mean_time = if solutions.is_empty() {
        0.0
    } else {
        solutions.iter().map(|s| s.computation_time).mean()
    };

    let best_tour = best.map(|s| s.tour.clone()).unwrap_or_default();
    AlgorithmStatistics {
        problem: problem.name.clone(),
        algorithm: algorithm.name().to_string(),
        num_runs: solutions.len(),
        num_feasible: feasible.len(),
        best_cost: best.and_then(|s| s.cost.value()),
        mean_cost,
        std_cost,
        mean_time,
        best_route: join_ids(&problem.route_ids(&best_tour)),
        best_tour,
    }
}

fn join_ids(ids: &[usize]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" -> ")
}

/// Append statistics rows to a Markdown results table.
pub fn append_markdown_rows(path: &Path, statistics: &[AlgorithmStatistics]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file: File = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "| Problem | Algorithm | Best | Mean | Mean time |")?;
        writeln!(file, "| :--- | :--- | :--- | :--- | :--- |")?;
    }
    for stat in statistics {
        writeln!(
            file,
            "| {} | {} | {} | {} | {:.4} |",
            stat.problem,
            stat.algorithm,
            fmt_cost(stat.best_cost),
            fmt_cost(stat.mean_cost),
            stat.mean_time
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CityNames;
    use crate::matrix::Cost;

    fn chain_matrix() -> CostMatrix {
        CostMatrix::from_rows(vec![
            vec![0.0, 1.0, 9.0, 9.0],
            vec![1.0, 0.0, 1.0, 9.0],
            vec![9.0, 1.0, 0.0, 1.0],
            vec![9.0, 9.0, 1.0, 0.0],
        ])
        .unwrap()
    }

    fn chain_problem() -> Problem {
        Problem::from_matrix("chain", chain_matrix(), CityNames::default())
    }

    fn quick_config(num_runs: usize, parallel: bool) -> BenchmarkConfig {
        let small = GAConfig {
            population_size: 12,
            max_generations: 15,
            ..Default::default()
        };
        BenchmarkConfig {
            num_runs,
            base_seed: 100,
            parallel,
            show_progress: false,
            memetic: GAConfig {
                population_size: 12,
                max_generations: 15,
                ..GAConfig::memetic()
            },
            genetic: small,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tsp-solver-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.num_runs, 20);
        assert!(config.memetic.local_search.is_some());
        assert!(config.genetic.local_search.is_none());
    }

    #[test]
    fn test_nn_two_opt_reaches_chain_optimum() {
        let matrix = chain_matrix();
        for seed in 0..10 {
            let solution = solve(Algorithm::NearestNeighborTwoOpt, &matrix, seed, &GAConfig::default()).unwrap();
            assert_eq!(solution.cost, Cost::Finite(12.0));
            assert!(solution.is_complete(4));
        }
    }

    #[test]
    fn test_every_algorithm_returns_a_complete_tour() {
        let matrix = chain_matrix();
        let config = quick_config(1, false);
        for algorithm in Algorithm::ALL {
            let solution = solve(algorithm, &matrix, 7, config.ga_config(algorithm)).unwrap();
            assert!(solution.is_complete(4), "{}", algorithm);
            assert!(solution.feasible);
            assert_eq!(solution.algorithm, algorithm.name());
        }
    }

    #[test]
    fn test_benchmark_run_records_every_seed() {
        let problem = chain_problem();
        let mut benchmark = Benchmark::new(quick_config(4, true));
        let stats = benchmark.run(&problem, Algorithm::Genetic).unwrap();

        assert_eq!(stats.num_runs, 4);
        assert_eq!(stats.num_feasible, 4);
        assert_eq!(stats.best_cost, Some(12.0));
        assert!(stats.mean_cost.unwrap() >= 12.0);
        assert_eq!(stats.best_tour.len(), 5);

        let seeds: Vec<u64> = benchmark.results().iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_parallel_and_serial_runs_agree() {
        let problem = chain_problem();
        let mut parallel = Benchmark::new(quick_config(3, true));
        let mut serial = Benchmark::new(quick_config(3, false));
        parallel.run(&problem, Algorithm::CheapestInsertion).unwrap();
        serial.run(&problem, Algorithm::CheapestInsertion).unwrap();

        let routes = |b: &Benchmark| b.results().iter().map(|r| r.route.clone()).collect::<Vec<_>>();
        assert_eq!(routes(&parallel), routes(&serial));
    }

    #[test]
    fn test_statistics_skip_infeasible_runs() {
        let problem = chain_problem();
        let matrix = chain_matrix();
        let mut a = Solution::from_tour(&matrix, vec![0, 1, 2, 3, 0], "x");
        a.computation_time = 1.0;
        let mut b = Solution::from_tour(&matrix, vec![0, 2, 1, 3, 0], "x");
        b.computation_time = 3.0;
        let c = Solution::from_tour(&matrix, vec![0, 1, 0], "x");

        let stats = compute_statistics(&problem, Algorithm::Genetic, &[a, b, c]);
        assert_eq!(stats.num_runs, 3);
        assert_eq!(stats.num_feasible, 2);
        assert_eq!(stats.best_cost, Some(12.0));
        assert_eq!(stats.mean_cost, Some(20.0));
        assert!((stats.std_cost.unwrap() - 11.313708498984761).abs() < 1e-9);
        assert!((stats.mean_time - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.best_route, "1 -> 2 -> 3 -> 4 -> 1");
    }

    #[test]
    fn test_csv_export_and_markdown_summary() {
        let problem = chain_problem();
        let mut benchmark = Benchmark::new(quick_config(2, false));
        benchmark.run(&problem, Algorithm::NearestNeighborTwoOpt).unwrap();

        let csv_path = temp_path("results.csv");
        benchmark.export_to_csv(&csv_path).unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("problem,algorithm,run,seed,cost"));

        let md_path = temp_path("summary.md");
        let _ = std::fs::remove_file(&md_path);
        benchmark.append_markdown_summary(&md_path).unwrap();
        benchmark.append_markdown_summary(&md_path).unwrap();
        let summary = std::fs::read_to_string(&md_path).unwrap();
        assert_eq!(summary.matches("| Problem |").count(), 1);
        assert_eq!(summary.matches("| chain | NN+2-Opt | 12.00 | 12.00 |").count(), 2);

        let report = benchmark.generate_report();
        assert!(report.contains("NN+2-Opt"));

        let _ = std::fs::remove_file(csv_path);
        let _ = std::fs::remove_file(md_path);
    }
}
