//! TSP Solver - Command Line Interface
//!
//! Solves the predefined route problems (or any CSV cost matrix) with
//! nearest neighbor + 2-opt, cheapest insertion, a genetic algorithm or a
//! memetic algorithm, over repeated seeded runs.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tsp_solver::benchmark::{self, AlgorithmStatistics, Benchmark, BenchmarkConfig};
use tsp_solver::error::{Error, Result};
use tsp_solver::heuristics::construction::*;
use tsp_solver::heuristics::genetic::GAConfig;
use tsp_solver::heuristics::local_search::{LocalSearchPolicy, MoveKind, TwoOptSearch};
use tsp_solver::heuristics::operators::{CrossoverType, MutationType, SelectionType};
use tsp_solver::instance::{self, CityNames, Problem, ProblemSpec};
use tsp_solver::matrix::CostMatrix;

use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tsp-solver")]
#[command(version = "1.0")]
#[command(about = "Heuristic solver for the Traveling Salesman Problem over cost matrices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one problem with repeated seeded runs
    Solve {
        #[command(flatten)]
        source: ProblemSource,

        /// Algorithm to use
        #[arg(short, long, value_enum, default_value = "nn-two-opt")]
        algorithm: Algorithm,

        /// Number of independent runs
        #[arg(short, long, default_value = "20")]
        runs: usize,

        /// Seed of the first run (run i uses seed + i)
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Run sequentially instead of in parallel
        #[arg(long)]
        sequential: bool,

        #[command(flatten)]
        ga: GaArgs,

        /// Write the statistics and best route as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append a row to a Markdown summary table
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Export per-run results to CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Run every algorithm on the predefined problems
    Benchmark {
        /// Directory containing the matrix and city-name files
        #[arg(short, long, default_value = ".")]
        data_dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Problems to run (default: all twelve)
        #[arg(short, long, value_delimiter = ',')]
        problems: Vec<usize>,

        /// Algorithms to run (default: all four)
        #[arg(short, long, value_enum, value_delimiter = ',')]
        algorithms: Vec<Algorithm>,

        /// Number of runs per algorithm
        #[arg(short, long, default_value = "20")]
        runs: usize,

        /// Seed of the first run
        #[arg(short, long, default_value = "0")]
        seed: u64,

        #[command(flatten)]
        ga: GaArgs,
    },

    /// Analyze a problem's cost matrix
    Analyze {
        #[command(flatten)]
        source: ProblemSource,
    },
}

/// Where the cost matrix comes from
#[derive(Args)]
struct ProblemSource {
    /// Predefined problem (1..=12)
    #[arg(short, long, conflicts_with = "matrix")]
    problem: Option<usize>,

    /// Cost matrix CSV file
    #[arg(short, long)]
    matrix: Option<PathBuf>,

    /// City ids to keep from the matrix (1-based, comma separated)
    #[arg(long, value_delimiter = ',', requires = "matrix")]
    cities: Option<Vec<usize>>,

    /// City-name CSV file (default: the names file in the data directory)
    #[arg(long)]
    names: Option<PathBuf>,

    /// Directory containing the matrix and city-name files
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,
}

/// Genetic / memetic parameters (unset flags keep the algorithm's defaults)
#[derive(Args)]
struct GaArgs {
    /// Population size
    #[arg(long)]
    population: Option<usize>,

    /// Number of generations
    #[arg(long)]
    generations: Option<usize>,

    /// Crossover probability
    #[arg(long)]
    crossover_prob: Option<f64>,

    /// Mutation probability
    #[arg(long)]
    mutation_prob: Option<f64>,

    /// Parent selection method
    #[arg(long, value_enum)]
    selection: Option<Selection>,

    /// Tournament size
    #[arg(long)]
    tournament_size: Option<usize>,

    /// Crossover operator
    #[arg(long, value_enum)]
    crossover: Option<Crossover>,

    /// Mutation operator
    #[arg(long, value_enum)]
    mutation: Option<Mutation>,

    /// Elitism rate
    #[arg(long)]
    elitism: Option<f64>,

    /// Keep this city (local index) at the start of every route
    #[arg(long)]
    fixed_start: Option<usize>,

    /// Do not seed the population with nearest-neighbor tours
    #[arg(long)]
    no_heuristic: bool,

    /// Local search applied to memetic offspring
    #[arg(long, value_enum)]
    local_search: Option<LocalSearchArg>,

    /// Stop after this many generations without improvement
    #[arg(long)]
    max_no_improve: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Algorithm {
    /// Nearest Neighbor + 2-Opt
    NnTwoOpt,
    /// Cheapest Insertion
    Insertion,
    /// Genetic Algorithm
    Ga,
    /// Memetic Algorithm
    Memetic,
}

impl From<Algorithm> for benchmark::Algorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::NnTwoOpt => benchmark::Algorithm::NearestNeighborTwoOpt,
            Algorithm::Insertion => benchmark::Algorithm::CheapestInsertion,
            Algorithm::Ga => benchmark::Algorithm::Genetic,
            Algorithm::Memetic => benchmark::Algorithm::Memetic,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Selection {
    Tournament,
    Roulette,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Crossover {
    /// Order crossover
    Ox,
    /// Partially mapped crossover
    Pmx,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Mutation {
    Swap,
    Inversion,
    Shift,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum LocalSearchArg {
    /// Random choice per pair of children
    Random,
    Shift,
    Swap,
    Inversion,
    TwoOpt,
    /// Full 2-opt descent
    FullTwoOpt,
}

impl GaArgs {
    /// Apply the set flags on top of `config`.
    fn apply(&self, mut config: GAConfig) -> GAConfig {
        if let Some(v) = self.population {
            config.population_size = v;
        }
        if let Some(v) = self.generations {
            config.max_generations = v;
        }
        if let Some(v) = self.crossover_prob {
            config.crossover_prob = v;
        }
        if let Some(v) = self.mutation_prob {
            config.mutation_prob = v;
        }
        if let Some(v) = self.selection {
            config.selection_type = match v {
                Selection::Tournament => SelectionType::Tournament,
                Selection::Roulette => SelectionType::Roulette,
            };
        }
        if let Some(v) = self.tournament_size {
            config.tournament_size = v;
        }
        if let Some(v) = self.crossover {
            config.crossover_type = match v {
                Crossover::Ox => CrossoverType::Order,
                Crossover::Pmx => CrossoverType::PartiallyMapped,
            };
        }
        if let Some(v) = self.mutation {
            config.mutation_type = match v {
                Mutation::Swap => MutationType::Swap,
                Mutation::Inversion => MutationType::Inversion,
                Mutation::Shift => MutationType::Shift,
            };
        }
        if let Some(v) = self.elitism {
            config.elitism_rate = v;
        }
        if self.fixed_start.is_some() {
            config.fixed_start = self.fixed_start;
        }
        if self.no_heuristic {
            config.use_heuristic = false;
        }
        if let Some(v) = self.local_search {
            config.local_search = Some(match v {
                LocalSearchArg::Random => LocalSearchPolicy::Random,
                LocalSearchArg::Shift => LocalSearchPolicy::Fixed(MoveKind::Shift),
                LocalSearchArg::Swap => LocalSearchPolicy::Fixed(MoveKind::Swap),
                LocalSearchArg::Inversion => LocalSearchPolicy::Fixed(MoveKind::Inversion),
                LocalSearchArg::TwoOpt => LocalSearchPolicy::Fixed(MoveKind::TwoOpt),
                LocalSearchArg::FullTwoOpt => LocalSearchPolicy::FullTwoOpt,
            });
        }
        if self.max_no_improve.is_some() {
            config.max_no_improve = self.max_no_improve;
        }
        config
    }

    fn benchmark_config(&self, runs: usize, seed: u64, parallel: bool) -> BenchmarkConfig {
        let mut genetic = self.apply(GAConfig::default());
        // the local-search flag only concerns the memetic algorithm
        genetic.local_search = None;
        BenchmarkConfig {
            num_runs: runs,
            base_seed: seed,
            parallel,
            show_progress: true,
            genetic,
            memetic: self.apply(GAConfig::memetic()),
        }
    }
}

/// What `solve --output` writes
#[derive(Serialize)]
struct SolveReport<'a> {
    statistics: &'a AlgorithmStatistics,
    route_ids: Vec<usize>,
    route_names: Vec<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { source, algorithm, runs, seed, sequential, ga, output, summary, csv } => {
            solve_problem(&source, algorithm, runs, seed, !sequential, &ga, output, summary, csv)
        }

        Commands::Benchmark { data_dir, output, problems, algorithms, runs, seed, ga } => {
            run_benchmark(&data_dir, &output, problems, algorithms, runs, seed, &ga)
        }

        Commands::Analyze { source } => analyze_problem(&source),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_problem(source: &ProblemSource) -> Result<Problem> {
    let names = |default_dir: &Path| match &source.names {
        Some(path) => CityNames::from_csv(path),
        None => Ok(instance::load_names_or_default(&default_dir.join(instance::CITIES_FILE))),
    };

    if let Some(id) = source.problem {
        let spec = ProblemSpec::by_id(id)?;
        let mut problem = Problem::load(&spec, &source.data_dir)?;
        if source.names.is_some() {
            problem.names = names(source.data_dir.as_path())?;
        }
        return Ok(problem);
    }

    let Some(path) = &source.matrix else {
        return Err(Error::invalid_config("either --problem or --matrix is required"));
    };
    let full = CostMatrix::from_csv(path)?;
    let names = names(path.parent().unwrap_or(source.data_dir.as_path()))?;
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "matrix".to_string());

    Ok(match &source.cities {
        Some(ids) => Problem::new(label, &full, ids.clone(), names),
        None => Problem::from_matrix(label, full, names),
    })
}

#[allow(clippy::too_many_arguments)]
fn solve_problem(
    source: &ProblemSource,
    algorithm: Algorithm,
    runs: usize,
    seed: u64,
    parallel: bool,
    ga: &GaArgs,
    output: Option<PathBuf>,
    summary: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let problem = load_problem(source)?;
    let algorithm = benchmark::Algorithm::from(algorithm);

    println!("[*] Problem {}", problem.name);
    println!("    - Cities ({}): {:?}", problem.len(), problem.ids);
    println!("[*] Running {} runs of {}...", runs, algorithm);

    let mut bench = Benchmark::new(ga.benchmark_config(runs, seed, parallel));
    let stats = bench.run(&problem, algorithm)?;

    let route_ids = problem.route_ids(&stats.best_tour);
    let route_names = problem.route_names(&stats.best_tour);

    println!("{}", "-".repeat(50));
    println!("FINAL RESULT (Problem {})", problem.name);
    print!("{}", stats);
    println!(
        "Route (ids): {}",
        route_ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(" -> ")
    );
    println!("Route (names): {}", route_names.join(" -> "));
    println!("{}", "-".repeat(50));

    if let Some(path) = output {
        let report = SolveReport {
            statistics: &stats,
            route_ids,
            route_names,
        };
        serde_json::to_writer_pretty(File::create(&path)?, &report)?;
        println!("[*] Solution saved to {:?}", path);
    }

    if let Some(path) = csv {
        bench.export_to_csv(&path)?;
        println!("[*] Runs exported to {:?}", path);
    }

    if let Some(path) = summary {
        bench.append_markdown_summary(&path)?;
        println!("[*] Summary appended to {:?}", path);
    }

    Ok(())
}

fn run_benchmark(
    data_dir: &Path,
    output: &Path,
    problems: Vec<usize>,
    algorithms: Vec<Algorithm>,
    runs: usize,
    seed: u64,
    ga: &GaArgs,
) -> Result<()> {
    std::fs::create_dir_all(output)?;

    let specs: Vec<ProblemSpec> = if problems.is_empty() {
        ProblemSpec::all()
    } else {
        problems
            .into_iter()
            .map(ProblemSpec::by_id)
            .collect::<Result<_>>()?
    };
    let algorithms: Vec<benchmark::Algorithm> = if algorithms.is_empty() {
        benchmark::Algorithm::ALL.to_vec()
    } else {
        algorithms.into_iter().map(Into::into).collect()
    };

    let mut bench = Benchmark::new(ga.benchmark_config(runs, seed, true));

    for spec in &specs {
        let problem = match Problem::load(spec, data_dir) {
            Ok(problem) => problem,
            Err(e) => {
                log::warn!("Skipping problem {}: {}", spec.label(), e);
                continue;
            }
        };
        for &algorithm in &algorithms {
            bench.run(&problem, algorithm)?;
        }
    }

    bench.export_to_csv(output.join("results.csv"))?;
    bench.export_statistics_csv(output.join("statistics.csv"))?;
    bench.append_markdown_summary(output.join("resumo_resultados.md"))?;

    println!("{}", bench.generate_report());
    println!("Results saved to {:?}", output);
    Ok(())
}

fn analyze_problem(source: &ProblemSource) -> Result<()> {
    let problem = load_problem(source)?;

    println!("========== Problem Analysis ==========\n");
    println!("{}", problem);

    if problem.is_empty() {
        return Ok(());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let nn_sol = NearestNeighborHeuristic::new().construct(&problem.matrix, &mut rng);
    let two_opt = TwoOptSearch::new().optimize_closed(&problem.matrix, &nn_sol.tour);
    let insertion_sol = CheapestInsertionHeuristic::new().construct(&problem.matrix, &mut rng);

    println!("\nQuick Solution Estimates (start at city {}):", problem.ids[0]);
    println!("  Nearest Neighbor: {:.2} (feasible: {})", nn_sol.cost, nn_sol.feasible);
    println!(
        "  Nearest Neighbor + 2-Opt: {:.2}",
        problem.matrix.route_cost(&two_opt)
    );
    println!(
        "  Cheapest Insertion: {:.2} (feasible: {})",
        insertion_sol.cost, insertion_sol.feasible
    );
    Ok(())
}
