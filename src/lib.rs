//! TSP Solver Library
//!
//! Heuristic solver for the Traveling Salesman Problem over explicit cost
//! matrices, where some pairs of cities may be unreachable.
//!
//! # Features
//!
//! - Construction heuristics (Nearest Neighbor, Cheapest Insertion)
//! - Local search (full 2-opt, bounded shift/swap/inversion/2-opt searches)
//! - Genetic and memetic algorithms (tournament/roulette, OX/PMX, elitism)
//! - CSV loading of cost matrices and city names, predefined problems
//! - Multi-run benchmarking with CSV and Markdown reports
//!
//! # Example
//!
//! ```no_run
//! use tsp_solver::heuristics::genetic::{GAConfig, GeneticAlgorithm};
//! use tsp_solver::matrix::CostMatrix;
//!
//! let matrix = CostMatrix::from_csv("PCV__Matriz_do_problema - Km.csv").unwrap();
//! let sub = matrix.submatrix(&[1, 2, 3, 4, 5, 6]);
//!
//! let mut ga = GeneticAlgorithm::new(&sub, GAConfig::default()).unwrap();
//! let result = ga.run();
//!
//! println!("Best route: {:?}, cost {:.2}", result.best_route, result.best_cost);
//! ```

pub mod error;
pub mod matrix;
pub mod solution;
pub mod instance;
pub mod heuristics;
pub mod benchmark;

pub use error::{Error, Result};
pub use matrix::{Cost, CostMatrix};
pub use solution::Solution;
