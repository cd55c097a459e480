//! Loading problem data from CSV files.
//!
//! The data files are spreadsheet exports: a cost matrix whose rows start
//! with a 1-based city id (cells may use a decimal comma, an empty cell means
//! 0 and any other non-numeric cell blocks the pair), and a city-name file
//! with `id, name` pairs in columns 0/1 and 2/3.
//!
//! Twelve predefined problems pick a matrix kind and a set of city ids from
//! those files; [`Problem`] holds the extracted sub-matrix and translates
//! solver routes back to ids and names.

use crate::error::{Error, Result};
use crate::matrix::{Cost, CostMatrix};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the city-name file inside a data directory
pub const CITIES_FILE: &str = "PCV__Matriz_do_problema - Cidades.csv";

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

/// Decode a field as UTF-8, falling back to latin-1 for legacy exports.
fn decode_field(field: &[u8]) -> String {
    match std::str::from_utf8(field) {
        Ok(text) => text.to_string(),
        Err(_) => field.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Decode one CSV record, tolerating non-UTF-8 (latin-1) exports.
fn record_cells(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| {
            decode_field(field)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect()
}

fn parse_id(cell: &str) -> Option<usize> {
    if !cell.is_empty() && cell.bytes().all(|b| b.is_ascii_digit()) {
        cell.parse().ok()
    } else {
        None
    }
}

/// Parse a matrix cell: empty is 0, `"38,8"` is 38.8, anything else non-numeric is unreachable.
pub fn parse_cost_cell(cell: &str) -> Cost {
    let cell = cell.trim();
    if cell.is_empty() {
        return Cost::ZERO;
    }
    match cell.replace(',', ".").parse::<f64>() {
        Ok(value) => Cost::from_f64(value),
        Err(_) => Cost::Unreachable,
    }
}

impl CostMatrix {
    /// Load a matrix from a CSV file (see the module documentation for the format).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Read a matrix from any CSV source.
    ///
    /// Only rows whose first cell is an integer id are used. The dimension is
    /// the largest id; missing or short rows are padded with unreachable
    /// cells and long rows are truncated.
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rows: HashMap<usize, Vec<Cost>> = HashMap::new();
        let mut max_id = 0;

        for record in csv_reader(reader).byte_records() {
            let cells = record_cells(&record?);
            let Some(id) = cells.first().and_then(|c| parse_id(c)) else {
                continue;
            };
            max_id = max_id.max(id);
            rows.insert(id, cells[1..].iter().map(|c| parse_cost_cell(c)).collect());
        }

        if max_id == 0 {
            return Err(Error::invalid_matrix("no numbered rows found"));
        }

        let costs = (1..=max_id)
            .map(|id| {
                let mut row = rows.remove(&id).unwrap_or_default();
                row.resize(max_id, Cost::Unreachable);
                row
            })
            .collect();

        let matrix = CostMatrix::new(costs)?;
        log::debug!("Loaded {} x {} cost matrix", max_id, max_id);
        Ok(matrix)
    }

    /// Extract the rows and columns of the given 1-based city ids, in order.
    ///
    /// Ids outside the matrix give unreachable cells.
    pub fn submatrix(&self, ids: &[usize]) -> CostMatrix {
        let n = self.len();
        let index = |id: usize| id.checked_sub(1).filter(|&i| i < n);

        let costs = ids
            .iter()
            .map(|&row_id| {
                ids.iter()
                    .map(|&col_id| match (index(row_id), index(col_id)) {
                        (Some(i), Some(j)) => self.cost(i, j),
                        _ => Cost::Unreachable,
                    })
                    .collect()
            })
            .collect();
        CostMatrix::from_validated(costs)
    }
}

/// City names keyed by 1-based id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityNames {
    names: BTreeMap<usize, String>,
}

impl CityNames {
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Read `(id, name)` pairs from columns 0/1 and 2/3 of every row.
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut names = BTreeMap::new();
        for record in csv_reader(reader).byte_records() {
            let cells = record_cells(&record?);
            for pair in cells.chunks(2).take(2) {
                if let [id, name] = pair {
                    if let Some(id) = parse_id(id) {
                        names.insert(id, name.clone());
                    }
                }
            }
        }
        Ok(CityNames { names })
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// The city's name, or `ID<id>` when unknown
    pub fn name_or_id(&self, id: usize) -> String {
        self.get(id).map_or_else(|| format!("ID{}", id), str::to_string)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Which of the two matrices a problem uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatrixKind {
    /// Distances in kilometres
    Km,
    /// Travel times in minutes
    Min,
}

impl MatrixKind {
    pub fn file_name(self) -> &'static str {
        match self {
            MatrixKind::Km => "PCV__Matriz_do_problema - Km.csv",
            MatrixKind::Min => "PCV__Matriz_do_problema - Min.csv",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MatrixKind::Km => "Km",
            MatrixKind::Min => "Min",
        }
    }
}

/// One of the twelve predefined problems
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub id: usize,
    pub kind: MatrixKind,
    /// 1-based city ids, in matrix order
    pub cities: Vec<usize>,
}

impl ProblemSpec {
    pub const COUNT: usize = 12;

    /// Problems 1..=12: Km for odd ids, Min for even ids, over 48, 36, 24, 12,
    /// the seven cities {1, 7..=12} and 6 cities.
    pub fn by_id(id: usize) -> Result<Self> {
        let cities: Vec<usize> = match id {
            1 | 2 => (1..=48).collect(),
            3 | 4 => (1..=36).collect(),
            5 | 6 => (1..=24).collect(),
            7 | 8 => (1..=12).collect(),
            9 | 10 => vec![1, 7, 8, 9, 10, 11, 12],
            11 | 12 => (1..=6).collect(),
            _ => return Err(Error::UnknownProblem(id)),
        };
        let kind = if id % 2 == 1 { MatrixKind::Km } else { MatrixKind::Min };
        Ok(ProblemSpec { id, kind, cities })
    }

    pub fn all() -> Vec<ProblemSpec> {
        (1..=Self::COUNT).filter_map(|id| Self::by_id(id).ok()).collect()
    }

    /// Short label such as `3 (Km)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.id, self.kind.unit())
    }
}

/// A solvable problem: the sub-matrix plus the ids and names needed to report routes
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    /// 1-based id of each local index
    pub ids: Vec<usize>,
    pub matrix: CostMatrix,
    pub names: CityNames,
}

impl Problem {
    /// Restrict `full` to `ids` (1-based).
    pub fn new(name: impl Into<String>, full: &CostMatrix, ids: Vec<usize>, names: CityNames) -> Self {
        let matrix = full.submatrix(&ids);
        Problem {
            name: name.into(),
            ids,
            matrix,
            names,
        }
    }

    /// Use the whole matrix, ids `1..=n`.
    pub fn from_matrix(name: impl Into<String>, matrix: CostMatrix, names: CityNames) -> Self {
        let ids = (1..=matrix.len()).collect();
        Problem {
            name: name.into(),
            ids,
            matrix,
            names,
        }
    }

    /// Load a predefined problem from `data_dir`.
    ///
    /// A missing or unreadable city-name file only costs the names.
    pub fn load<P: AsRef<Path>>(spec: &ProblemSpec, data_dir: P) -> Result<Self> {
        let dir = data_dir.as_ref();
        let full = CostMatrix::from_csv(dir.join(spec.kind.file_name()))?;
        let names = load_names_or_default(&dir.join(CITIES_FILE));

        log::info!(
            "Problem {}: {} cities from {}",
            spec.label(),
            spec.cities.len(),
            spec.kind.file_name()
        );
        Ok(Problem::new(spec.label(), &full, spec.cities.clone(), names))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Map local route indices to city ids
    pub fn route_ids(&self, route: &[usize]) -> Vec<usize> {
        route.iter().map(|&i| self.ids[i]).collect()
    }

    /// Map local route indices to city names
    pub fn route_names(&self, route: &[usize]) -> Vec<String> {
        route.iter().map(|&i| self.names.name_or_id(self.ids[i])).collect()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem: {}", self.name)?;
        writeln!(f, "  Cities ({}): {:?}", self.ids.len(), self.ids)?;
        write!(f, "{}", self.matrix.statistics())
    }
}

/// Read city names, logging and falling back to an empty table on failure.
pub fn load_names_or_default(path: &Path) -> CityNames {
    match CityNames::from_csv(path) {
        Ok(names) => names,
        Err(e) => {
            log::warn!("Could not read city names from {}: {}", path.display(), e);
            CityNames::default()
        }
    }
}
