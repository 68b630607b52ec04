use crate::error::ModelError;
use rand::distr::Distribution;

pub const K_BOLTZMANN: f64 = 1.; // using Planck units

/// Per-cell value type of a lattice field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Discrete,
    Continuous,
}

impl TryFrom<&str> for FieldKind {
    type Error = ModelError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "discrete" => Ok(Self::Discrete),
            "continuous" => Ok(Self::Continuous),
            _ => Err(ModelError::InvalidFieldKind(format!(
                "unknown field kind '{s}', expected 'discrete' or 'continuous'"
            ))),
        }
    }
}

/// Rule for resolving neighbour lookups at the grid edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMode {
    /// Out-of-range coordinates are an error.
    None,
    /// Coordinates wrap modulo the dimensions on both axes.
    Periodic,
    /// Wraps like `Periodic` but applies a value transform at the seam.
    /// The transform is an unspecified extension point, so any lookup that
    /// would wrap reports `ModelError::NotImplemented`.
    Twisted,
}

impl TryFrom<&str> for BoundaryMode {
    type Error = ModelError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "none" => Ok(Self::None),
            "periodic" => Ok(Self::Periodic),
            "twisted" => Ok(Self::Twisted),
            _ => Err(ModelError::InvalidBoundaryMode(format!(
                "unknown boundary mode '{s}', expected 'none', 'periodic' or 'twisted'"
            ))),
        }
    }
}

/// The finite set of values a discrete field cell may take.
///
/// Every instance owns its values. The set is deduplicated on construction
/// and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValueSet {
    values: Vec<i8>,
}

impl Default for FieldValueSet {
    fn default() -> Self {
        FieldValueSet {
            values: vec![-1, 1],
        }
    }
}

impl FieldValueSet {
    pub fn new(values: Vec<i8>) -> Result<Self, ModelError> {
        let mut values = values;
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err(ModelError::InvalidFieldValueSet(String::from(
                "value set must not be empty",
            )));
        }
        Ok(FieldValueSet { values })
    }

    pub fn values(&self) -> &[i8] {
        &self.values
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn contains(&self, value: i8) -> bool {
        self.values.contains(&value)
    }

    /// Draw a uniform member of the set.
    pub fn draw<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> i8 {
        self.values[rng.random_range(0..self.values.len())]
    }

    /// Draw a uniform member of the set distinct from `current`.
    ///
    /// If `current` is not a member, this is a plain uniform draw. Fails when
    /// the set holds no alternative to `current`.
    pub fn draw_other<R: rand::Rng + ?Sized>(
        &self,
        current: i8,
        rng: &mut R,
    ) -> Result<i8, ModelError> {
        match self.values.iter().position(|&v| v == current) {
            Some(skip) => {
                if self.values.len() < 2 {
                    return Err(ModelError::InvalidFieldValueSet(String::from(
                        "need at least two distinct values to propose a flip",
                    )));
                }
                // draw an index over the set minus the current value
                let idx = rng.random_range(0..self.values.len() - 1);
                Ok(self.values[if idx >= skip { idx + 1 } else { idx }])
            }
            None => Ok(self.draw(rng)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldGrid {
    Discrete(Vec<Vec<i8>>),
    Continuous(Vec<Vec<f64>>),
}

/// A 2D grid of field values with boundary-aware neighbour access.
///
/// Dimensions are fixed after construction. Cells are overwritten in bulk by
/// `randomize` and one at a time by the minimizer; everything else is a read.
#[derive(Debug, Clone)]
pub struct Lattice {
    x_size: usize,
    y_size: usize,
    boundary_mode: BoundaryMode,
    grid: FieldGrid,
    uniform_x: rand::distr::Uniform<usize>,
    uniform_y: rand::distr::Uniform<usize>,
}

impl Lattice {
    /// Allocate a `dimensions` grid with every cell set to the neutral
    /// value 1 (as an `i8` for discrete fields, an `f64` for continuous).
    pub fn new(
        dimensions: (usize, usize),
        field_kind: FieldKind,
        boundary_mode: BoundaryMode,
    ) -> Result<Self, ModelError> {
        let (x_size, y_size) = dimensions;
        let invalid_dims = ModelError::InvalidDimensions { x_size, y_size };
        if x_size == 0 || y_size == 0 {
            return Err(invalid_dims);
        }

        let grid = match field_kind {
            FieldKind::Discrete => FieldGrid::Discrete(vec![vec![1; y_size]; x_size]),
            FieldKind::Continuous => FieldGrid::Continuous(vec![vec![1.; y_size]; x_size]),
        };

        Ok(Lattice {
            x_size,
            y_size,
            boundary_mode,
            grid,
            uniform_x: rand::distr::Uniform::new(0, x_size).map_err(|_| invalid_dims.clone())?,
            uniform_y: rand::distr::Uniform::new(0, y_size).map_err(|_| invalid_dims)?,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.x_size, self.y_size)
    }

    pub fn field_kind(&self) -> FieldKind {
        match self.grid {
            FieldGrid::Discrete(_) => FieldKind::Discrete,
            FieldGrid::Continuous(_) => FieldKind::Continuous,
        }
    }

    pub fn boundary_mode(&self) -> BoundaryMode {
        self.boundary_mode
    }

    fn resolve(&self, x: isize, y: isize) -> Result<(usize, usize), ModelError> {
        let in_range = x >= 0 && y >= 0 && (x as usize) < self.x_size && (y as usize) < self.y_size;
        match self.boundary_mode {
            BoundaryMode::Periodic => Ok((
                x.rem_euclid(self.x_size as isize) as usize,
                y.rem_euclid(self.y_size as isize) as usize,
            )),
            BoundaryMode::None if in_range => Ok((x as usize, y as usize)),
            BoundaryMode::None => Err(ModelError::OutOfBounds {
                x,
                y,
                x_size: self.x_size,
                y_size: self.y_size,
            }),
            BoundaryMode::Twisted if in_range => Ok((x as usize, y as usize)),
            BoundaryMode::Twisted => Err(ModelError::NotImplemented("twisted boundary transform")),
        }
    }

    /// Read the cell at `(x, y)` after normalizing the coordinates according
    /// to the boundary mode. `rem_euclid` keeps the periodic wrap
    /// non-negative, so `at(-1, 0)` reads row `x_size - 1`.
    pub fn at(&self, x: isize, y: isize) -> Result<f64, ModelError> {
        let (xr, yr) = self.resolve(x, y)?;
        Ok(match &self.grid {
            FieldGrid::Discrete(cells) => cells[xr][yr] as f64,
            FieldGrid::Continuous(cells) => cells[xr][yr],
        })
    }

    /// Overwrite every cell independently with a uniform draw from `values`.
    pub fn randomize<R: rand::Rng + ?Sized>(
        &mut self,
        values: &FieldValueSet,
        rng: &mut R,
    ) -> Result<(), ModelError> {
        match &mut self.grid {
            FieldGrid::Discrete(cells) => {
                for row in cells.iter_mut() {
                    for cell in row.iter_mut() {
                        *cell = values.draw(rng);
                    }
                }
                Ok(())
            }
            FieldGrid::Continuous(_) => Err(ModelError::InvalidFieldValueSet(String::from(
                "cannot fill a continuous field from a discrete value set",
            ))),
        }
    }

    /// Pick a cell uniformly at random.
    pub fn draw_random_site<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        (self.uniform_x.sample(rng), self.uniform_y.sample(rng))
    }

    /// Read-only snapshot of the grid as rows of `f64`, for rendering.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        match &self.grid {
            FieldGrid::Discrete(cells) => cells
                .iter()
                .map(|row| row.iter().map(|&v| v as f64).collect())
                .collect(),
            FieldGrid::Continuous(cells) => cells.clone(),
        }
    }

    pub fn is_state_equal(&self, other: &Self) -> bool {
        self.grid == other.grid
    }

    /// Discrete in-range read, used by the minimizer on already-resolved
    /// coordinates.
    pub(crate) fn spin(&self, x: usize, y: usize) -> Result<i8, ModelError> {
        match &self.grid {
            FieldGrid::Discrete(cells) => Ok(cells[x][y]),
            FieldGrid::Continuous(_) => Err(ModelError::InvalidFieldKind(String::from(
                "spin access requires a discrete field",
            ))),
        }
    }

    pub(crate) fn set_spin(&mut self, x: usize, y: usize, value: i8) {
        if let FieldGrid::Discrete(cells) = &mut self.grid {
            cells[x][y] = value;
        }
    }
}
