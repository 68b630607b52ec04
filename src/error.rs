use std::error::Error;
use std::fmt;

/// Everything that can go wrong when configuring or querying a lattice model.
///
/// All of these are caller-configuration errors and are detected before any
/// cell of the lattice is mutated. There is no retry semantics attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    /// Field kind string is neither "discrete" nor "continuous", or an
    /// operation requiring a discrete field was applied to a continuous one.
    InvalidFieldKind(String),
    /// Boundary mode string is not one of "none", "periodic", "twisted".
    InvalidBoundaryMode(String),
    /// A lattice axis has zero length.
    InvalidDimensions { x_size: usize, y_size: usize },
    /// The discrete field value set is unusable: empty, a singleton where
    /// flip proposals need an alternative, attached to a continuous field,
    /// or missing a value that is already present in the grid.
    InvalidFieldValueSet(String),
    /// Neighbor access without wraparound fell outside the grid.
    OutOfBounds {
        x: isize,
        y: isize,
        x_size: usize,
        y_size: usize,
    },
    /// The temperature schedule is empty, non-positive, non-finite or not
    /// descending.
    InvalidScheduleConfig(String),
    /// A physical parameter (coupling or external field) is NaN or infinite.
    NonFiniteParameter(&'static str),
    /// The requested behaviour is a named but unspecified extension point.
    NotImplemented(&'static str),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFieldKind(detail) => write!(f, "invalid field kind: {detail}"),
            Self::InvalidBoundaryMode(detail) => write!(f, "invalid boundary mode: {detail}"),
            Self::InvalidDimensions { x_size, y_size } => {
                write!(f, "lattice dimensions {x_size}x{y_size} must be at least 1x1")
            }
            Self::InvalidFieldValueSet(detail) => write!(f, "invalid field value set: {detail}"),
            Self::OutOfBounds {
                x,
                y,
                x_size,
                y_size,
            } => write!(
                f,
                "coordinates ({x}, {y}) outside {x_size}x{y_size} grid without wraparound"
            ),
            Self::InvalidScheduleConfig(detail) => {
                write!(f, "invalid temperature schedule: {detail}")
            }
            Self::NonFiniteParameter(name) => write!(f, "parameter '{name}' must be finite"),
            Self::NotImplemented(what) => write!(f, "{what} is not implemented"),
        }
    }
}

impl Error for ModelError {}
