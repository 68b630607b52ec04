pub mod annealing;
pub mod error;
pub mod lattice;
pub mod model;
pub mod vis;
