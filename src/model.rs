use crate::error::ModelError;
use crate::lattice::{BoundaryMode, FieldKind, FieldValueSet, Lattice};
use itertools::iproduct;

/// Energy queries a lattice model has to answer.
///
/// Variant Hamiltonians implement this over a `Lattice` by composition; both
/// operations are pure reads.
pub trait EnergyModel {
    /// Total energy of the current configuration.
    fn energy(&self) -> Result<f64, ModelError>;

    /// Contribution of the cell at `(x, y)` to the total energy. Summing
    /// this over every cell reproduces `energy` exactly.
    fn local_energy(&self, x: usize, y: usize) -> Result<f64, ModelError>;
}

/// Generalized Ising Hamiltonian over a discrete 2D lattice:
/// nearest-neighbour coupling `J` plus a uniform external field `h`.
#[derive(Debug)]
pub struct IsingModel {
    coupling: f64,
    external_field: f64,
    field_values: FieldValueSet,
    lattice: Lattice,
}

impl IsingModel {
    /// Wrap `lattice` with physical parameters. The lattice must be discrete,
    /// `coupling` and `external_field` must be finite, and every cell already
    /// in the grid must be a member of `field_values`.
    pub fn new(
        coupling: f64,
        external_field: f64,
        field_values: FieldValueSet,
        lattice: Lattice,
    ) -> Result<Self, ModelError> {
        if !coupling.is_finite() {
            return Err(ModelError::NonFiniteParameter("coupling"));
        }
        if !external_field.is_finite() {
            return Err(ModelError::NonFiniteParameter("external_field"));
        }
        if lattice.field_kind() != FieldKind::Discrete {
            return Err(ModelError::InvalidFieldKind(String::from(
                "the Ising specialization requires a discrete field",
            )));
        }

        let (x_size, y_size) = lattice.shape();
        for (x, y) in iproduct!(0..x_size, 0..y_size) {
            let cell = lattice.spin(x, y)?;
            if !field_values.contains(cell) {
                return Err(ModelError::InvalidFieldValueSet(format!(
                    "cell ({x}, {y}) holds {cell}, which is outside the value set"
                )));
            }
        }

        Ok(IsingModel {
            coupling,
            external_field,
            field_values,
            lattice,
        })
    }

    /// The reference parameterization: J = 1, h = 0, values {-1, 1}.
    pub fn with_defaults(lattice: Lattice) -> Result<Self, ModelError> {
        Self::new(1., 0., FieldValueSet::default(), lattice)
    }

    /// Build lattice and model in one step from externally supplied
    /// parameters. Field kind and boundary mode arrive as strings, the value
    /// set is optional and defaults to {-1, 1}. Supplying a value set
    /// together with a continuous field kind is rejected.
    pub fn from_parameters(
        dimensions: (usize, usize),
        field_kind: &str,
        boundary_mode: &str,
        field_values: Option<Vec<i8>>,
        coupling: f64,
        external_field: f64,
    ) -> Result<Self, ModelError> {
        let kind = FieldKind::try_from(field_kind)?;
        let mode = BoundaryMode::try_from(boundary_mode)?;
        if kind == FieldKind::Continuous && field_values.is_some() {
            return Err(ModelError::InvalidFieldValueSet(String::from(
                "cannot infer discrete values for a continuous field",
            )));
        }

        let values = match field_values {
            Some(values) => FieldValueSet::new(values)?,
            None => FieldValueSet::default(),
        };
        let lattice = Lattice::new(dimensions, kind, mode)?;
        Self::new(coupling, external_field, values, lattice)
    }

    pub fn get_coupling(&self) -> f64 {
        self.coupling
    }

    pub fn get_external_field(&self) -> f64 {
        self.external_field
    }

    pub fn get_field_values(&self) -> &FieldValueSet {
        &self.field_values
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Hand the minimized configuration back to the caller.
    pub fn into_lattice(self) -> Lattice {
        self.lattice
    }

    pub fn describe(&self) -> String {
        let (x_size, y_size) = self.lattice.shape();
        format!(
            "{}x{} Ising configuration (J = {}, h = {})",
            x_size, y_size, self.coupling, self.external_field
        )
    }

    /// Overwrite the configuration with an i.i.d. uniform draw from the
    /// attached value set.
    pub fn randomize<R: rand::Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), ModelError> {
        self.lattice.randomize(&self.field_values, rng)
    }

    fn sum_neighbouring_values(&self, x: usize, y: usize) -> Result<f64, ModelError> {
        let (xi, yi) = (x as isize, y as isize);
        Ok(self.lattice.at(xi, yi - 1)?
            + self.lattice.at(xi, yi + 1)?
            + self.lattice.at(xi - 1, yi)?
            + self.lattice.at(xi + 1, yi)?)
    }

    // counts every bond twice when summed over all cells, hence the 0.5
    // weighting in local_energy
    fn local_interaction_energy(&self, x: usize, y: usize) -> Result<f64, ModelError> {
        let centre = self.lattice.at(x as isize, y as isize)?;
        Ok(-self.coupling * centre * self.sum_neighbouring_values(x, y)?)
    }

    fn local_external_energy(&self, x: usize, y: usize) -> Result<f64, ModelError> {
        Ok(-self.external_field * self.lattice.at(x as isize, y as isize)?)
    }

    /// Energy change of replacing the cell at `(x, y)` with `candidate`,
    /// in O(1) instead of recomputing the full O(N) sum.
    pub fn delta_energy(&self, x: usize, y: usize, candidate: i8) -> Result<f64, ModelError> {
        let old = self.lattice.at(x as isize, y as isize)?;
        let change = candidate as f64 - old;
        let mut neighbour_sum = self.sum_neighbouring_values(x, y)?;
        // on a size-1 periodic axis both lookups on that axis wrap back to
        // the flipping cell itself; the self-bond is quadratic in the cell
        // value, so those neighbour entries move halfway with the flip
        let self_neighbours = self.num_self_neighbours();
        if self_neighbours > 0 {
            neighbour_sum += self_neighbours as f64 * change / 2.;
        }
        Ok(change * (-self.coupling * neighbour_sum - self.external_field))
    }

    /// How often the cell at `(x, y)` appears in its own neighbour list.
    /// Non-zero only for periodic lattices with a size-1 axis.
    fn num_self_neighbours(&self) -> usize {
        if self.lattice.boundary_mode() != BoundaryMode::Periodic {
            return 0;
        }
        let (x_size, y_size) = self.lattice.shape();
        2 * usize::from(x_size == 1) + 2 * usize::from(y_size == 1)
    }

    pub(crate) fn spin(&self, x: usize, y: usize) -> Result<i8, ModelError> {
        self.lattice.spin(x, y)
    }

    pub(crate) fn set_spin(&mut self, x: usize, y: usize, value: i8) {
        self.lattice.set_spin(x, y, value);
    }
}

impl EnergyModel for IsingModel {
    fn energy(&self) -> Result<f64, ModelError> {
        let (x_size, y_size) = self.lattice.shape();
        let mut total = 0.;
        for (x, y) in iproduct!(0..x_size, 0..y_size) {
            total += self.local_energy(x, y)?;
        }
        Ok(total)
    }

    fn local_energy(&self, x: usize, y: usize) -> Result<f64, ModelError> {
        Ok(0.5 * self.local_interaction_energy(x, y)? + self.local_external_energy(x, y)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn periodic_lattice(x_size: usize, y_size: usize) -> Lattice {
        Lattice::new((x_size, y_size), FieldKind::Discrete, BoundaryMode::Periodic).unwrap()
    }

    // the test lattice looks like
    //  1, -1,  1
    //  1,  1,  1
    // -1, -1,  1
    fn build_test_model(coupling: f64, external_field: f64) -> IsingModel {
        let mut lattice = periodic_lattice(3, 3);
        lattice.set_spin(0, 1, -1);
        lattice.set_spin(2, 0, -1);
        lattice.set_spin(2, 1, -1);
        IsingModel::new(coupling, external_field, FieldValueSet::default(), lattice).unwrap()
    }

    #[test]
    fn uniform_2x2_energy_is_minus_eight() {
        // each cell sees four neighbours equal to 1, so the interaction term
        // is -4 per cell, weighted by 0.5 and summed over 4 cells
        let model = IsingModel::with_defaults(periodic_lattice(2, 2)).unwrap();

        assert_relative_eq!(model.energy().unwrap(), -8., epsilon = f64::EPSILON);
    }

    #[test]
    fn uniform_2x2_energy_with_external_field() {
        let model =
            IsingModel::new(1., 0.5, FieldValueSet::default(), periodic_lattice(2, 2)).unwrap();

        // interaction -8 plus -0.5 external energy for each of the 4 cells
        assert_relative_eq!(model.energy().unwrap(), -10., epsilon = f64::EPSILON);
    }

    #[test]
    fn energy_matches_brute_force_local_sum() {
        let model = build_test_model(1.5, -0.25);

        let mut brute_force = 0.;
        for x in 0..3 {
            for y in 0..3 {
                brute_force += model.local_energy(x, y).unwrap();
            }
        }

        assert_relative_eq!(model.energy().unwrap(), brute_force, epsilon = 1e-12);
    }

    #[test]
    fn local_interaction_energies() {
        let model = build_test_model(1.5, 0.);

        assert_relative_eq!(
            model.local_interaction_energy(0, 0).unwrap(),
            0.,
            epsilon = f64::EPSILON
        );
        assert_relative_eq!(
            model.local_interaction_energy(1, 1).unwrap(),
            0.,
            epsilon = f64::EPSILON
        );
        // neighbours of (2, 2): (2, 1) = -1, (2, 0) = -1, (1, 2) = 1, (0, 2) = 1
        assert_relative_eq!(
            model.local_interaction_energy(2, 2).unwrap(),
            0.,
            epsilon = f64::EPSILON
        );
        // neighbours of (1, 2): all 1, centre 1
        assert_relative_eq!(
            model.local_interaction_energy(1, 2).unwrap(),
            -6.,
            epsilon = f64::EPSILON
        );
    }

    #[test]
    fn external_energy_follows_the_field() {
        let model = build_test_model(1., 2.);

        assert_relative_eq!(
            model.local_external_energy(0, 0).unwrap(),
            -2.,
            epsilon = f64::EPSILON
        );
        assert_relative_eq!(
            model.local_external_energy(0, 1).unwrap(),
            2.,
            epsilon = f64::EPSILON
        );
    }

    #[test]
    fn delta_energy_matches_full_recomputation() {
        let mut model = build_test_model(1.5, 0.75);

        for &(x, y, candidate) in &[(0usize, 0usize, -1i8), (1, 2, -1), (0, 1, 1), (2, 2, -1)] {
            let before = model.energy().unwrap();
            let predicted = model.delta_energy(x, y, candidate).unwrap();

            let old = model.spin(x, y).unwrap();
            model.set_spin(x, y, candidate);
            let after = model.energy().unwrap();
            model.set_spin(x, y, old);

            assert_relative_eq!(after - before, predicted, epsilon = 1e-9);
        }
    }

    #[test]
    fn delta_energy_accounts_for_self_neighbours_on_a_single_row() {
        // on a 1xN periodic lattice the x neighbours of a cell are the cell
        // itself; the self-bond must not be billed as a regular neighbour
        let mut model = IsingModel::with_defaults(periodic_lattice(1, 4)).unwrap();

        let before = model.energy().unwrap();
        let predicted = model.delta_energy(0, 0, -1).unwrap();
        model.set_spin(0, 0, -1);
        let after = model.energy().unwrap();

        assert_relative_eq!(predicted, 4., epsilon = f64::EPSILON);
        assert_relative_eq!(after - before, predicted, epsilon = 1e-12);
    }

    #[test]
    fn delta_energy_matches_recomputation_on_degenerate_lattices() {
        // single row, single column, the 1x1 lattice where a cell is its own
        // neighbour on both axes, and the 1x2 with a doubled real neighbour
        for (x_size, y_size) in [(4usize, 1usize), (1, 4), (1, 1), (1, 2)] {
            let mut lattice = periodic_lattice(x_size, y_size);
            if x_size * y_size > 1 {
                lattice.set_spin(x_size - 1, y_size - 1, -1);
            }
            let mut model =
                IsingModel::new(1.25, 0.5, FieldValueSet::default(), lattice).unwrap();

            for x in 0..x_size {
                for y in 0..y_size {
                    let old = model.spin(x, y).unwrap();
                    let candidate = -old;

                    let before = model.energy().unwrap();
                    let predicted = model.delta_energy(x, y, candidate).unwrap();
                    model.set_spin(x, y, candidate);
                    let after = model.energy().unwrap();
                    model.set_spin(x, y, old);

                    assert_relative_eq!(after - before, predicted, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn delta_energy_with_asymmetric_values_on_a_single_row() {
        // values where candidate + old does not cancel exercise the
        // quadratic part of the self-bond
        let mut lattice = periodic_lattice(1, 3);
        for y in 0..3 {
            lattice.set_spin(0, y, 2);
        }
        let values = FieldValueSet::new(vec![0, 2]).unwrap();
        let mut model = IsingModel::new(0.75, 0.25, values, lattice).unwrap();

        for y in 0..3 {
            let before = model.energy().unwrap();
            let predicted = model.delta_energy(0, y, 0).unwrap();
            model.set_spin(0, y, 0);
            let after = model.energy().unwrap();
            model.set_spin(0, y, 2);

            assert_relative_eq!(after - before, predicted, epsilon = 1e-9);
        }
    }

    #[test]
    fn delta_energy_is_zero_for_identity_flip() {
        let model = build_test_model(2., 1.);

        assert_relative_eq!(
            model.delta_energy(1, 1, 1).unwrap(),
            0.,
            epsilon = f64::EPSILON
        );
    }

    #[test]
    fn aligned_2x2_beats_any_single_flip() {
        let aligned = IsingModel::with_defaults(periodic_lattice(2, 2)).unwrap();
        let aligned_energy = aligned.energy().unwrap();

        for x in 0..2 {
            for y in 0..2 {
                let mut lattice = periodic_lattice(2, 2);
                lattice.set_spin(x, y, -1);
                let flipped = IsingModel::with_defaults(lattice).unwrap();
                assert!(
                    aligned_energy < flipped.energy().unwrap(),
                    "flipping ({x}, {y}) should raise the energy"
                );
            }
        }
    }

    #[test]
    fn rejects_continuous_lattice() {
        let lattice = Lattice::new((3, 3), FieldKind::Continuous, BoundaryMode::Periodic).unwrap();

        assert!(matches!(
            IsingModel::new(1., 0., FieldValueSet::default(), lattice),
            Err(ModelError::InvalidFieldKind(_))
        ));
    }

    #[test]
    fn rejects_non_finite_parameters() {
        assert_eq!(
            IsingModel::new(
                f64::NAN,
                0.,
                FieldValueSet::default(),
                periodic_lattice(2, 2)
            )
            .err()
            .unwrap(),
            ModelError::NonFiniteParameter("coupling")
        );
        assert_eq!(
            IsingModel::new(
                1.,
                f64::INFINITY,
                FieldValueSet::default(),
                periodic_lattice(2, 2)
            )
            .err()
            .unwrap(),
            ModelError::NonFiniteParameter("external_field")
        );
    }

    #[test]
    fn rejects_cells_outside_the_value_set() {
        // a fresh lattice is all ones, which {-2, 2} does not contain
        let values = FieldValueSet::new(vec![-2, 2]).unwrap();

        assert!(matches!(
            IsingModel::new(1., 0., values, periodic_lattice(2, 2)),
            Err(ModelError::InvalidFieldValueSet(_))
        ));
    }

    #[test]
    fn from_parameters_builds_a_model() {
        let model =
            IsingModel::from_parameters((4, 3), "discrete", "periodic", None, 2., -1.).unwrap();

        assert_eq!(model.lattice().shape(), (4, 3));
        assert_relative_eq!(model.get_coupling(), 2., epsilon = f64::EPSILON);
        assert_relative_eq!(model.get_external_field(), -1., epsilon = f64::EPSILON);
        assert_eq!(model.get_field_values().values(), &[-1, 1]);
    }

    #[test]
    fn from_parameters_rejects_values_on_continuous_field() {
        assert!(matches!(
            IsingModel::from_parameters((3, 3), "continuous", "periodic", Some(vec![-1, 1]), 1., 0.),
            Err(ModelError::InvalidFieldValueSet(_))
        ));
    }

    #[test]
    fn from_parameters_rejects_unknown_strings() {
        assert!(matches!(
            IsingModel::from_parameters((3, 3), "spinor", "periodic", None, 1., 0.),
            Err(ModelError::InvalidFieldKind(_))
        ));
        assert!(matches!(
            IsingModel::from_parameters((3, 3), "discrete", "moebius", None, 1., 0.),
            Err(ModelError::InvalidBoundaryMode(_))
        ));
    }

    #[test]
    fn energy_on_none_boundary_surfaces_out_of_bounds() {
        let lattice = Lattice::new((3, 3), FieldKind::Discrete, BoundaryMode::None).unwrap();
        let model = IsingModel::with_defaults(lattice).unwrap();

        assert!(matches!(
            model.energy(),
            Err(ModelError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn describe_names_the_parameters() {
        let model = build_test_model(1.5, 0.);

        assert_eq!(model.describe(), "3x3 Ising configuration (J = 1.5, h = 0)");
    }
}
