use lattice_mc::annealing::{metropolis_minimize, AnnealSettings, Schedule};
use lattice_mc::error::ModelError;
use lattice_mc::lattice::{BoundaryMode, FieldKind, FieldValueSet, Lattice};
use lattice_mc::model::IsingModel;
use lattice_mc::vis;
use rand;

pub fn main() -> Result<(), ModelError> {
    tracing_subscriber::fmt::init();

    let mut rng = rand::rng();

    let lattice = Lattice::new((50, 50), FieldKind::Discrete, BoundaryMode::Periodic)?;
    let mut model = IsingModel::new(1., 0., FieldValueSet::default(), lattice)?;
    model.randomize(&mut rng)?;

    vis::plot_configuration(model.lattice(), &model.describe(), true, None);

    let schedule = Schedule::geometric(3., 0.05, 40)?;
    let settings = AnnealSettings::new(schedule, 50 * 50 * 20).with_early_stop(5);

    let result = metropolis_minimize(&mut model, &settings, &mut rng)?;

    println!("initial energy: {}", result.get_initial_energy());
    println!("final energy:   {}", result.get_final_energy());
    if result.get_is_stopped_early() {
        println!("search stalled before the schedule was exhausted");
    }

    vis::plot_configuration(model.lattice(), &model.describe(), true, None);

    Ok(())
}
