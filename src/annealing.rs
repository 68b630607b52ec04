use crate::error::ModelError;
use crate::lattice::K_BOLTZMANN;
use crate::model::{EnergyModel, IsingModel};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::cell::OnceCell;
use tracing::debug;

/// Metropolis acceptance rule: downhill moves always pass, uphill moves pass
/// with probability `exp(-dE / (k_B * T))`.
fn acceptance_probability(delta_energy: f64, temperature: f64) -> f64 {
    if delta_energy <= 0. {
        1.
    } else {
        (-delta_energy / (K_BOLTZMANN * temperature)).exp()
    }
}

/// A validated annealing schedule: finite, strictly positive temperatures in
/// non-increasing order.
///
/// Serialized as the bare temperature list; deserialization goes through
/// `Schedule::new`, so an invalid list cannot round-trip back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Schedule {
    temperatures: Vec<f64>,
}

impl TryFrom<Vec<f64>> for Schedule {
    type Error = ModelError;

    fn try_from(temperatures: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(temperatures)
    }
}

impl From<Schedule> for Vec<f64> {
    fn from(schedule: Schedule) -> Self {
        schedule.temperatures
    }
}

impl Schedule {
    pub fn new(temperatures: Vec<f64>) -> Result<Self, ModelError> {
        if temperatures.is_empty() {
            return Err(ModelError::InvalidScheduleConfig(String::from(
                "temperature schedule must not be empty",
            )));
        }
        for &t in &temperatures {
            if !t.is_finite() || t <= 0. {
                return Err(ModelError::InvalidScheduleConfig(format!(
                    "temperature {t} must be finite and strictly positive"
                )));
            }
        }
        if temperatures.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(ModelError::InvalidScheduleConfig(String::from(
                "temperatures must be non-increasing",
            )));
        }
        Ok(Schedule { temperatures })
    }

    /// `steps` equally spaced temperatures from `start` down to `stop`.
    pub fn linear(start: f64, stop: f64, steps: usize) -> Result<Self, ModelError> {
        if steps < 2 {
            return Err(ModelError::InvalidScheduleConfig(String::from(
                "a linear schedule needs at least two steps",
            )));
        }
        let dt = (start - stop) / (steps - 1) as f64;
        Self::new((0..steps).map(|i| start - i as f64 * dt).collect())
    }

    /// `steps` temperatures decaying by a constant factor from `start` down
    /// to `stop`.
    pub fn geometric(start: f64, stop: f64, steps: usize) -> Result<Self, ModelError> {
        if steps < 2 {
            return Err(ModelError::InvalidScheduleConfig(String::from(
                "a geometric schedule needs at least two steps",
            )));
        }
        if !(stop > 0. && stop <= start && start.is_finite()) {
            return Err(ModelError::InvalidScheduleConfig(format!(
                "geometric schedule needs 0 < stop <= start, got start = {start}, stop = {stop}"
            )));
        }
        let ratio = (stop / start).powf(1. / (steps - 1) as f64);
        Self::new((0..steps).map(|i| start * ratio.powi(i as i32)).collect())
    }

    pub fn get_temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }
}

/// Knobs of a single minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealSettings {
    schedule: Schedule,
    max_steps_per_temperature: u32,
    early_stop_sweeps: Option<u32>,
}

impl AnnealSettings {
    pub fn new(schedule: Schedule, max_steps_per_temperature: u32) -> Self {
        AnnealSettings {
            schedule,
            max_steps_per_temperature,
            early_stop_sweeps: None,
        }
    }

    /// End the whole search once the energy has been unchanged for `sweeps`
    /// consecutive full sweeps. A zero is treated as one sweep.
    pub fn with_early_stop(mut self, sweeps: u32) -> Self {
        self.early_stop_sweeps = Some(sweeps.max(1));
        self
    }

    pub fn get_schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn get_max_steps_per_temperature(&self) -> u32 {
        self.max_steps_per_temperature
    }
}

/// Statistics of a finished minimization run. The minimized configuration
/// itself stays on the model that was passed to `metropolis_minimize`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnealResult {
    temperatures: Vec<f64>,
    sweep_energies: Vec<Vec<f64>>,
    accepted_flips: Vec<u64>,
    initial_energy: f64,
    final_energy: f64,
    stopped_early: bool,
    // cache for the lazily computed per-temperature averages
    #[serde(skip)]
    avg_energies: OnceCell<Vec<f64>>,
}

impl AnnealResult {
    fn new(
        temperatures: Vec<f64>,
        sweep_energies: Vec<Vec<f64>>,
        accepted_flips: Vec<u64>,
        initial_energy: f64,
        final_energy: f64,
        stopped_early: bool,
    ) -> Self {
        assert_eq!(temperatures.len(), sweep_energies.len());
        assert_eq!(temperatures.len(), accepted_flips.len());

        AnnealResult {
            temperatures,
            sweep_energies,
            accepted_flips,
            initial_energy,
            final_energy,
            stopped_early,
            avg_energies: OnceCell::new(),
        }
    }

    /// Temperatures that were actually visited; shorter than the schedule
    /// when the early stop triggered.
    pub fn get_temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    /// Running total energy recorded at every completed sweep, grouped by
    /// temperature.
    pub fn get_sweep_energies(&self) -> &[Vec<f64>] {
        &self.sweep_energies
    }

    pub fn get_accepted_flips(&self) -> &[u64] {
        &self.accepted_flips
    }

    pub fn get_initial_energy(&self) -> f64 {
        self.initial_energy
    }

    pub fn get_final_energy(&self) -> f64 {
        self.final_energy
    }

    pub fn get_is_stopped_early(&self) -> bool {
        self.stopped_early
    }

    /// Mean recorded energy per temperature stage. Stages that finished
    /// before the first sweep boundary contribute a NaN.
    pub fn get_avg_energies(&self) -> &Vec<f64> {
        self.avg_energies
            .get_or_init(|| self.sweep_energies.iter().map(|v| v.mean()).collect())
    }
}

struct StageOutcome {
    sweep_energies: Vec<f64>,
    accepted: u64,
    stalled: bool,
}

fn minimize_at_temperature<R: rand::Rng + ?Sized>(
    model: &mut IsingModel,
    temperature: f64,
    settings: &AnnealSettings,
    current_energy: &mut f64,
    rng: &mut R,
) -> Result<StageOutcome, ModelError> {
    let (x_size, y_size) = model.lattice().shape();
    let sweep_len = x_size * y_size;

    let mut sweep_energies = Vec::new();
    let mut accepted = 0u64;
    let mut quiet_sweeps = 0u32;
    let mut sweep_start_energy = *current_energy;

    for step in 0..settings.max_steps_per_temperature {
        let (x, y) = model.lattice().draw_random_site(rng);
        let current = model.spin(x, y)?;
        let candidate = model.get_field_values().draw_other(current, rng)?;
        let delta_energy = model.delta_energy(x, y, candidate)?;

        if rng.random_bool(acceptance_probability(delta_energy, temperature)) {
            model.set_spin(x, y, candidate);
            *current_energy += delta_energy;
            accepted += 1;
        }

        if (step + 1) as usize % sweep_len == 0 {
            sweep_energies.push(*current_energy);
            if (*current_energy - sweep_start_energy).abs() < f64::EPSILON {
                quiet_sweeps += 1;
            } else {
                quiet_sweeps = 0;
            }
            sweep_start_energy = *current_energy;

            if let Some(limit) = settings.early_stop_sweeps {
                if quiet_sweeps >= limit {
                    return Ok(StageOutcome {
                        sweep_energies,
                        accepted,
                        stalled: true,
                    });
                }
            }
        }
    }

    Ok(StageOutcome {
        sweep_energies,
        accepted,
        stalled: false,
    })
}

/// Anneal the model's lattice through the temperature schedule with
/// single-site Metropolis updates.
///
/// Sites are picked uniformly at random (not in sweep order) and candidate
/// values are drawn uniformly from the attached value set, distinct from the
/// current value. This is a stochastic local search: it converges towards a
/// low-energy configuration but carries no global-optimum guarantee.
///
/// Configuration problems (a value set without an alternative value, an
/// energy query that fails under the boundary mode) are reported before the
/// first mutation.
pub fn metropolis_minimize<R: rand::Rng + ?Sized>(
    model: &mut IsingModel,
    settings: &AnnealSettings,
    rng: &mut R,
) -> Result<AnnealResult, ModelError> {
    if model.get_field_values().num_values() < 2 {
        return Err(ModelError::InvalidFieldValueSet(String::from(
            "minimization needs at least two distinct field values",
        )));
    }

    let initial_energy = model.energy()?;
    let mut current_energy = initial_energy;

    let mut visited_temperatures = Vec::with_capacity(settings.schedule.len());
    let mut sweep_energies = Vec::with_capacity(settings.schedule.len());
    let mut accepted_flips = Vec::with_capacity(settings.schedule.len());
    let mut stopped_early = false;

    for &temperature in settings.schedule.get_temperatures() {
        let outcome =
            minimize_at_temperature(model, temperature, settings, &mut current_energy, rng)?;

        debug!(
            temperature,
            accepted = outcome.accepted,
            energy = current_energy,
            "finished temperature stage"
        );

        visited_temperatures.push(temperature);
        sweep_energies.push(outcome.sweep_energies);
        accepted_flips.push(outcome.accepted);

        if outcome.stalled {
            stopped_early = true;
            break;
        }
    }

    Ok(AnnealResult::new(
        visited_temperatures,
        sweep_energies,
        accepted_flips,
        initial_energy,
        current_energy,
        stopped_early,
    ))
}
