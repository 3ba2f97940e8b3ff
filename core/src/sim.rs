//! Synthetic localization scenarios and a closed-loop harness for the particle filter.
//!
//! This module provides:
//! - [`ScenarioConfig`] and [`Scenario`] for generating a landmark grid, a constant-control
//!   ground-truth trajectory and range-limited noisy observations along it
//! - [`SimulationConfig`] bundling filter and scenario settings, readable and writable as
//!   JSON, YAML or TOML
//! - [`run_simulation`] driving the predict / update / resample cycle and recording the
//!   highest-weight estimate against ground truth
//! - [`SimulationResult`] with CSV export and error summaries

use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::filter::ParticleFilter;
use crate::map::LandmarkMap;
use crate::motion::{Control, MotionModel, PoseStd};
use crate::observation::{LandmarkObservation, ObservationTransform};
use crate::particle::Pose;
use crate::random::{RandomSource, SeededRandom};

/// Synthetic scenario parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of filter cycles to run
    pub steps: usize,
    /// Time between cycles in seconds
    pub delta_t: f64,
    /// Commanded forward velocity in m/s
    pub velocity: f64,
    /// Commanded yaw rate in rad/s
    pub yaw_rate: f64,
    /// Ground-truth starting pose `[x, y, theta]`
    pub initial_pose: [f64; 3],
    /// Lower-left corner of the landmark grid `[x, y]`
    pub landmark_origin: [f64; 2],
    pub landmark_columns: usize,
    pub landmark_rows: usize,
    /// Grid spacing in meters
    pub landmark_spacing: f64,
    /// Maximum distance at which a landmark is observed
    pub sensor_range: f64,
    /// Noise of the position fix used to initialize the filter `[x, y, theta]`
    pub gps_std: [f64; 3],
    /// Process noise the filter assumes during prediction `[x, y, theta]`
    pub process_std: [f64; 3],
    /// Observation noise, used both to corrupt observations and by the filter `[x, y]`
    pub landmark_std: [f64; 2],
    /// Seed for ground-truth noise, independent of the filter seed
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            steps: 300,
            delta_t: 0.1,
            velocity: 4.0,
            yaw_rate: 0.2,
            initial_pose: [0.0, 0.0, 0.0],
            landmark_origin: [-40.0, -20.0],
            landmark_columns: 9,
            landmark_rows: 9,
            landmark_spacing: 10.0,
            sensor_range: 25.0,
            gps_std: [0.3, 0.3, 0.01],
            process_std: [0.3, 0.3, 0.01],
            landmark_std: [0.3, 0.3],
            seed: 7,
        }
    }
}

/// Filter and scenario settings for one simulation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Serialization format of a configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a `.json`, `.yaml`/`.yml` or `.toml` extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(FilterError::Config(format!(
                "unsupported configuration file extension: {}",
                path.display()
            ))),
        }
    }
}

fn config_error(err: impl std::fmt::Display) -> FilterError {
    FilterError::Config(err.to_string())
}

impl SimulationConfig {
    pub fn to_string_as(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(config_error),
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(config_error),
            ConfigFormat::Toml => toml::to_string(self).map_err(config_error),
        }
    }

    pub fn from_str_as(text: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Json => serde_json::from_str(text).map_err(config_error),
            ConfigFormat::Yaml => serde_yaml::from_str(text).map_err(config_error),
            ConfigFormat::Toml => toml::from_str(text).map_err(config_error),
        }
    }

    /// Write the configuration in the format named by the file extension.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = self.to_string_as(ConfigFormat::from_path(path)?)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Read a configuration in the format named by the file extension. Missing fields take
    /// their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        Self::from_str_as(&fs::read_to_string(path)?, format)
    }
}

/// Everything the harness knows at one timestep.
#[derive(Clone, Debug)]
pub struct Frame {
    pub step: usize,
    pub time: f64,
    /// Ground-truth pose at this step
    pub truth: Pose,
    /// Control applied between the previous step and this one
    pub control: Control,
    /// Noisy observations of in-range landmarks, in the agent frame
    pub observations: Vec<LandmarkObservation>,
}

/// A landmark map with a ground-truth trajectory and its observations.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub map: LandmarkMap,
    pub frames: Vec<Frame>,
}

impl Scenario {
    /// Generate a scenario deterministically from `config.seed`.
    pub fn generate(config: &ScenarioConfig) -> Result<Self> {
        let map = LandmarkMap::grid(
            Point2::new(config.landmark_origin[0], config.landmark_origin[1]),
            config.landmark_columns,
            config.landmark_rows,
            config.landmark_spacing,
        );
        if map.is_empty() {
            return Err(FilterError::Config(
                "scenario needs at least one landmark".to_string(),
            ));
        }
        let control = Control::new(config.velocity, config.yaw_rate);
        let truth_model = MotionModel::new(config.delta_t, [0.0; 3], control)?;
        let noise = PoseStd::new([config.landmark_std[0], config.landmark_std[1], 0.0])?;
        let mut rng = SeededRandom::new(config.seed);

        let mut frames = Vec::with_capacity(config.steps);
        let mut truth = Pose::new(
            config.initial_pose[0],
            config.initial_pose[1],
            config.initial_pose[2],
        );
        for step in 0..config.steps {
            if step > 0 {
                truth = truth_model.propagate(&truth);
            }
            let observations = observe(&truth, &map, config.sensor_range, &noise, &mut rng)?;
            frames.push(Frame {
                step,
                time: step as f64 * config.delta_t,
                truth,
                control,
                observations,
            });
        }
        debug!(
            "Generated scenario: {} landmarks, {} frames",
            map.len(),
            frames.len()
        );
        Ok(Scenario { map, frames })
    }
}

/// Noisy agent-frame observations of every landmark within `sensor_range` of `truth`.
fn observe<R: RandomSource>(
    truth: &Pose,
    map: &LandmarkMap,
    sensor_range: f64,
    noise: &PoseStd,
    rng: &mut R,
) -> Result<Vec<LandmarkObservation>> {
    let transform = ObservationTransform::new(truth);
    let origin = Point2::new(truth.x, truth.y);
    let mut observations = Vec::new();
    for landmark in map {
        if nalgebra::distance(&origin, &landmark.position()) > sensor_range {
            continue;
        }
        let local = transform.to_local(&landmark.position());
        observations.push(LandmarkObservation::new(
            landmark.id,
            rng.gaussian(local.x, noise.x)?,
            rng.gaussian(local.y, noise.y)?,
        ));
    }
    Ok(observations)
}

/// Wrap an angle to `[-pi, pi)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// One row of simulation output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub time: f64,
    pub true_x: f64,
    pub true_y: f64,
    pub true_theta: f64,
    pub est_x: f64,
    pub est_y: f64,
    pub est_theta: f64,
    /// Euclidean distance between estimate and truth in meters
    pub position_error: f64,
    /// Wrapped heading error in radians
    pub heading_error: f64,
    pub effective_sample_size: f64,
    pub observations: usize,
    /// Matched landmark ids of the best particle, space-delimited
    pub associations: String,
}

/// Output of [`run_simulation`].
#[derive(Debug, Default)]
pub struct SimulationResult {
    pub records: Vec<StepRecord>,
    /// Number of times the filter was re-initialized after degenerate weights
    pub reinitializations: usize,
}

impl SimulationResult {
    pub fn position_rmse(&self) -> f64 {
        rms(self.records.iter().map(|r| r.position_error))
    }

    pub fn heading_rmse(&self) -> f64 {
        rms(self.records.iter().map(|r| r.heading_error))
    }

    pub fn max_position_error(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.position_error)
            .fold(0.0, f64::max)
    }

    /// Writes the per-step records to a CSV file.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads per-step records from a CSV file written by [`to_csv`](Self::to_csv).
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StepRecord>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in reader.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}

/// Run the particle filter over a generated scenario.
///
/// The filter is initialized from a noisy position fix at the first frame. Every later
/// frame runs predict, update and resample; the highest-weight particle after the update
/// is recorded as the estimate. Degenerate weights trigger re-initialization from a fresh
/// position fix.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult> {
    let scenario = Scenario::generate(&config.scenario)?;
    run_scenario(config, &scenario)
}

/// Run the particle filter over an existing scenario.
pub fn run_scenario(config: &SimulationConfig, scenario: &Scenario) -> Result<SimulationResult> {
    let settings = &config.scenario;
    let mut pf = ParticleFilter::new(config.filter.clone())?;
    let gps = PoseStd::new(settings.gps_std)?;
    let mut gps_rng = SeededRandom::new(settings.seed.wrapping_add(1));
    let mut result = SimulationResult::default();

    for frame in &scenario.frames {
        if !pf.is_initialized() {
            let fix = gps.sample_around(&frame.truth, &mut gps_rng)?;
            pf.init(fix.x, fix.y, fix.theta, settings.gps_std)?;
        } else {
            pf.predict(
                settings.delta_t,
                settings.process_std,
                frame.control.velocity,
                frame.control.yaw_rate,
            )?;
        }

        pf.update_weights(
            settings.sensor_range,
            settings.landmark_std,
            &frame.observations,
            &scenario.map,
        )?;

        let best = pf.best_particle().ok_or(FilterError::Uninitialized)?;
        let estimate = best.pose();
        let record = StepRecord {
            step: frame.step,
            time: frame.time,
            true_x: frame.truth.x,
            true_y: frame.truth.y,
            true_theta: frame.truth.theta,
            est_x: estimate.x,
            est_y: estimate.y,
            est_theta: estimate.theta,
            position_error: ((estimate.x - frame.truth.x).powi(2)
                + (estimate.y - frame.truth.y).powi(2))
            .sqrt(),
            heading_error: wrap_angle(estimate.theta - frame.truth.theta),
            effective_sample_size: pf.effective_sample_size(),
            observations: frame.observations.len(),
            associations: best.associations_string(),
        };
        debug!(
            "Step {}: estimate {}, error {:.3} m",
            frame.step, estimate, record.position_error
        );
        result.records.push(record);

        match pf.resample() {
            Ok(()) => {}
            Err(FilterError::DegenerateWeights { total }) => {
                warn!(
                    "Degenerate weights at step {} (total {total:e}), re-initializing from position fix",
                    frame.step
                );
                let fix = gps.sample_around(&frame.truth, &mut gps_rng)?;
                pf.init(fix.x, fix.y, fix.theta, settings.gps_std)?;
                result.reinitializations += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Simulation finished: {} steps, position RMSE {:.3} m, heading RMSE {:.4} rad, {} re-initializations",
        result.records.len(),
        result.position_rmse(),
        result.heading_rmse(),
        result.reinitializations
    );
    Ok(result)
}
