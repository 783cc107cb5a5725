//! Batch run orchestration.

use crate::config::HarnessConfig;
use anyhow::{Context, Result};
use lib_dataset::{read_observations, write_estimations, EstimationTable, ObservationTable};
use lib_port_ffi::{EstimatorLibrary, EstimatorPort, EstimatorSession};
use lib_types::{Dimensions, EstimationRecord, PortInfo};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one completed run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Port information read after initialization.
    pub port: PortInfo,

    /// Number of observation rows processed.
    pub rows: usize,

    /// Result file written.
    pub output_path: PathBuf,

    /// Wall-clock duration of the whole run.
    #[serde(rename = "elapsed_s", serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
}

fn serialize_seconds<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Run orchestrator.
pub struct Orchestrator {
    config: HarnessConfig,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        crate::config::validate_config(&config)?;
        Ok(Self { config })
    }

    /// Load the configured module and run.
    ///
    /// The module is loaded before the input table is opened, so a bad module
    /// path fails without touching input data.
    pub fn run(&self) -> Result<RunReport> {
        let library = self.load_library()?;
        self.run_with_library(library)
    }

    /// Run against an already loaded module.
    pub fn run_with_library(&self, library: Arc<EstimatorLibrary>) -> Result<RunReport> {
        let start = Instant::now();
        tracing::info!(name = %self.config.name, model = %library.model, "Starting run");

        let dataset = &self.config.dataset;
        let observations = read_observations(&dataset.input, dataset.observation_shape())
            .with_context(|| format!("Invalid observation input {:?}", dataset.input))?;

        let mut session = EstimatorSession::new(library);
        let (port, estimations) = drive(&mut session, &observations, dataset.dimensions())?;
        tracing::info!(port = port.display_name(), rows = estimations.len(), "Run finished");

        let timestamp = chrono::Local::now().naive_local();
        let output = &self.config.output;
        let output_path =
            write_estimations(&output.directory, &output.prefix, &estimations, &timestamp)
                .context("Failed to write estimation result")?;

        Ok(RunReport {
            port,
            rows: estimations.len(),
            output_path,
            elapsed: start.elapsed(),
        })
    }

    /// Load the module, initialize it, read its port information and terminate.
    pub fn inspect(&self) -> Result<PortInfo> {
        let library = self.load_library()?;
        let mut session = EstimatorSession::new(library);

        let port = session.initialize();
        session
            .terminate()
            .context("Estimator port termination failed")?;
        port.context("Estimator port initialization failed")
    }

    fn load_library(&self) -> Result<Arc<EstimatorLibrary>> {
        let module = &self.config.module;
        EstimatorLibrary::load(&module.path, &module.model)
            .with_context(|| format!("Failed to load estimator module {:?}", module.path))
    }
}

/// Drive one estimator through its whole lifecycle over `observations`.
///
/// Initializes, checks the reported dimensions against `expected`, steps once
/// per row in order, then terminates. If anything fails after the initializer
/// ran, termination is still attempted before the error is returned.
pub fn drive<E: EstimatorPort>(
    estimator: &mut E,
    observations: &ObservationTable,
    expected: Dimensions,
) -> Result<(PortInfo, EstimationTable)> {
    let outcome = estimator
        .initialize()
        .context("Estimator port initialization failed")
        .and_then(|port| {
            let dimensions = check_dimensions(&port, observations, expected)?;
            let table = estimate_all(estimator, observations, dimensions.nx)?;
            Ok((port, table))
        });

    match outcome {
        Ok(result) => {
            estimator
                .terminate()
                .context("Estimator port termination failed")?;
            Ok(result)
        }
        Err(e) => {
            tracing::error!(error = %e, state = %estimator.state(), "Aborting run");
            if estimator.state().holds_native_buffers() {
                if let Err(term) = estimator.terminate() {
                    tracing::warn!(error = %term, "Termination after failure also failed");
                }
            }
            Err(e)
        }
    }
}

/// Check the module's reported dimensions against the tables it will fill.
pub fn check_dimensions(
    port: &PortInfo,
    observations: &ObservationTable,
    expected: Dimensions,
) -> Result<Dimensions> {
    let dimensions = port.dimensions().with_context(|| {
        format!(
            "Estimator port reported invalid dimensions Nx={}, Nz={}",
            port.nx, port.nz
        )
    })?;

    if dimensions.nz != observations.observation_dim() {
        anyhow::bail!(
            "Estimator port expects Nz={} observation components, input table has {}",
            dimensions.nz,
            observations.observation_dim()
        );
    }
    if dimensions.nx != expected.nx {
        anyhow::bail!(
            "Estimator port produces Nx={} state components, output table expects {}",
            dimensions.nx,
            expected.nx
        );
    }

    Ok(dimensions)
}

/// Step once per observation row, in order, collecting one output row each.
pub fn estimate_all<E: EstimatorPort>(
    estimator: &mut E,
    observations: &ObservationTable,
    nx: usize,
) -> Result<EstimationTable> {
    let mut table = EstimationTable::new(observations.len(), nx);
    let mut state = vec![0.0; nx];

    for (row, record) in observations.records().enumerate() {
        estimator
            .step(&record.observation, &mut state)
            .with_context(|| format!("Estimator port step failed at row {}", row))?;
        table.push(EstimationRecord::new(record.time, state.clone()))?;
    }

    Ok(table)
}
