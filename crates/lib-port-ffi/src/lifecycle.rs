//! Estimator port lifecycle management.
//!
//! This module manages the lifecycle of one native estimator handle:
//! - Initialization (`<Model>_Initialization`)
//! - Per-observation steps (`<Model>_EstimatorPort`)
//! - Cleanup (`<Model>_EstimatorPortTermination`)
//!
//! Each session tracks its state so out-of-order calls are rejected before
//! they reach native code, and releases native buffers when dropped.

use crate::abi::EstimatorPortN;
use crate::error::{PortError, PortResult};
use crate::loader::EstimatorLibrary;
use lib_types::{Dimensions, LifecycleState, PortInfo};
use std::sync::Arc;

/// Narrow interface over a stateful estimator.
///
/// Implementations must reject `step` outside `Ready`/`Processing` and
/// `terminate` outside `Ready`/`Processing` with
/// [`PortError::SequenceViolation`].
pub trait EstimatorPort {
    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;

    /// `Uninitialized -> Ready`.
    fn initialize(&mut self) -> PortResult<PortInfo>;

    /// Process one observation, writing the estimate into `out`.
    fn step(&mut self, observation: &[f64], out: &mut [f64]) -> PortResult<()>;

    /// `Ready | Processing -> Terminated`.
    fn terminate(&mut self) -> PortResult<()>;
}

/// An estimator port session over one native handle.
///
/// # Thread Safety
///
/// The native module keeps mutable state in the handle with no internal
/// synchronization. Every operation takes `&mut self`, and the raw record
/// makes the session neither `Send` nor `Sync`, so a handle can only be
/// driven from the thread that created it, one call at a time.
///
/// # Ownership
///
/// The handle is boxed so its address is stable for the native module.
/// Buffers it references belong to the module; the session never frees
/// them itself and never hands out pointers into them.
pub struct EstimatorSession {
    /// The loaded module.
    library: Arc<EstimatorLibrary>,

    /// The port record, passed by address to every native call.
    handle: Box<EstimatorPortN>,

    /// Current session state.
    state: LifecycleState,

    /// Dimensions fixed at initialization.
    dimensions: Option<Dimensions>,

    /// Host-owned copy of the current observation, valid for the whole session.
    observation: Vec<f64>,

    /// Number of step calls made.
    step_count: u64,
}

impl EstimatorSession {
    /// Create a new uninitialized session with a zeroed handle.
    pub fn new(library: Arc<EstimatorLibrary>) -> Self {
        Self {
            library,
            handle: Box::new(EstimatorPortN::zeroed()),
            state: LifecycleState::Uninitialized,
            dimensions: None,
            observation: Vec::new(),
            step_count: 0,
        }
    }

    /// Get the current session state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Dimensions reported by the module, once initialized.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    /// Number of completed step calls.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// The module backing this session.
    pub fn library(&self) -> &Arc<EstimatorLibrary> {
        &self.library
    }

    /// Initialize the native handle.
    ///
    /// The session is `Ready` as soon as the initializer returns, even if the
    /// reported dimensions are then rejected, so native buffers are still
    /// released by [`terminate`](Self::terminate) or on drop.
    pub fn initialize(&mut self) -> PortResult<PortInfo> {
        if self.state != LifecycleState::Uninitialized {
            return Err(PortError::sequence_violation("initialize", self.state));
        }

        let init_fn = self.library.initialization_fn();
        let handle: *mut EstimatorPortN = &mut *self.handle;
        unsafe { init_fn(handle) };
        self.state = LifecycleState::Ready;

        // Strings are copied out right away; the module may reuse them.
        let info = unsafe { self.handle.port_info() };

        let dimensions = info.dimensions().ok_or(PortError::InvalidDimensions {
            nx: info.nx,
            nz: info.nz,
        })?;
        if let Some(field) = self.handle.first_null_vector() {
            return Err(PortError::NullBuffer { field });
        }

        self.dimensions = Some(dimensions);
        self.observation = vec![0.0; dimensions.nz];

        tracing::info!(
            model = %self.library.model,
            port = info.display_name(),
            nx = dimensions.nx,
            nz = dimensions.nz,
            predict_step = info.predict_step,
            interval = info.interval,
            "Estimator port initialized"
        );

        Ok(info)
    }

    /// Process one observation.
    ///
    /// `observation` must hold exactly Nz values and `out` exactly Nx slots;
    /// the module writes the new estimate into `out`.
    pub fn step(&mut self, observation: &[f64], out: &mut [f64]) -> PortResult<()> {
        if !self.state.accepts_step() {
            return Err(PortError::sequence_violation("step", self.state));
        }

        let dimensions = self.dimensions.ok_or(PortError::InvalidDimensions {
            nx: self.handle.nx,
            nz: self.handle.nz,
        })?;
        if observation.len() != dimensions.nz {
            return Err(PortError::dimension_mismatch(
                "observation",
                dimensions.nz,
                observation.len(),
            ));
        }
        if out.len() != dimensions.nx {
            return Err(PortError::dimension_mismatch(
                "state output",
                dimensions.nx,
                out.len(),
            ));
        }

        self.observation.copy_from_slice(observation);

        let port_fn = self.library.estimator_port_fn();
        let observation_ptr = self.observation.as_mut_ptr();
        let handle: *mut EstimatorPortN = &mut *self.handle;
        unsafe { port_fn(observation_ptr, out.as_mut_ptr(), handle) };

        self.state = LifecycleState::Processing;
        self.step_count += 1;

        // Dimensions are fixed for the handle's lifetime
        let (nx, nz) = self.handle.raw_dimensions();
        if nx != dimensions.nx as i32 {
            return Err(PortError::dimension_mismatch(
                "Nx after step",
                dimensions.nx,
                nx.max(0) as usize,
            ));
        }
        if nz != dimensions.nz as i32 {
            return Err(PortError::dimension_mismatch(
                "Nz after step",
                dimensions.nz,
                nz.max(0) as usize,
            ));
        }

        tracing::trace!(step = self.step_count, "Estimator port step completed");
        Ok(())
    }

    /// Process one observation into a freshly allocated Nx vector.
    pub fn step_vec(&mut self, observation: &[f64]) -> PortResult<Vec<f64>> {
        let nx = self
            .dimensions
            .map(|d| d.nx)
            .ok_or_else(|| PortError::sequence_violation("step", self.state))?;
        let mut out = vec![0.0; nx];
        self.step(observation, &mut out)?;
        Ok(out)
    }

    /// Terminate the handle and release native buffers.
    ///
    /// This is called automatically on drop, but should be called explicitly
    /// after the last step so the ordering is visible at the call site.
    pub fn terminate(&mut self) -> PortResult<()> {
        if !self.state.holds_native_buffers() {
            return Err(PortError::sequence_violation("terminate", self.state));
        }

        let term_fn = self.library.termination_fn();
        let handle: *mut EstimatorPortN = &mut *self.handle;
        unsafe { term_fn(handle) };
        self.state = LifecycleState::Terminated;

        tracing::debug!(
            model = %self.library.model,
            steps = self.step_count,
            "Estimator port terminated"
        );
        Ok(())
    }
}

impl EstimatorPort for EstimatorSession {
    fn state(&self) -> LifecycleState {
        self.state
    }

    fn initialize(&mut self) -> PortResult<PortInfo> {
        EstimatorSession::initialize(self)
    }

    fn step(&mut self, observation: &[f64], out: &mut [f64]) -> PortResult<()> {
        EstimatorSession::step(self, observation, out)
    }

    fn terminate(&mut self) -> PortResult<()> {
        EstimatorSession::terminate(self)
    }
}

impl Drop for EstimatorSession {
    fn drop(&mut self) {
        if self.state.holds_native_buffers() {
            tracing::warn!(
                model = %self.library.model,
                state = %self.state,
                steps = self.step_count,
                "Estimator session dropped without termination, terminating now"
            );
            if let Err(e) = self.terminate() {
                tracing::warn!(error = %e, "Error during session cleanup");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{self, StubCall};

    fn observation(i: usize) -> [f64; 2] {
        [i as f64 * 0.5, 10.0 - i as f64]
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = EstimatorSession::new(stub::library());
        assert_eq!(session.state(), LifecycleState::Uninitialized);

        let info = session.initialize().unwrap();
        assert_eq!(info.name.as_deref(), Some(stub::STUB_PORT_NAME));
        assert_eq!(session.state(), LifecycleState::Ready);
        assert_eq!(session.dimensions(), Some(Dimensions::new(4, 2)));
        assert_eq!(stub::live_handles(), 1);

        for i in 0..5 {
            let state = session.step_vec(&observation(i)).unwrap();
            assert_eq!(state, stub::expected_estimate(i, &observation(i)));
        }
        assert_eq!(session.state(), LifecycleState::Processing);
        assert_eq!(session.step_count(), 5);

        session.terminate().unwrap();
        assert_eq!(session.state(), LifecycleState::Terminated);
        assert_eq!(stub::live_handles(), 0);

        let calls = stub::take_calls();
        assert_eq!(calls.len(), 7);
        assert_eq!(calls[0], StubCall::Initialization);
        assert!(calls[1..6].iter().all(|c| *c == StubCall::EstimatorPort));
        assert_eq!(calls[6], StubCall::Termination);
    }

    #[test]
    fn test_step_before_initialize_is_rejected() {
        let mut session = EstimatorSession::new(stub::library());
        let mut out = [0.0; 4];

        let err = session.step(&[1.0, 2.0], &mut out).unwrap_err();
        assert!(err.is_sequence_violation());
        assert!(stub::take_calls().is_empty());
    }

    #[test]
    fn test_step_after_terminate_is_rejected() {
        let mut session = EstimatorSession::new(stub::library());
        session.initialize().unwrap();
        session.terminate().unwrap();
        stub::take_calls();

        let mut out = [0.0; 4];
        let err = session.step(&[1.0, 2.0], &mut out).unwrap_err();
        assert!(matches!(
            err,
            PortError::SequenceViolation {
                operation: "step",
                state: LifecycleState::Terminated
            }
        ));

        let err = session.terminate().unwrap_err();
        assert!(err.is_sequence_violation());
        assert!(stub::take_calls().is_empty());
    }

    #[test]
    fn test_double_initialize_is_rejected() {
        let mut session = EstimatorSession::new(stub::library());
        session.initialize().unwrap();
        let err = session.initialize().unwrap_err();
        assert!(err.is_sequence_violation());
        assert_eq!(stub::live_handles(), 1);
    }

    #[test]
    fn test_terminate_before_initialize_is_rejected() {
        let mut session = EstimatorSession::new(stub::library());
        assert!(session.terminate().unwrap_err().is_sequence_violation());
        drop(session);
        assert!(stub::take_calls().is_empty());
    }

    #[test]
    fn test_buffer_sizes_are_checked_before_native_call() {
        let mut session = EstimatorSession::new(stub::library());
        session.initialize().unwrap();
        stub::take_calls();

        let mut out = [0.0; 4];
        let err = session.step(&[1.0, 2.0, 3.0], &mut out).unwrap_err();
        assert!(matches!(
            err,
            PortError::DimensionMismatch { what: "observation", expected: 2, actual: 3 }
        ));

        let mut short = [0.0; 3];
        let err = session.step(&[1.0, 2.0], &mut short).unwrap_err();
        assert!(matches!(
            err,
            PortError::DimensionMismatch { what: "state output", expected: 4, actual: 3 }
        ));

        assert!(stub::take_calls().is_empty());
        assert_eq!(session.state(), LifecycleState::Ready);
    }

    #[test]
    fn test_drop_terminates_live_session() {
        {
            let mut session = EstimatorSession::new(stub::library());
            session.initialize().unwrap();
            session.step_vec(&[1.0, 2.0]).unwrap();
            assert_eq!(stub::live_handles(), 1);
        }
        assert_eq!(stub::live_handles(), 0);
        assert_eq!(stub::take_calls().last(), Some(&StubCall::Termination));
    }

    #[test]
    fn test_invalid_dimensions_still_release_buffers() {
        let library = EstimatorLibrary::from_entry_points(
            "ZeroDimension",
            stub::zero_dimension_entry_points(),
        );
        let mut session = EstimatorSession::new(library);

        let err = session.initialize().unwrap_err();
        assert!(matches!(err, PortError::InvalidDimensions { nx: 0, nz: 2 }));
        assert_eq!(session.state(), LifecycleState::Ready);

        let mut out: [f64; 0] = [];
        assert!(session.step(&[1.0, 2.0], &mut out).is_err());

        session.terminate().unwrap();
        assert_eq!(stub::live_handles(), 0);
    }

    #[test]
    fn test_dimension_change_during_step_is_fatal() {
        let library =
            EstimatorLibrary::from_entry_points("Drifting", stub::drifting_entry_points());
        let mut session = EstimatorSession::new(library);
        session.initialize().unwrap();

        let err = session.step_vec(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            PortError::DimensionMismatch { what: "Nx after step", expected: 4, actual: 5 }
        ));
        // The native call did happen, so the session must still be terminated
        assert_eq!(session.state(), LifecycleState::Processing);
        drop(session);
        assert_eq!(stub::live_handles(), 0);
    }
}
