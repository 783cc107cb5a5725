//! Binary interface shared with the native estimator module.
//!
//! [`EstimatorPortN`] mirrors the C `struct EstimatorPortN` field for field.
//! Reordering, retyping or repadding any field is undefined behavior on the
//! native side, so the layout is pinned by tests below.
//!
//! ```c
//! struct EstimatorPortN {
//!     char   *PortName;
//!     char   *PortIntroduction;
//!     int     Nx, Nz, PredictStep;
//!     double  Intervel, PredictTime;
//!     double *EstimatedState, *PredictedState;
//!     double *CurrentObservation, *PredictedObservation;
//!     double *Matrix_F, *Matrix_G, *Matrix_B, *Matrix_H;
//!     double *Matrix_P, *Matrix_Q, *Matrix_R;
//!     int    *Int_Par;
//!     double *Double_Par;
//!     void  (*StateTransitionEquation)(double *, double *, struct EstimatorPortN *);
//!     void  (*ObservationEquation)(double *, double *, struct EstimatorPortN *);
//!     void  (*PredictionEquation)(double *, double *, struct EstimatorPortN *);
//!     void  (*EstimatorPort)(double *, double *, struct EstimatorPortN *);
//!     void  (*EstimatorPortTermination)(struct EstimatorPortN *);
//! };
//! ```

use lib_types::PortInfo;
use std::ffi::{c_char, c_double, c_int, CStr};
use std::ptr;

/// `<Model>_Initialization(struct EstimatorPortN *)`.
pub type InitializationFn = unsafe extern "C" fn(estimator: *mut EstimatorPortN);

/// `<Model>_EstimatorPort(double *observation, double *state_out, struct EstimatorPortN *)`.
pub type EstimatorPortFn = unsafe extern "C" fn(
    in_observation: *mut c_double,
    out_state: *mut c_double,
    estimator: *mut EstimatorPortN,
);

/// `<Model>_EstimatorPortTermination(struct EstimatorPortN *)`.
pub type TerminationFn = unsafe extern "C" fn(estimator: *mut EstimatorPortN);

/// State transition callback slot. Never called by the host.
pub type StateTransitionFn = unsafe extern "C" fn(
    in_state: *mut c_double,
    out_state: *mut c_double,
    estimator: *mut EstimatorPortN,
);

/// Observation equation callback slot. Never called by the host.
pub type ObservationFn = unsafe extern "C" fn(
    in_state: *mut c_double,
    out_observation: *mut c_double,
    estimator: *mut EstimatorPortN,
);

/// Prediction equation callback slot. Never called by the host.
pub type PredictionFn = unsafe extern "C" fn(
    in_state: *mut c_double,
    out_predicted_state: *mut c_double,
    estimator: *mut EstimatorPortN,
);

/// The estimator's configuration/state record.
///
/// Every buffer pointer is allocated and freed by the native module. The host
/// reads the scalar fields and strings after initialization and otherwise
/// only passes the record's address back into native calls.
#[repr(C)]
#[derive(Debug)]
pub struct EstimatorPortN {
    /// `PortName`
    pub port_name: *mut c_char,
    /// `PortIntroduction`
    pub port_introduction: *mut c_char,
    /// `Nx`
    pub nx: c_int,
    /// `Nz`
    pub nz: c_int,
    /// `PredictStep`
    pub predict_step: c_int,
    /// `Intervel` (sampling interval; the C spelling is part of the header).
    pub interval: c_double,
    /// `PredictTime`
    pub predict_time: c_double,
    /// `EstimatedState`, length Nx.
    pub estimated_state: *mut c_double,
    /// `PredictedState`, length Nx.
    pub predicted_state: *mut c_double,
    /// `CurrentObservation`, length Nz.
    pub current_observation: *mut c_double,
    /// `PredictedObservation`, length Nz.
    pub predicted_observation: *mut c_double,
    pub matrix_f: *mut c_double,
    pub matrix_g: *mut c_double,
    pub matrix_b: *mut c_double,
    pub matrix_h: *mut c_double,
    pub matrix_p: *mut c_double,
    pub matrix_q: *mut c_double,
    pub matrix_r: *mut c_double,
    /// `Int_Par`
    pub int_par: *mut c_int,
    /// `Double_Par`
    pub double_par: *mut c_double,
    pub state_transition_equation: Option<StateTransitionFn>,
    pub observation_equation: Option<ObservationFn>,
    pub prediction_equation: Option<PredictionFn>,
    pub estimator_port: Option<EstimatorPortFn>,
    pub estimator_port_termination: Option<TerminationFn>,
}

impl EstimatorPortN {
    /// A freshly allocated record with every field zeroed or null.
    pub fn zeroed() -> Self {
        Self {
            port_name: ptr::null_mut(),
            port_introduction: ptr::null_mut(),
            nx: 0,
            nz: 0,
            predict_step: 0,
            interval: 0.0,
            predict_time: 0.0,
            estimated_state: ptr::null_mut(),
            predicted_state: ptr::null_mut(),
            current_observation: ptr::null_mut(),
            predicted_observation: ptr::null_mut(),
            matrix_f: ptr::null_mut(),
            matrix_g: ptr::null_mut(),
            matrix_b: ptr::null_mut(),
            matrix_h: ptr::null_mut(),
            matrix_p: ptr::null_mut(),
            matrix_q: ptr::null_mut(),
            matrix_r: ptr::null_mut(),
            int_par: ptr::null_mut(),
            double_par: ptr::null_mut(),
            state_transition_equation: None,
            observation_equation: None,
            prediction_equation: None,
            estimator_port: None,
            estimator_port_termination: None,
        }
    }

    /// Raw `(Nx, Nz)` as reported by the module.
    pub fn raw_dimensions(&self) -> (c_int, c_int) {
        (self.nx, self.nz)
    }

    /// Name of the first state/observation vector the module left null.
    ///
    /// Matrices and auxiliary parameters are implementation-defined and are
    /// not checked.
    pub fn first_null_vector(&self) -> Option<&'static str> {
        [
            ("EstimatedState", self.estimated_state),
            ("PredictedState", self.predicted_state),
            ("CurrentObservation", self.current_observation),
            ("PredictedObservation", self.predicted_observation),
        ]
        .into_iter()
        .find(|(_, ptr)| ptr.is_null())
        .map(|(field, _)| field)
    }

    /// Copy the scalar fields and strings into a host-owned snapshot.
    ///
    /// # Safety
    ///
    /// `port_name` and `port_introduction` must each be null or point to a
    /// valid NUL-terminated string owned by the module.
    pub unsafe fn port_info(&self) -> PortInfo {
        PortInfo {
            name: unsafe { read_c_string(self.port_name) },
            introduction: unsafe { read_c_string(self.port_introduction) },
            nx: self.nx,
            nz: self.nz,
            predict_step: self.predict_step,
            interval: self.interval,
            predict_time: self.predict_time,
        }
    }
}

/// Read a C string, returning None if null or invalid UTF-8.
///
/// # Safety
/// The pointer must be null or point to a valid null-terminated C string.
unsafe fn read_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: Caller guarantees ptr is valid if not null
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(String::from) }
}
