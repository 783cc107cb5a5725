//! In-process stand-in for a native estimator module.
//!
//! The entry points here are real `extern "C"` functions that populate and
//! release an [`EstimatorPortN`] the same way a compiled state-space model
//! does: the stub allocates every buffer during initialization and frees
//! them during termination. Estimates are deterministic and carry the step
//! index, so callers can assert strict positional correspondence.
//!
//! Every native call is recorded per thread, together with the number of
//! live (initialized, not yet terminated) handles.

use crate::abi::EstimatorPortN;
use crate::loader::{EntryPoints, EstimatorLibrary};
use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_double, c_int, CString};
use std::ptr;
use std::slice;
use std::sync::Arc;

/// State dimension of the stub model.
pub const STUB_NX: usize = 4;

/// Observation dimension of the stub model.
pub const STUB_NZ: usize = 2;

/// Port name reported by the stub model.
pub const STUB_PORT_NAME: &str = "Stub Estimator v0.00";

/// Model prefix used by [`library`].
pub const STUB_MODEL: &str = "StubModel";

/// One recorded native call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StubCall {
    Initialization,
    EstimatorPort,
    Termination,
}

thread_local! {
    static CALLS: RefCell<Vec<StubCall>> = const { RefCell::new(Vec::new()) };
    static LIVE_HANDLES: Cell<usize> = const { Cell::new(0) };
}

/// Drain the calls recorded on this thread.
pub fn take_calls() -> Vec<StubCall> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

/// Number of handles initialized and not yet terminated on this thread.
pub fn live_handles() -> usize {
    LIVE_HANDLES.with(Cell::get)
}

/// Entry points of the well-behaved stub model.
pub fn entry_points() -> EntryPoints {
    EntryPoints {
        initialization: stub_initialization,
        estimator_port: stub_estimator_port,
        termination: stub_termination,
    }
}

/// Entry points of a model whose initializer reports `Nx = 0`.
pub fn zero_dimension_entry_points() -> EntryPoints {
    EntryPoints {
        initialization: zero_dimension_initialization,
        ..entry_points()
    }
}

/// Entry points of a model that grows `Nx` on every step.
pub fn drifting_entry_points() -> EntryPoints {
    EntryPoints {
        estimator_port: drifting_estimator_port,
        ..entry_points()
    }
}

/// The well-behaved stub wrapped as a library.
pub fn library() -> Arc<EstimatorLibrary> {
    EstimatorLibrary::from_entry_points(STUB_MODEL, entry_points())
}

/// The estimate the stub produces for the `step`-th observation.
///
/// Layout: `[step, observation..., sum(observation)]`, truncated or padded
/// with the sum to Nx.
pub fn expected_estimate(step: usize, observation: &[f64]) -> Vec<f64> {
    let mut state = vec![0.0; STUB_NX];
    write_estimate(step, observation, &mut state);
    state
}

fn write_estimate(step: usize, observation: &[f64], state: &mut [f64]) {
    let sum: f64 = observation.iter().sum();
    for (i, slot) in state.iter_mut().enumerate() {
        *slot = match i {
            0 => step as f64,
            i if i <= observation.len() => observation[i - 1],
            _ => sum,
        };
    }
}

fn record(call: StubCall) {
    CALLS.with(|calls| calls.borrow_mut().push(call));
}

// Int_Par layout: [step counter, allocated Nx, allocated Nz]
const INT_PAR_LEN: usize = 3;

fn alloc_doubles(len: usize) -> *mut c_double {
    Box::into_raw(vec![0.0; len].into_boxed_slice()) as *mut c_double
}

unsafe fn free_doubles(buffer: &mut *mut c_double, len: usize) {
    if !buffer.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(*buffer, len)) });
        *buffer = ptr::null_mut();
    }
}

unsafe fn free_string(string: &mut *mut c_char) {
    if !string.is_null() {
        drop(unsafe { CString::from_raw(*string) });
        *string = ptr::null_mut();
    }
}

fn populate(estimator: &mut EstimatorPortN, nx: usize, nz: usize) {
    estimator.port_name = CString::from(c"Stub Estimator v0.00").into_raw();
    estimator.port_introduction = CString::from(c"Deterministic stand-in").into_raw();
    estimator.nx = nx as c_int;
    estimator.nz = nz as c_int;
    estimator.predict_step = 2;
    estimator.interval = 0.005;
    estimator.predict_time = 0.01;

    estimator.estimated_state = alloc_doubles(nx);
    estimator.predicted_state = alloc_doubles(nx);
    estimator.current_observation = alloc_doubles(nz);
    estimator.predicted_observation = alloc_doubles(nz);
    estimator.matrix_f = alloc_doubles(nx * nx);
    estimator.matrix_g = alloc_doubles(nx * nx);
    estimator.matrix_b = alloc_doubles(nx);
    estimator.matrix_h = alloc_doubles(nz * nx);
    estimator.matrix_p = alloc_doubles(nx * nx);
    estimator.matrix_q = alloc_doubles(nx * nx);
    estimator.matrix_r = alloc_doubles(nz * nz);
    estimator.int_par =
        Box::into_raw(vec![0, nx as c_int, nz as c_int].into_boxed_slice()) as *mut c_int;
    estimator.double_par = alloc_doubles(1);

    estimator.estimator_port = Some(stub_estimator_port);
    estimator.estimator_port_termination = Some(stub_termination);

    record(StubCall::Initialization);
    LIVE_HANDLES.with(|live| live.set(live.get() + 1));
}

unsafe extern "C" fn stub_initialization(estimator: *mut EstimatorPortN) {
    populate(unsafe { &mut *estimator }, STUB_NX, STUB_NZ);
}

unsafe extern "C" fn zero_dimension_initialization(estimator: *mut EstimatorPortN) {
    populate(unsafe { &mut *estimator }, 0, STUB_NZ);
}

unsafe extern "C" fn stub_estimator_port(
    in_observation: *mut c_double,
    out_state: *mut c_double,
    estimator: *mut EstimatorPortN,
) {
    record(StubCall::EstimatorPort);

    let estimator = unsafe { &mut *estimator };
    let counters = unsafe { slice::from_raw_parts_mut(estimator.int_par, INT_PAR_LEN) };
    let (nx, nz) = (counters[1] as usize, counters[2] as usize);

    let observation = unsafe { slice::from_raw_parts(in_observation, nz) };
    let current = unsafe { slice::from_raw_parts_mut(estimator.current_observation, nz) };
    current.copy_from_slice(observation);

    let estimate = unsafe { slice::from_raw_parts_mut(estimator.estimated_state, nx) };
    write_estimate(counters[0] as usize, current, estimate);
    counters[0] += 1;

    let out = unsafe { slice::from_raw_parts_mut(out_state, nx) };
    out.copy_from_slice(estimate);
}

unsafe extern "C" fn drifting_estimator_port(
    in_observation: *mut c_double,
    out_state: *mut c_double,
    estimator: *mut EstimatorPortN,
) {
    unsafe {
        stub_estimator_port(in_observation, out_state, estimator);
        (*estimator).nx += 1;
    }
}

unsafe extern "C" fn stub_termination(estimator: *mut EstimatorPortN) {
    record(StubCall::Termination);

    let estimator = unsafe { &mut *estimator };
    if estimator.int_par.is_null() {
        return;
    }
    let counters = unsafe {
        Box::from_raw(ptr::slice_from_raw_parts_mut(estimator.int_par, INT_PAR_LEN))
    };
    estimator.int_par = ptr::null_mut();
    let (nx, nz) = (counters[1] as usize, counters[2] as usize);

    unsafe {
        free_string(&mut estimator.port_name);
        free_string(&mut estimator.port_introduction);
        free_doubles(&mut estimator.estimated_state, nx);
        free_doubles(&mut estimator.predicted_state, nx);
        free_doubles(&mut estimator.current_observation, nz);
        free_doubles(&mut estimator.predicted_observation, nz);
        free_doubles(&mut estimator.matrix_f, nx * nx);
        free_doubles(&mut estimator.matrix_g, nx * nx);
        free_doubles(&mut estimator.matrix_b, nx);
        free_doubles(&mut estimator.matrix_h, nz * nx);
        free_doubles(&mut estimator.matrix_p, nx * nx);
        free_doubles(&mut estimator.matrix_q, nx * nx);
        free_doubles(&mut estimator.matrix_r, nz * nz);
        free_doubles(&mut estimator.double_par, 1);
    }

    LIVE_HANDLES.with(|live| live.set(live.get().saturating_sub(1)));
}
