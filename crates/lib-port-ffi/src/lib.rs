//! # lib-port-ffi
//!
//! Safe FFI wrappers for precompiled estimator port modules.
//!
//! This crate provides a safe Rust interface for loading and driving a
//! native recursive state estimator (`.dll`/`.so`/`.dylib`) through its
//! fixed binary interface. It handles:
//!
//! - The layout-compatible port record shared with the native module
//! - Dynamic library loading with `libloading`
//! - Port lifecycle management (Initialization/EstimatorPort/Termination)
//! - Release of native-owned buffers on every exit path
//!
//! # Safety
//!
//! The native module is trusted to honour its own ABI. This crate confines
//! every raw pointer to [`abi`] and [`lifecycle`]; callers only see slices,
//! vectors and [`PortInfo`](lib_types::PortInfo).
//!
//! 1. **Layout**: [`abi::EstimatorPortN`] is `#[repr(C)]` and layout-tested
//! 2. **State machine**: session states reject out-of-order calls before they
//!    reach native code
//! 3. **Exclusivity**: sessions are `!Sync` and mutate through `&mut self`
//! 4. **Scoped release**: dropping a live session calls the terminator

pub mod abi;
pub mod error;
pub mod loader;
pub mod lifecycle;

#[cfg(any(test, feature = "stub"))]
pub mod stub;

pub use error::{PortError, PortResult};
pub use loader::{EntryPoints, EstimatorLibrary, LibraryFormat};
pub use lifecycle::{EstimatorPort, EstimatorSession};
pub use lib_types::{LifecycleState, PortInfo};
