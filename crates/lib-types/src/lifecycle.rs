//! Estimator session lifecycle types.

use crate::records::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one estimator handle.
///
/// Transitions are linear: `Uninitialized -> Ready -> Processing -> Terminated`.
/// There are no cycles and a terminated handle is never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Handle allocated and zeroed, initializer not yet called.
    Uninitialized,
    /// Initializer completed; dimensions and native buffers are populated.
    Ready,
    /// At least one step has been made.
    Processing,
    /// Terminator called; native buffers have been released.
    Terminated,
}

impl LifecycleState {
    /// Whether the step function may be called in this state.
    pub fn accepts_step(self) -> bool {
        matches!(self, Self::Ready | Self::Processing)
    }

    /// Whether native buffers are currently alive and need releasing.
    pub fn holds_native_buffers(self) -> bool {
        matches!(self, Self::Ready | Self::Processing)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Host-side snapshot of the port record, read once after initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Descriptive port name, if the module set one.
    pub name: Option<String>,

    /// Free-text port description, if the module set one.
    pub introduction: Option<String>,

    /// State dimension reported by the module.
    pub nx: i32,

    /// Observation dimension reported by the module.
    pub nz: i32,

    /// Number of prediction steps.
    pub predict_step: i32,

    /// Sampling interval.
    pub interval: f64,

    /// Prediction horizon.
    pub predict_time: f64,
}

impl PortInfo {
    /// Validated dimensions, or `None` if the module reported a non-positive size.
    pub fn dimensions(&self) -> Option<Dimensions> {
        if self.nx > 0 && self.nz > 0 {
            Some(Dimensions::new(self.nx as usize, self.nz as usize))
        } else {
            None
        }
    }

    /// Name for log lines, falling back to a placeholder.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed port>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(nx: i32, nz: i32) -> PortInfo {
        PortInfo {
            name: None,
            introduction: None,
            nx,
            nz,
            predict_step: 2,
            interval: 0.005,
            predict_time: 0.01,
        }
    }

    #[test]
    fn test_step_acceptance() {
        assert!(!LifecycleState::Uninitialized.accepts_step());
        assert!(LifecycleState::Ready.accepts_step());
        assert!(LifecycleState::Processing.accepts_step());
        assert!(!LifecycleState::Terminated.accepts_step());
    }

    #[test]
    fn test_port_info_dimensions() {
        assert_eq!(info(4, 2).dimensions(), Some(Dimensions::new(4, 2)));
        assert_eq!(info(0, 2).dimensions(), None);
        assert_eq!(info(4, -1).dimensions(), None);
        assert_eq!(info(4, 2).display_name(), "<unnamed port>");
    }
}
