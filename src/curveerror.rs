use serde::Serialize;
use thiserror::Error;

use crate::manager::managererror::ManagerError;

/// Per-instrument mismatch reported when a bond curve fails to calibrate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationDiagnostic {
    pub instrument: String,
    pub target_pv: f64,
    pub model_pv: f64,
    pub diff: f64,
    pub square_diff: f64,
}

impl CalibrationDiagnostic {
    pub fn new(instrument: String, target_pv: f64, model_pv: f64) -> CalibrationDiagnostic {
        let diff = target_pv - model_pv;
        CalibrationDiagnostic {
            instrument,
            target_pv,
            model_pv,
            diff,
            square_diff: diff * diff,
        }
    }
}

#[derive(Debug, Error)]
pub enum CurveError {
    /// Malformed or inconsistent input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A component was used before it was initialized.
    #[error("state error: {0}")]
    State(String),

    #[error("x={x} is out of range [{min}, {max}]")]
    Range { x: f64, min: f64, max: f64 },

    #[error("convergence error: {message}")]
    Convergence {
        message: String,
        diagnostics: Vec<CalibrationDiagnostic>,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("optimizer error: {0}")]
    Optimizer(String),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CurveError {
    pub fn validation(message: impl Into<String>) -> CurveError {
        CurveError::Validation(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> CurveError {
        CurveError::NotImplemented(message.into())
    }

    pub fn convergence(message: impl Into<String>) -> CurveError {
        CurveError::Convergence {
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[CalibrationDiagnostic] {
        match self {
            CurveError::Convergence { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

impl From<argmin::core::Error> for CurveError {
    fn from(error: argmin::core::Error) -> Self {
        CurveError::Optimizer(error.to_string())
    }
}

pub type CurveResult<T> = Result<T, CurveError>;
