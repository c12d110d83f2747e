//! Typed views of the propagation kernel's JSON request and response.
//!
//! The kernel itself only sees strings; these exist for callers that would
//! rather not build JSON by hand.

use serde::Deserialize;
use serde::Serialize;

/// Input parameters for one P.528 curve.
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P528Request {
    /// Height of the low terminal, in user units.
    pub h_1__user_units: f64,
    /// Height of the high terminal, in user units.
    pub h_2__user_units: f64,
    /// Time percentage.
    pub time: f64,
    #[serde(rename = "Polarization")]
    pub polarization: i32,
    /// Frequency, in MHz.
    pub f__mhz: f64,
    pub nbr_of_points: u32,
}

/// Output of one P.528 curve.
///
/// Every field defaults so that an error-only response (`{"error": "..."}`)
/// still parses.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P528Response {
    /// Basic transmission loss, in dB.
    pub A__db: Vec<f64>,
    /// Free space basic transmission loss, in dB.
    pub A_fs__db: Vec<f64>,
    /// Median atmospheric absorption loss, in dB.
    pub A_a__db: f64,
    #[serde(rename = "ModeOfPropagation")]
    pub mode_of_propagation: Vec<i32>,
    /// Path distances, in km.
    pub d__km: Vec<f64>,
    /// Elevation angle of the ray at the low terminal, in rad.
    pub theta_h1__rad: f64,
    /// Warning flags, OR-ed over every point.
    pub warnings: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl P528Response {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
