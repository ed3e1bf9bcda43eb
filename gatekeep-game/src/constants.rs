//! Centralized limits and tuning constants for Gatekeep game logic.
//!
//! The admission and rejection caps are part of the public contract of a
//! session; everything else here tunes numerics or names stream domains.

// Session limits -----------------------------------------------------------
/// Admissions after which a session completes successfully.
pub const ADMIT_CAP: u32 = 1_000;
/// Rejections after which a session fails.
pub const REJECT_CAP: u32 = 20_000;

// Failure messages ---------------------------------------------------------
pub(crate) const MSG_MAX_REJECTIONS: &str = "Maximum rejections reached";
pub(crate) const MSG_CONSTRAINTS_INFEASIBLE: &str =
    "Cannot meet minimum constraints with remaining capacity";

// Stream domains -----------------------------------------------------------
pub(crate) const STREAM_PERSON: &[u8] = b"person";
pub(crate) const STREAM_STATISTICS: &[u8] = b"statistics";

// Numerics -----------------------------------------------------------------
/// Slack allowed when checking symmetry and the unit diagonal.
pub(crate) const MATRIX_TOLERANCE: f64 = 1e-9;
/// Pivots with magnitude below this are treated as zero.
pub(crate) const PIVOT_EPSILON: f64 = 1e-12;
/// Row variance drift (from 1.0) reported as a sampling diagnostic.
pub(crate) const VARIANCE_DRIFT_TOLERANCE: f64 = 1e-6;

