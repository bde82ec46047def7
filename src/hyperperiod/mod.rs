//! Hyperperiod calculation for real-valued task periods.
//!
//! The hyperperiod of a set of periodic tasks is the Least Common Multiple
//! (LCM) of all their periods — the smallest window after which the arrival
//! pattern repeats.  The feasibility tester uses it as the exact EDF test
//! horizon whenever it exists and is small enough; otherwise it falls back
//! to a safety bound.
//!
//! Periods in the model are `f64`, and an LCM only exists over integers, so
//! the calculation has three distinct failure cases a caller must be able to
//! tell apart:
//!
//! * no valid periods at all,
//! * a period that is not integral in the model's time unit (no LCM exists),
//! * `u64` overflow while folding the LCM.
//!
//! Each is a separate [`HyperperiodError`] variant — a collapsed `0` return
//! would leave the caller unable to pick the right fallback.

pub mod math;

use math::{integral_units, lcm_of_slice};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors that can occur during hyperperiod calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HyperperiodError {
    /// The period slice was empty (or every period was non-positive).
    NoValidPeriods,

    /// A period is not a whole number of time units; the task set has no
    /// hyperperiod.  Carries the offending value.
    NonIntegral { period_milli: u64 },

    /// LCM calculation overflowed `u64`.  Contains the two operands so the
    /// caller can log a useful message.
    Overflow { a: u64, b: u64 },
}

impl std::fmt::Display for HyperperiodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HyperperiodError::NoValidPeriods => {
                write!(f, "no tasks with a valid (positive) period")
            }
            HyperperiodError::NonIntegral { period_milli } => write!(
                f,
                "period {:.3} is not integral in the model time unit",
                *period_milli as f64 / 1000.0
            ),
            HyperperiodError::Overflow { a, b } => {
                write!(f, "LCM overflow computing lcm({a}, {b})")
            }
        }
    }
}

impl std::error::Error for HyperperiodError {}

// ── hyperperiod ───────────────────────────────────────────────────────────────

/// Hyperperiod of a set of real-valued periods, as a real number.
///
/// Duplicates are removed and the periods are sorted before folding, so the
/// result is independent of task order.
///
/// # Errors
/// * [`HyperperiodError::NoValidPeriods`] — empty input or all non-positive.
/// * [`HyperperiodError::NonIntegral`] — some period has no integral
///   representation; the caller should fall back to its safety horizon.
/// * [`HyperperiodError::Overflow`] — the folded LCM exceeded `u64`.
pub fn hyperperiod(periods: &[f64]) -> Result<f64, HyperperiodError> {
    let mut units: Vec<u64> = Vec::with_capacity(periods.len());
    let mut any_positive = false;
    for &p in periods {
        if p <= 0.0 {
            continue;
        }
        any_positive = true;
        match integral_units(p) {
            Some(u) => units.push(u),
            None => {
                return Err(HyperperiodError::NonIntegral {
                    period_milli: (p * 1000.0).round() as u64,
                })
            }
        }
    }
    if !any_positive {
        return Err(HyperperiodError::NoValidPeriods);
    }

    units.sort_unstable();
    units.dedup();

    lcm_of_slice(&units).map(|h| h as f64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
