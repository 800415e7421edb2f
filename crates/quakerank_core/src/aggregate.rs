//! Log-scale magnitude aggregation.
//!
//! Magnitudes are log10 of an energy-proportional quantity, so a region's
//! total is `log10(sum(10^m))`, not a sum or mean of magnitudes. The sum is
//! evaluated relative to the largest input (`max + log10(sum(10^(m - max)))`)
//! so large inputs cannot overflow `f64`.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateError {
    /// No present magnitude to combine; `log10(0)` is undefined.
    EmptyInput,
    NonFiniteMagnitude(f64),
}

impl Display for AggregateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "cannot combine an empty magnitude list"),
            Self::NonFiniteMagnitude(value) => {
                write!(f, "cannot combine non-finite magnitude {value}")
            }
        }
    }
}

impl Error for AggregateError {}

/// Combines log-scale magnitudes by summing their linear energies.
///
/// Absent entries are skipped. Fails with [`AggregateError::EmptyInput`] when
/// no entry is present.
pub fn combine(magnitudes: &[Option<f64>]) -> Result<f64, AggregateError> {
    combine_present(magnitudes.iter().flatten().copied())
}

/// Same as [`combine`] over magnitudes that are all present.
pub fn combine_present<I>(magnitudes: I) -> Result<f64, AggregateError>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = magnitudes.into_iter().collect();
    if let Some(bad) = values.iter().copied().find(|value| !value.is_finite()) {
        return Err(AggregateError::NonFiniteMagnitude(bad));
    }

    let max = values
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, value| {
            Some(acc.map_or(value, |current| current.max(value)))
        })
        .ok_or(AggregateError::EmptyInput)?;

    let relative_sum: f64 = values.iter().map(|value| 10f64.powf(value - max)).sum();
    Ok(max + relative_sum.log10())
}

#[cfg(test)]
mod tests {
    use super::{combine, combine_present, AggregateError};

    fn naive(magnitudes: &[f64]) -> f64 {
        magnitudes.iter().map(|m| 10f64.powf(*m)).sum::<f64>().log10()
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn singleton_is_identity() {
        assert_eq!(combine(&[Some(0.0)]).unwrap(), 0.0);
        assert_eq!(combine(&[Some(5.0)]).unwrap(), 5.0);
    }

    #[test]
    fn two_magnitudes_sum_energies() {
        assert_close(combine(&[Some(5.0), Some(6.0)]).unwrap(), 6.041392685158225);
    }

    #[test]
    fn matches_direct_formula_for_mixed_inputs() {
        let inputs = [2.3, 4.71, -0.4, 3.0, 4.71, 1.05];
        let wrapped: Vec<Option<f64>> = inputs.iter().copied().map(Some).collect();
        assert_close(combine(&wrapped).unwrap(), naive(&inputs));
    }

    #[test]
    fn equal_magnitudes_add_log10_of_count() {
        let combined = combine_present([4.0; 10]).unwrap();
        assert_close(combined, 5.0);
    }

    #[test]
    fn absent_entries_are_skipped() {
        assert_close(
            combine(&[None, Some(5.0), None, Some(6.0)]).unwrap(),
            6.041392685158225,
        );
    }

    #[test]
    fn empty_or_all_absent_input_fails_fast() {
        assert_eq!(combine(&[]), Err(AggregateError::EmptyInput));
        assert_eq!(combine(&[None, None]), Err(AggregateError::EmptyInput));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(matches!(
            combine(&[Some(1.0), Some(f64::INFINITY)]),
            Err(AggregateError::NonFiniteMagnitude(_))
        ));
    }

    #[test]
    fn very_large_magnitudes_do_not_overflow() {
        let combined = combine_present([400.0, 400.0]).unwrap();
        assert_close(combined, 400.0 + 2f64.log10());
    }
}
