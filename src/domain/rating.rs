//! Running-average seller rating.
//!
//! `avg' = (avg * count + new) / (count + 1)`, `count' = count + 1`.
//! Pure arithmetic; the ledger store applies the result to the account
//! row inside its own critical section.

use crate::domain::error::EscrowError;

/// Lowest accepted rating value.
pub const MIN_RATING: f64 = 0.0;
/// Highest accepted rating value.
pub const MAX_RATING: f64 = 5.0;

/// Stateless running-average rating calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingEngine;

impl RatingEngine {
    /// Fold one new rating into a running average.
    ///
    /// Accepts any value in [0.0, 5.0] even though the deal flow only
    /// ever submits 5; out-of-range values are a validation error.
    pub fn update(avg: f64, count: u32, new_rating: f64) -> Result<(f64, u32), EscrowError> {
        if !(MIN_RATING..=MAX_RATING).contains(&new_rating) {
            return Err(EscrowError::Validation(format!(
                "rating must be in [{MIN_RATING}, {MAX_RATING}], got {new_rating}"
            )));
        }
        let next_count = count + 1;
        let next_avg = (avg * f64::from(count) + new_rating) / f64::from(next_count);
        Ok((next_avg, next_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rating_replaces_default() {
        // A fresh account shows 5.0 with zero completed deals; the first
        // real rating must not be diluted by the display default.
        let (avg, count) = RatingEngine::update(5.0, 0, 5.0).unwrap();
        assert_eq!(avg, 5.0);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_running_average_sequence() {
        let (avg, count) = RatingEngine::update(5.0, 0, 5.0).unwrap();
        let (avg, count) = RatingEngine::update(avg, count, 3.0).unwrap();
        assert_eq!(avg, 4.0);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(RatingEngine::update(5.0, 1, 5.1).is_err());
        assert!(RatingEngine::update(5.0, 1, -0.5).is_err());
    }

    #[test]
    fn test_boundary_values_accepted() {
        assert!(RatingEngine::update(2.5, 4, 0.0).is_ok());
        assert!(RatingEngine::update(2.5, 4, 5.0).is_ok());
    }
}
