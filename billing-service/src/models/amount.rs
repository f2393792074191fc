//! Currency-precision arithmetic for monetary amounts.
//!
//! Amounts enter the system as decimal numbers with at most `precision`
//! fractional digits and are stored as signed 64-bit minor units.
//! Precision is capped at 8 so `10^precision` is exactly representable as
//! a double and the reparse check below stays sound.

/// Upper bound for currency precision (fractional decimal digits).
pub const MAX_PRECISION: i64 = 8;

const EPSILON: f64 = 1e-9;

/// Whether `amount` has at most `precision` fractional digits: format to
/// exactly `precision` digits, reparse, and compare within 1e-9.
pub fn has_at_most_decimals(amount: f64, precision: i64) -> bool {
    if !(0..=MAX_PRECISION).contains(&precision) {
        return false;
    }

    let formatted = format!("{:.*}", precision as usize, amount);
    match formatted.parse::<f64>() {
        Ok(reparsed) => (amount - reparsed).abs() < EPSILON,
        Err(_) => false,
    }
}

/// Convert a major-unit amount to minor units: `floor(amount * 10^p + 0.5)`.
///
/// Callers must have validated the amount with [`has_at_most_decimals`]
/// first; the half-up rounding only corrects binary representation error.
pub fn to_minor_units(amount: f64, precision: i64) -> i64 {
    (amount * 10f64.powi(precision as i32) + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_amounts_within_precision() {
        assert!(has_at_most_decimals(10.99, 2));
        assert!(has_at_most_decimals(10.0, 2));
        assert!(has_at_most_decimals(10.0, 0));
        assert!(has_at_most_decimals(0.00000001, 8));
    }

    #[test]
    fn rejects_amounts_exceeding_precision() {
        assert!(!has_at_most_decimals(10.999, 2));
        assert!(!has_at_most_decimals(0.1, 0));
        assert!(!has_at_most_decimals(1.23456789, 4));
    }

    #[test]
    fn rejects_out_of_range_precision() {
        assert!(!has_at_most_decimals(1.0, -1));
        assert!(!has_at_most_decimals(1.0, 9));
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(10.99, 2), 1099);
        assert_eq!(to_minor_units(10.00, 2), 1000);
        assert_eq!(to_minor_units(5.50, 2), 550);
        assert_eq!(to_minor_units(7.0, 0), 7);
        assert_eq!(to_minor_units(0.00000001, 8), 1);
    }

    #[test]
    fn minor_units_round_trip_within_epsilon() {
        for precision in 0..=MAX_PRECISION {
            let scale = 10f64.powi(precision as i32);
            for raw in [0i64, 1, 42, 999, 123_456] {
                let amount = raw as f64 / scale;
                assert!(
                    has_at_most_decimals(amount, precision),
                    "{} should fit precision {}",
                    amount,
                    precision
                );
                let minor = to_minor_units(amount, precision);
                let back = minor as f64 / scale;
                assert!(
                    (back - amount).abs() < 1e-9,
                    "{} -> {} -> {} at precision {}",
                    amount,
                    minor,
                    back,
                    precision
                );
            }
        }
    }
}
