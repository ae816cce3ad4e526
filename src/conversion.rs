//! Internal time conversion helpers.

use ffmpeg_next::Rational;

/// Convert a stream time base to a seconds-per-tick factor.
///
/// Returns `None` for degenerate time bases (zero numerator or denominator).
pub fn seconds_per_tick(time_base: Rational) -> Option<f64> {
    if time_base.numerator() == 0 || time_base.denominator() == 0 {
        return None;
    }
    Some(time_base.numerator() as f64 / time_base.denominator() as f64)
}

/// Convert a task offset in milliseconds to seconds.
pub fn millis_to_seconds(milliseconds: u64) -> f64 {
    milliseconds as f64 / 1e3
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::Rational;

    use super::{millis_to_seconds, seconds_per_tick};

    #[test]
    fn common_time_bases() {
        assert_eq!(seconds_per_tick(Rational::new(1, 1000)), Some(0.001));
        assert_eq!(seconds_per_tick(Rational::new(1, 25)), Some(0.04));
        assert_eq!(seconds_per_tick(Rational::new(0, 1)), None);
        assert_eq!(seconds_per_tick(Rational::new(1, 0)), None);
    }

    #[test]
    fn milliseconds_to_seconds() {
        assert_eq!(millis_to_seconds(1500), 1.5);
        assert_eq!(millis_to_seconds(0), 0.0);
    }
}
