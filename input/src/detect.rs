//! Threshold detection shared by the gesture engines.

use std::time::Duration;

use hud_geometry::{Point, UnitInterval};

use crate::Instant;

/// `true` if `pos` lies strictly farther than `tolerance` from `origin`.
///
/// A movement of exactly `tolerance` is still considered holding still.
pub fn exceeds_tolerance(origin: Point, pos: Point, tolerance: f64) -> bool {
    origin.distance_to(pos) > tolerance
}

/// The fraction of `duration` that has passed between `started` and `now`, clamped to `0..=1`.
///
/// A zero `duration` is complete immediately.
pub fn elapsed_fraction(started: Instant, now: Instant, duration: Duration) -> UnitInterval {
    if duration.is_zero() {
        return UnitInterval::ONE;
    }
    let elapsed = now.saturating_duration_since(started);
    UnitInterval::saturating(elapsed.as_secs_f64() / duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_boundary() {
        let origin = Point::new(0.0, 0.0);
        assert!(!exceeds_tolerance(origin, Point::new(11.0, 0.0), 12.0));
        assert!(!exceeds_tolerance(origin, Point::new(12.0, 0.0), 12.0));
        assert!(exceeds_tolerance(origin, Point::new(13.0, 0.0), 12.0));
        // Diagonal 5/12/13.
        assert!(exceeds_tolerance(origin, Point::new(5.0, 12.0), 12.0));
    }

    #[test]
    fn fraction_is_clamped() {
        let start = Instant::now();
        let duration = Duration::from_millis(800);
        assert_eq!(elapsed_fraction(start, start, duration), UnitInterval::ZERO);
        assert_eq!(
            elapsed_fraction(start, start + Duration::from_millis(400), duration),
            UnitInterval::new(0.5)
        );
        assert_eq!(
            elapsed_fraction(start, start + Duration::from_secs(3), duration),
            UnitInterval::ONE
        );
        assert_eq!(elapsed_fraction(start, start, Duration::ZERO), UnitInterval::ONE);
    }
}
