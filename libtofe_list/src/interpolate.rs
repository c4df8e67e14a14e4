/// Result of a table lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup {
    Value(f64),
    OutOfRange { min: f64, max: f64 },
}

/// Linear interpolation in a table of (x, y) points sorted by strictly increasing x.
///
/// Uses a binary search for the bracketing pair. Queries exactly on a node give the
/// stored y of that node. Queries outside [min x, max x] (or any query on an empty
/// table) are reported as out of range.
pub fn interpolate_sorted(points: &[(f64, f64)], x: f64) -> Lookup {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Lookup::OutOfRange {
            min: f64::NAN,
            max: f64::NAN,
        };
    };
    if !(x >= first.0 && x <= last.0) {
        return Lookup::OutOfRange {
            min: first.0,
            max: last.0,
        };
    }
    // Index of the first point with x_i >= x
    let upper = points.partition_point(|p| p.0 < x);
    let (x_hi, y_hi) = points[upper];
    if x_hi == x || upper == 0 {
        return Lookup::Value(y_hi);
    }
    let (x_lo, y_lo) = points[upper - 1];
    Lookup::Value(y_lo + (y_hi - y_lo) * (x - x_lo) / (x_hi - x_lo))
}
