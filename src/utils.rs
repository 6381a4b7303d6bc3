/// Wraps an accumulated rotation angle back into `[-720, 720)` degrees.
///
/// Rotations are tracked over two full turns so spin animations can overshoot
/// 360 without snapping. A single wrap step is enough because callers only
/// ever add deltas smaller than a full wrap.
pub fn normalize_angle(angle: f32) -> f32 {
    const LIMIT: f32 = 720.0;

    if angle < -LIMIT {
        angle + LIMIT
    } else if angle >= LIMIT {
        angle - LIMIT
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_angles_inside_the_range() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(359.0), 359.0);
        assert_eq!(normalize_angle(-719.9), -719.9);
    }

    #[test]
    fn wraps_at_the_boundaries() {
        assert_eq!(normalize_angle(750.0), 30.0);
        assert_eq!(normalize_angle(-750.0), -30.0);
        assert_eq!(normalize_angle(720.0), 0.0);
        assert_eq!(normalize_angle(-720.0), -720.0);
    }
}
