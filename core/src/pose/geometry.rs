//! Joint angle geometry

use super::{Joint, Landmark, PoseFrame};

/// Interior angle at vertex `b`, in degrees within [0, 180].
///
/// Taken as the difference of the polar angles of rays `b→a` and `b→c`,
/// folded back when it exceeds 180. Missing or non-finite points give 0.0
/// so a partial detection never stops the frame loop.
pub fn angle(a: Option<&Landmark>, b: Option<&Landmark>, c: Option<&Landmark>) -> f64 {
    let (Some(a), Some(b), Some(c)) = (a, b, c) else {
        return 0.0;
    };
    if !(a.is_valid() && b.is_valid() && c.is_valid()) {
        return 0.0;
    }

    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }

    if degrees.is_nan() {
        0.0
    } else {
        degrees
    }
}

/// Angle at `vertex` from a frame, or `None` if any of the three joints
/// was not detected.
pub fn joint_angle(frame: &PoseFrame, a: Joint, vertex: Joint, c: Joint) -> Option<f64> {
    let a = frame.get(a)?;
    let b = frame.get(vertex)?;
    let c = frame.get(c)?;
    Some(angle(Some(a), Some(b), Some(c)))
}
