//! Closed-form position and heading from two observed landmarks.

use super::Pose;
use crate::geometry::{angle_between_points, circular_mean, normalize_angle};
use crate::objects::Flag;

/// Best-effort pose from a perception cycle's flag sightings.
///
/// Returns `None` whenever the geometry is degenerate: fewer than two
/// usable flags, an anti-parallel bearing pair, or reported distances
/// inconsistent with the landmark separation. The behavior layer must
/// tolerate cycles without an estimate.
pub fn triangulate(flags: &[Flag]) -> Option<Pose> {
    let usable: Vec<&Flag> = flags
        .iter()
        .filter(|f| f.usable() && f.coords().is_some())
        .collect();

    let (x, y) = triangulate_position(&usable)?;
    let heading = triangulate_heading((x, y), &usable)?;
    Some(Pose::new(x, y, heading))
}

/// Two-circle intersection from the first two usable flags.
pub fn triangulate_position(flags: &[&Flag]) -> Option<(f64, f64)> {
    if flags.len() < 2 {
        return None;
    }
    let (mut f1, mut f2) = (flags[0], flags[1]);

    let delta = normalize_angle(f1.bearing? - f2.bearing?);
    // anti-parallel bearings put both landmarks on one line through the
    // agent; the baseline decomposition below has no unique solution
    if (delta.abs() - 180.0).abs() < 1e-9 {
        return None;
    }
    // order the pair counter-clockwise as seen from the agent; this fixes
    // which of the two circle intersections the perpendicular component
    // points at (raw bearing comparison breaks across the +-180 seam)
    if delta < 0.0 {
        std::mem::swap(&mut f1, &mut f2);
    }

    let p1 = f1.coords()?;
    let p2 = f2.coords()?;
    let d1 = f1.distance?;
    let d2 = f2.distance?;

    let (dx, dy) = (p2.0 - p1.0, p2.1 - p1.1);
    let baseline = dx.hypot(dy);
    if baseline < f64::EPSILON {
        return None;
    }
    let (ux, uy) = (dx / baseline, dy / baseline);
    // -90 degree rotation of the baseline direction
    let (rx, ry) = (uy, -ux);

    // law of cosines along the baseline
    let parallel = (baseline * baseline + d1 * d1 - d2 * d2) / (2.0 * baseline);
    let disc = d1 * d1 - parallel * parallel;
    if disc < 0.0 {
        return None;
    }
    let perp = disc.sqrt();

    Some((
        p1.0 + parallel * ux + perp * rx,
        p1.1 + parallel * uy + perp * ry,
    ))
}

/// Heading as the circular mean of (absolute direction to flag - bearing)
/// over every usable flag.
pub fn triangulate_heading(position: (f64, f64), flags: &[&Flag]) -> Option<f64> {
    let headings: Vec<f64> = flags
        .iter()
        .filter_map(|f| {
            let coords = f.coords()?;
            let bearing = f.bearing?;
            Some(normalize_angle(
                angle_between_points(position, coords) - bearing,
            ))
        })
        .collect();
    circular_mean(&headings)
}
