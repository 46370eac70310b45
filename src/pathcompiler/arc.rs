//! Elliptical arc flattening: SVG endpoint parameterization converted to
//! center parameterization, then sampled (§4.3 step 3).

/// Arcs are sampled at 17 points (including the start point, which the
/// caller already has); this returns the trailing 16.
const ARC_SAMPLES: usize = 17;

fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Converts an SVG `A` command's endpoint parameterization to center
/// parameterization and samples the resulting arc, returning `ARC_SAMPLES -
/// 1` points after (not including) `start`.
///
/// Follows the SVG 1.1 implementation notes (F.6.5): correct out-of-range
/// radii, rotate into the ellipse's local frame, solve for the center, then
/// derive start angle and sweep angle. Degenerate radii (`rx == 0.0 || ry ==
/// 0.0`) degrade to a single straight line segment to `end`.
pub fn flatten_arc(
    start: (f64, f64),
    rx: f64,
    ry: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    end: (f64, f64),
) -> Vec<(f64, f64)> {
    let mut rx = rx.abs();
    let mut ry = ry.abs();

    if rx == 0.0 || ry == 0.0 || start == end {
        return vec![end];
    }

    let phi = deg_to_rad(x_axis_rotation_deg);
    let (sin_phi, cos_phi) = (phi.sin(), phi.cos());

    let dx2 = (start.0 - end.0) / 2.0;
    let dy2 = (start.1 - end.1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let scale = lambda.sqrt();
        rx *= scale;
        ry *= scale;
    }

    let sign = if large_arc == sweep { -1.0 } else { 1.0 };
    let num = (rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p).max(0.0);
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let coef = if den == 0.0 { 0.0 } else { sign * (num / den).sqrt() };
    let cxp = coef * (rx * y1p) / ry;
    let cyp = coef * -(ry * x1p) / rx;

    let cx = cos_phi * cxp - sin_phi * cyp + (start.0 + end.0) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (start.1 + end.1) / 2.0;

    let angle = |ux: f64, uy: f64, vx: f64, vy: f64| -> f64 {
        let dot = ux * vx + uy * vy;
        let len = ((ux * ux + uy * uy) * (vx * vx + vy * vy)).sqrt();
        let mut a = (dot / len).clamp(-1.0, 1.0).acos();
        if ux * vy - uy * vx < 0.0 {
            a = -a;
        }
        a
    };

    let theta1 = angle(1.0, 0.0, (x1p - cxp) / rx, (y1p - cyp) / ry);
    let mut delta_theta = angle(
        (x1p - cxp) / rx,
        (y1p - cyp) / ry,
        (-x1p - cxp) / rx,
        (-y1p - cyp) / ry,
    );
    if !sweep && delta_theta > 0.0 {
        delta_theta -= 2.0 * std::f64::consts::PI;
    } else if sweep && delta_theta < 0.0 {
        delta_theta += 2.0 * std::f64::consts::PI;
    }

    let mut points = Vec::with_capacity(ARC_SAMPLES - 1);
    for i in 1..ARC_SAMPLES {
        let t = i as f64 / (ARC_SAMPLES - 1) as f64;
        let theta = theta1 + delta_theta * t;
        let ex = rx * theta.cos();
        let ey = ry * theta.sin();
        let x = cos_phi * ex - sin_phi * ey + cx;
        let y = sin_phi * ex + cos_phi * ey + cy;
        points.push((x, y));
    }
    // Ensure the last sample lands exactly on the SVG-specified endpoint
    // rather than whatever floating-point error the trig picked up.
    if let Some(last) = points.last_mut() {
        *last = end;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicircle_has_sixteen_points_and_ends_at_target() {
        let points = flatten_arc((0.0, 50.0), 50.0, 50.0, 0.0, false, true, (100.0, 50.0));
        assert_eq!(points.len(), 16);
        assert_eq!(points.last(), Some(&(100.0, 50.0)));
    }

    #[test]
    fn apex_near_top_of_semicircle() {
        // S4: midpoint of the 16 segments should land close to (50, 0) before
        // any safety-margin clipping is applied.
        let points = flatten_arc((0.0, 50.0), 50.0, 50.0, 0.0, false, true, (100.0, 50.0));
        let mid = points[points.len() / 2 - 1];
        assert!((mid.0 - 50.0).abs() < 5.0);
        assert!(mid.1 < 10.0);
    }

    #[test]
    fn degenerate_radius_degrades_to_line() {
        let points = flatten_arc((0.0, 0.0), 0.0, 10.0, 0.0, false, true, (10.0, 10.0));
        assert_eq!(points, vec![(10.0, 10.0)]);
    }
}
