//! Rectangle-to-quadrilateral projective maps for tray rectification.
//!
//! The tray canvas is always an axis-aligned rectangle and the tray outline
//! in the photo is always four corners, so the map is solved in closed form
//! (unit square to quad, composed with the canvas scale) instead of a
//! least-squares fit.

mod warp;

use nalgebra::{Matrix3, Vector3};

pub(crate) use warp::warp_masked;

const EPS: f64 = 1e-9;

/// Why a corner quad cannot be used as a rectification target.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum QuadError {
    #[error("tray corners contain a non-finite coordinate")]
    NonFinite,

    #[error("canvas must be at least 2x2 pixels, got {width}x{height}")]
    CanvasTooSmall { width: u32, height: u32 },

    #[error("tray corners are degenerate (collinear or self-intersecting)")]
    Degenerate,
}

/// Project `(x, y)` through `h`. Points mapped to infinity come back as NaN.
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Map from the unit square onto `quad` (TL, TR, BR, BL):
/// `(0,0) -> TL`, `(1,0) -> TR`, `(1,1) -> BR`, `(0,1) -> BL`.
fn unit_square_to_quad(quad: &[[f64; 2]; 4]) -> Result<Matrix3<f64>, QuadError> {
    let [[x0, y0], [x1, y1], [x2, y2], [x3, y3]] = *quad;
    let sx = x0 - x1 + x2 - x3;
    let sy = y0 - y1 + y2 - y3;

    // Parallelograms are affine: the projective row stays (0, 0, 1).
    let (g, h) = if sx.abs() < EPS && sy.abs() < EPS {
        (0.0, 0.0)
    } else {
        let (dx1, dy1) = (x1 - x2, y1 - y2);
        let (dx2, dy2) = (x3 - x2, y3 - y2);
        let den = dx1 * dy2 - dx2 * dy1;
        if den.abs() < EPS {
            return Err(QuadError::Degenerate);
        }
        ((sx * dy2 - dx2 * sy) / den, (dx1 * sy - sx * dy1) / den)
    };

    #[rustfmt::skip]
    let m = Matrix3::new(
        x1 - x0 + g * x1, x3 - x0 + h * x3, x0,
        y1 - y0 + g * y1, y3 - y0 + h * y3, y0,
        g,                h,                1.0,
    );
    if m.determinant().abs() < EPS {
        return Err(QuadError::Degenerate);
    }
    Ok(m)
}

/// Homography taking canvas pixel coordinates of a `width x height` canvas
/// onto the quad `corners` (TL, TR, BR, BL) so that canvas corner pixels land
/// exactly on the tray corners.
pub fn rect_to_quad(
    width: u32,
    height: u32,
    corners: &[[f64; 2]; 4],
) -> Result<Matrix3<f64>, QuadError> {
    if width < 2 || height < 2 {
        return Err(QuadError::CanvasTooSmall { width, height });
    }
    if corners.iter().flatten().any(|v| !v.is_finite()) {
        return Err(QuadError::NonFinite);
    }
    let square = unit_square_to_quad(corners)?;
    let to_unit = Matrix3::new(
        1.0 / (width - 1) as f64,
        0.0,
        0.0,
        0.0,
        1.0 / (height - 1) as f64,
        0.0,
        0.0,
        0.0,
        1.0,
    );
    let m = square * to_unit;

    // A fold inside the canvas flips the sign of the projective denominator.
    let w = |x: f64, y: f64| (m * Vector3::new(x, y, 1.0))[2];
    let (cw, ch) = ((width - 1) as f64, (height - 1) as f64);
    let signs = [w(0.0, 0.0), w(cw, 0.0), w(cw, ch), w(0.0, ch)];
    if signs.iter().any(|s| *s <= 0.0) {
        return Err(QuadError::Degenerate);
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_maps(h: &Matrix3<f64>, from: [f64; 2], to: [f64; 2]) {
        let p = project(h, from[0], from[1]);
        assert_relative_eq!(p[0], to[0], epsilon = 1e-6);
        assert_relative_eq!(p[1], to[1], epsilon = 1e-6);
    }

    #[test]
    fn keystoned_quad_corners_are_hit() {
        let corners = [[40.0, 25.0], [560.0, 60.0], [520.0, 780.0], [70.0, 740.0]];
        let h = rect_to_quad(480, 750, &corners).unwrap();
        assert_maps(&h, [0.0, 0.0], corners[0]);
        assert_maps(&h, [479.0, 0.0], corners[1]);
        assert_maps(&h, [479.0, 749.0], corners[2]);
        assert_maps(&h, [0.0, 749.0], corners[3]);
        assert!(h[(2, 0)].abs() > 0.0 || h[(2, 1)].abs() > 0.0);
    }

    #[test]
    fn axis_aligned_target_is_a_pure_scale() {
        let corners = [[10.0, 20.0], [208.0, 20.0], [208.0, 118.0], [10.0, 118.0]];
        let h = rect_to_quad(100, 50, &corners).unwrap();
        assert_relative_eq!(h[(0, 0)], 2.0, epsilon = 1e-9);
        assert_relative_eq!(h[(1, 1)], 2.0, epsilon = 1e-9);
        assert_relative_eq!(h[(0, 2)], 10.0, epsilon = 1e-9);
        assert_eq!(h[(2, 0)], 0.0);
        assert_eq!(h[(2, 1)], 0.0);
        assert_maps(&h, [49.5, 24.5], [109.0, 69.0]);
    }

    #[test]
    fn inverse_brings_points_back() {
        let corners = [[12.0, 8.0], [110.0, 14.0], [104.0, 170.0], [6.0, 160.0]];
        let h = rect_to_quad(48, 75, &corners).unwrap();
        let inv = h.try_inverse().unwrap();
        let q = project(&h, 20.0, 33.0);
        let back = project(&inv, q[0], q[1]);
        assert_relative_eq!(back[0], 20.0, epsilon = 1e-8);
        assert_relative_eq!(back[1], 33.0, epsilon = 1e-8);
    }

    #[test]
    fn collinear_corners_are_rejected() {
        let corners = [[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [30.0, 30.0]];
        assert_eq!(rect_to_quad(10, 10, &corners), Err(QuadError::Degenerate));
    }

    #[test]
    fn bow_tie_is_rejected() {
        // TR and BR swapped.
        let corners = [[0.0, 0.0], [100.0, 100.0], [100.0, 0.0], [0.0, 100.0]];
        assert!(rect_to_quad(50, 50, &corners).is_err());
    }

    #[test]
    fn bad_inputs_are_reported() {
        let ok = [[0.0, 0.0], [9.0, 0.0], [9.0, 9.0], [0.0, 9.0]];
        assert_eq!(
            rect_to_quad(1, 10, &ok),
            Err(QuadError::CanvasTooSmall { width: 1, height: 10 })
        );
        let nan = [[f64::NAN, 0.0], [9.0, 0.0], [9.0, 9.0], [0.0, 9.0]];
        assert_eq!(rect_to_quad(10, 10, &nan), Err(QuadError::NonFinite));
    }
}
