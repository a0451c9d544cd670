//! Closed-form geometric constructions.
//!
//! `pla`/`plap`/`pllp` are the classic point-pivot constructions; `plpp`/
//! `pxy` generalize the same idea to slider joints.

/// Point from a known point, a length and an angle (the driver primitive).
pub fn pla(c1: [f64; 2], d0: f64, a0: f64) -> [f64; 2] {
    [c1[0] + d0 * a0.cos(), c1[1] + d0 * a0.sin()]
}

/// Point from a known point, a length, an angle offset from a second pivot.
pub fn plap(c1: [f64; 2], d0: f64, a0: f64, c2: [f64; 2]) -> [f64; 2] {
    let a1 = f64::atan2(c2[1] - c1[1], c2[0] - c1[0]) + a0;
    [c1[0] + d0 * a1.cos(), c1[1] + d0 * a1.sin()]
}

/// Point from two known points and two lengths (circle/circle
/// intersection). `inv` selects which of the two roots is returned; a
/// non-finite result is returned (as `NAN`) when the circles do not
/// intersect.
pub fn pllp(c1: [f64; 2], d0: f64, d1: f64, c2: [f64; 2], inv: bool) -> [f64; 2] {
    let dx = c2[0] - c1[0];
    let dy = c2[1] - c1[1];
    let d = dx.hypot(dy);
    if d > d0 + d1 || d < (d0 - d1).abs() || (d < 1e-20 && (d0 - d1).abs() < 1e-20) {
        return [f64::NAN, f64::NAN];
    }
    let a = (d0 * d0 - d1 * d1 + d * d) / (2. * d);
    let h = (d0 * d0 - a * a).sqrt();
    let xm = c1[0] + a * dx / d;
    let ym = c1[1] + a * dy / d;
    if inv {
        [xm + h * dy / d, ym - h * dx / d]
    } else {
        [xm - h * dy / d, ym + h * dx / d]
    }
}

/// Point at a fixed distance `d0` from `c1`, constrained to lie on the line
/// through `c2`/`c3` (circle/line intersection). `op` selects the root with
/// the smaller (`false`) or larger (`true`) parametric offset along the
/// line; a non-finite result is returned when the circle misses the line.
pub fn plpp(c1: [f64; 2], d0: f64, c2: [f64; 2], c3: [f64; 2], op: bool) -> [f64; 2] {
    let ux = c3[0] - c2[0];
    let uy = c3[1] - c2[1];
    let len = ux.hypot(uy);
    if len < 1e-20 {
        return [f64::NAN, f64::NAN];
    }
    let (ux, uy) = (ux / len, uy / len);
    // Solve |c2 + t*u - c1|^2 = d0^2 for t.
    let wx = c2[0] - c1[0];
    let wy = c2[1] - c1[1];
    let b = 2. * (wx * ux + wy * uy);
    let c = wx * wx + wy * wy - d0 * d0;
    let disc = b * b - 4. * c;
    if disc < 0. {
        return [f64::NAN, f64::NAN];
    }
    let root = disc.sqrt();
    let (t_lo, t_hi) = (((-b - root) / 2.), ((-b + root) / 2.));
    let t = if op { t_hi } else { t_lo };
    [c2[0] + t * ux, c2[1] + t * uy]
}

/// Point by translating `c1` with fixed axial offsets.
pub fn pxy(c1: [f64; 2], lx: f64, ly: f64) -> [f64; 2] {
    [c1[0] + lx, c1[1] + ly]
}

/// Clockwise test used for deterministic triangle-branch selection.
///
/// `clockwise(c1, c2, c3) := cross((c2 - c1), (c3 - c2)) >= 0`; zero counts
/// as clockwise.
pub fn clockwise(c1: [f64; 2], c2: [f64; 2], c3: [f64; 2]) -> bool {
    let (ax, ay) = (c2[0] - c1[0], c2[1] - c1[1]);
    let (bx, by) = (c3[0] - c2[0], c3[1] - c2[1]);
    ax * by - ay * bx >= 0.
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pla_moves_by_polar_offset() {
        let p = pla([0., 0.], 2., 0.);
        assert_abs_diff_eq!(p[0], 2., epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 0., epsilon = 1e-12);
    }

    #[test]
    fn pllp_reproduces_known_triangle() {
        // 3-4-5 triangle: c1=(0,0), c2=(5,0), d0=3, d1=4.
        let p = pllp([0., 0.], 3., 4., [5., 0.], false);
        assert_abs_diff_eq!(p[0], 9. / 5., epsilon = 1e-9);
        assert_abs_diff_eq!(p[1], -12. / 5., epsilon = 1e-9);
        let p_inv = pllp([0., 0.], 3., 4., [5., 0.], true);
        assert_abs_diff_eq!(p_inv[1], 12. / 5., epsilon = 1e-9);
    }

    #[test]
    fn pllp_out_of_reach_is_nan() {
        let p = pllp([0., 0.], 1., 1., [10., 0.], false);
        assert!(p[0].is_nan() && p[1].is_nan());
    }

    #[test]
    fn plpp_lands_on_line_at_distance() {
        let p = plpp([0., 3.], 5., [0., 0.], [1., 0.], true);
        assert_abs_diff_eq!(p[1], 0., epsilon = 1e-9);
        assert_abs_diff_eq!((p[0] - 0f64).hypot(p[1] - 3.), 5., epsilon = 1e-9);
    }

    #[test]
    fn pxy_is_rigid_translation() {
        let p = pxy([1., 1.], 2., -3.);
        assert_eq!(p, [3., -2.]);
    }

    #[test]
    fn clockwise_boundary_counts_as_clockwise() {
        // Degenerate colinear triple -> cross product is exactly zero.
        assert!(clockwise([0., 0.], [1., 0.], [2., 0.]));
    }
}
