//! Constraint record types and their scalar residuals.
//!
//! Every constraint is built from [`Cell`] references (§9's stable-index
//! arena cells) rather than coordinates or raw pointers, so residual
//! evaluation is a pure function of whatever pool snapshot the caller hands
//! in -- the same constraint list is reused for every line-search step.

/// A reference to one scalar living in one of the three pools named in §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cell {
    Param(usize),
    Constant(usize),
    Data(usize),
}

/// A point view: two pool cells.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PointCell {
    pub x: Cell,
    pub y: Cell,
}

/// A line through two point views.
pub(crate) type LineCell = (PointCell, PointCell);

/// The constraint catalogue named in §4.C/§6a.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Constraint {
    PointOnPoint(PointCell, PointCell),
    P2PDistance(PointCell, PointCell, Cell),
    PointOnLine(PointCell, LineCell),
    /// Angle between two lines, measured `line1 - line0`.
    InternalAngle(LineCell, LineCell, Cell),
    /// Angle of a line from horizontal.
    LineInternalAngle(LineCell, Cell),
}

fn xy(get: &impl Fn(Cell) -> f64, p: PointCell) -> (f64, f64) {
    (get(p.x), get(p.y))
}

fn line_angle(get: &impl Fn(Cell) -> f64, l: LineCell) -> f64 {
    let (x0, y0) = xy(get, l.0);
    let (x1, y1) = xy(get, l.1);
    (y1 - y0).atan2(x1 - x0)
}

fn wrap_pi(a: f64) -> f64 {
    use std::f64::consts::PI;
    (a + PI).rem_euclid(2. * PI) - PI
}

impl Constraint {
    /// Squared residual; zero exactly at satisfaction. `get` resolves a
    /// [`Cell`] against whichever pool snapshot (current state, or a
    /// candidate line-search point) the caller is evaluating.
    pub(crate) fn residual(&self, get: impl Fn(Cell) -> f64) -> f64 {
        match *self {
            Self::PointOnPoint(p, q) => {
                let (px, py) = xy(&get, p);
                let (qx, qy) = xy(&get, q);
                (px - qx).powi(2) + (py - qy).powi(2)
            }
            Self::P2PDistance(p, q, d) => {
                let (px, py) = xy(&get, p);
                let (qx, qy) = xy(&get, q);
                ((px - qx).hypot(py - qy) - get(d)).powi(2)
            }
            Self::PointOnLine(p, line) => {
                let (px, py) = xy(&get, p);
                let (x0, y0) = xy(&get, line.0);
                let (x1, y1) = xy(&get, line.1);
                let (ux, uy) = (x1 - x0, y1 - y0);
                let len = ux.hypot(uy).max(1e-12);
                let cross = (px - x0) * uy - (py - y0) * ux;
                (cross / len).powi(2)
            }
            Self::InternalAngle(l0, l1, a) => {
                wrap_pi(line_angle(&get, l1) - line_angle(&get, l0) - get(a)).powi(2)
            }
            Self::LineInternalAngle(line, a) => wrap_pi(line_angle(&get, line) - get(a)).powi(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64, next: &mut usize, values: &mut Vec<f64>) -> PointCell {
        let xi = *next;
        values.push(x);
        *next += 1;
        let yi = *next;
        values.push(y);
        *next += 1;
        PointCell { x: Cell::Constant(xi), y: Cell::Constant(yi) }
    }

    #[test]
    fn point_on_point_zero_when_coincident() {
        let mut values = Vec::new();
        let mut next = 0;
        let a = pt(1., 2., &mut next, &mut values);
        let b = pt(1., 2., &mut next, &mut values);
        let get = |c: Cell| match c {
            Cell::Constant(i) => values[i],
            _ => unreachable!(),
        };
        assert_eq!(Constraint::PointOnPoint(a, b).residual(get), 0.);
    }

    #[test]
    fn p2p_distance_penalizes_mismatch() {
        let mut values = Vec::new();
        let mut next = 0;
        let a = pt(0., 0., &mut next, &mut values);
        let b = pt(3., 4., &mut next, &mut values);
        values.push(10.); // wrong target distance
        let d = Cell::Constant(next);
        let get = |c: Cell| match c {
            Cell::Constant(i) => values[i],
            _ => unreachable!(),
        };
        let r = Constraint::P2PDistance(a, b, d).residual(get);
        assert!((r - 25.).abs() < 1e-9); // (5 - 10)^2
    }

    #[test]
    fn point_on_line_zero_when_colinear() {
        let mut values = Vec::new();
        let mut next = 0;
        let p0 = pt(0., 0., &mut next, &mut values);
        let p1 = pt(2., 0., &mut next, &mut values);
        let p = pt(1., 0., &mut next, &mut values);
        let get = |c: Cell| match c {
            Cell::Constant(i) => values[i],
            _ => unreachable!(),
        };
        assert!(Constraint::PointOnLine(p, (p0, p1)).residual(get) < 1e-12);
    }
}
