//! The triangulation compiler (component B).
//!
//! Converts a mechanism plus its input set into an ordered list of
//! parametric geometric constructions ([`Expr`]) that, replayed in order,
//! yield every joint position without any nonlinear solve.
use crate::formula::{clockwise, pla, plpp};
use crate::joint::{JointType, VPoint};
use log::debug;
use std::collections::HashMap;

/// A symbol drawn from one of four namespaces: point, length, angle,
/// synthetic slider anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sym {
    /// A joint's visible coordinate (`c[0]` for `R`/`P`, `c[1]` for `RP`).
    P(usize),
    /// A joint's slot anchor (`c[0]`); only meaningful for sliders.
    Anchor(usize),
    /// A fresh length.
    L(usize),
    /// A fresh angle.
    A(usize),
    /// A synthetic slider slot-endpoint, one per `RP` production.
    S(usize),
}

impl std::fmt::Display for Sym {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P(i) => write!(f, "P{i}"),
            Self::Anchor(i) => write!(f, "A{i}P"),
            Self::L(i) => write!(f, "L{i}"),
            Self::A(i) => write!(f, "A{i}"),
            Self::S(i) => write!(f, "S{i}"),
        }
    }
}

/// A single tagged construction record.
#[derive(Clone, Copy, Debug)]
pub enum Expr {
    /// Point from a known point, a fresh length and a fresh angle (driver).
    Pla { c1: Sym, l: Sym, a: Sym, target: Sym },
    /// Point from a known point, a fresh length, an angle offset from a
    /// second pivot.
    Plap { c1: Sym, l: Sym, a: Sym, c2: Sym, target: Sym },
    /// Point from two known points and two fresh lengths (triangle).
    Pllp { c1: Sym, l0: Sym, l1: Sym, c2: Sym, target: Sym, inv: bool },
    /// Point at a fresh length from `c1`, projected onto the line `(c2,c3)`.
    Plpp { c1: Sym, l: Sym, c2: Sym, c3: Sym, target: Sym, op: bool },
    /// Point from a known point translated by two fresh axial lengths.
    Pxy { c1: Sym, lx: Sym, ly: Sym, target: Sym },
}

impl Expr {
    /// The symbol this construction resolves.
    pub fn target(&self) -> Sym {
        match *self {
            Self::Pla { target, .. }
            | Self::Plap { target, .. }
            | Self::Pllp { target, .. }
            | Self::Plpp { target, .. }
            | Self::Pxy { target, .. } => target,
        }
    }

    /// The tag used by [`EStack::as_list`].
    ///
    /// `PLA` and `PLAP` are rendered identically (`"PLAP"`); only the arity
    /// of the operand list distinguishes them downstream. This merge is
    /// preserved deliberately — see `DESIGN.md` ("PLA vs PLAP").
    fn tag(&self) -> &'static str {
        match self {
            Self::Pla { .. } => "PLAP",
            Self::Plap { .. } => "PLAP",
            Self::Pllp { .. } => "PLLP",
            Self::Plpp { .. } => "PLPP",
            Self::Pxy { .. } => "PXY",
        }
    }

    /// Render as `(tag, operand, operand, ...)`.
    pub fn as_tuple(&self) -> Vec<String> {
        let mut v = vec![self.tag().to_string()];
        match *self {
            Self::Pla { c1, l, a, target } => {
                v.extend([c1.to_string(), l.to_string(), a.to_string(), target.to_string()]);
            }
            Self::Plap { c1, l, a, c2, target } => {
                v.extend([
                    c1.to_string(),
                    l.to_string(),
                    a.to_string(),
                    c2.to_string(),
                    target.to_string(),
                ]);
            }
            Self::Pllp { c1, l0, l1, c2, target, .. } => {
                v.extend([
                    c1.to_string(),
                    l0.to_string(),
                    l1.to_string(),
                    c2.to_string(),
                    target.to_string(),
                ]);
            }
            Self::Plpp { c1, l, c2, c3, target, .. } => {
                v.extend([
                    c1.to_string(),
                    l.to_string(),
                    c2.to_string(),
                    c3.to_string(),
                    target.to_string(),
                ]);
            }
            Self::Pxy { c1, lx, ly, target } => {
                v.extend([c1.to_string(), lx.to_string(), ly.to_string(), target.to_string()]);
            }
        }
        v
    }
}

/// The ordered construction stack produced by [`t_config`].
#[derive(Clone, Debug, Default)]
pub struct EStack {
    exprs: Vec<Expr>,
}

impl EStack {
    /// The constructions, in execution order.
    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Render every construction as a tuple of strings, e.g.
    /// `("PLLP","P3","L7","L8","P5","P9")`.
    pub fn as_list(&self) -> Vec<Vec<String>> {
        self.exprs.iter().map(Expr::as_tuple).collect()
    }
}

struct SymGen {
    l: usize,
    a: usize,
}

impl SymGen {
    fn new() -> Self {
        Self { l: 0, a: 0 }
    }
    fn length(&mut self) -> Sym {
        let s = Sym::L(self.l);
        self.l += 1;
        s
    }
    fn angle(&mut self) -> Sym {
        let s = Sym::A(self.a);
        self.a += 1;
        s
    }
}

/// A working copy of a joint's topology, mutated in place by the P-to-RP
/// promotion pass (§4.B step 3).
#[derive(Clone)]
struct Work {
    links: Vec<String>,
    ty: JointType,
    angle: f64,
    pos: [f64; 2],
    grounded: bool,
    pin_grounded: bool,
    has_offset: bool,
}

fn promote_p_to_rp(work: &mut [Work]) {
    let bases: Vec<usize> = (0..work.len())
        .filter(|&i| work[i].ty == JointType::P && work[i].grounded)
        .collect();
    for base in bases {
        let base_links = work[base].links.clone();
        let slot_link = base_links[0].clone();
        let pin_links: Vec<String> = base_links[1..].to_vec();
        for n in 0..work.len() {
            if n == base || work[n].ty != JointType::R {
                continue;
            }
            if !work[n].links.iter().any(|l| pin_links.contains(l)) {
                continue;
            }
            let mut new_links = vec![slot_link.clone()];
            for l in work[n].links.clone() {
                if !base_links.contains(&l) {
                    new_links.push(l);
                }
            }
            work[n].ty = JointType::RP;
            work[n].angle = work[base].angle;
            work[n].links = new_links;
            work[n].grounded = work[n].links.first() == Some(&slot_link) && slot_link == "ground";
            work[n].pin_grounded =
                work[n].links.len() > 1 && work[n].links[1..].iter().any(|l| l == "ground");
        }
    }
}

/// Find up to `want` already-solved joints sharing a link with `n`.
fn reliable_friends(work: &[Work], status: &[bool], n: usize, want: usize) -> Vec<usize> {
    work.iter()
        .enumerate()
        .filter(|&(m, w)| m != n && status[m] && w.links.iter().any(|l| work[n].links.contains(l)))
        .map(|(m, _)| m)
        .take(want)
        .collect()
}

fn reliable_pin_friend(work: &[Work], status: &[bool], n: usize) -> Option<usize> {
    let pin_links = &work[n].links[1..];
    work.iter()
        .enumerate()
        .find(|&(m, w)| {
            m != n && status[m] && w.links.iter().any(|l| pin_links.contains(l))
        })
        .map(|(m, _)| m)
}

fn unsolved_pin_friends(work: &[Work], status: &[bool], n: usize) -> Vec<usize> {
    let pin_links = &work[n].links[1..];
    work.iter()
        .enumerate()
        .filter(|&(m, w)| {
            m != n && !status[m] && w.links.iter().any(|l| pin_links.contains(l))
        })
        .map(|(m, _)| m)
        .collect()
}

/// Compile `vpoints` and `inputs` (ordered `(driver, driven)` joint index
/// pairs) into an ordered construction stack.
///
/// If `status` is supplied, it is overwritten with which joints ended up
/// solved (see §7 — `t_config` never fails; under-determined mechanisms are
/// surfaced through a partially-`true` `status` instead).
pub fn t_config(
    vpoints: &[VPoint],
    inputs: &[(usize, usize)],
    mut status: Option<&mut Vec<bool>>,
) -> EStack {
    let n_joints = vpoints.len();
    let mut work: Vec<Work> = vpoints
        .iter()
        .map(|vp| Work {
            links: vp.links.clone(),
            ty: vp.ty,
            angle: vp.angle(),
            pos: [vp.x, vp.y],
            grounded: vp.grounded(),
            pin_grounded: vp.pin_grounded(),
            has_offset: vp.has_offset(),
        })
        .collect();

    promote_p_to_rp(&mut work);

    let mut solved = vec![false; n_joints];
    for (n, w) in work.iter().enumerate() {
        solved[n] = (w.ty == JointType::R && w.grounded) || w.links.is_empty();
    }

    let driver_of: HashMap<usize, usize> = inputs.iter().copied().collect();
    let mut sym = SymGen::new();
    let mut stack = Vec::new();

    // Driver emission: bases already solved get their PLA emitted immediately.
    for &(base, node) in inputs {
        if solved[base] && !solved[node] {
            let l = sym.length();
            let a = sym.angle();
            stack.push(Expr::Pla { c1: Sym::P(base), l, a, target: Sym::P(node) });
            solved[node] = true;
        }
    }

    let n_work = work.len();
    let mut idx = 0usize;
    let mut skip_times = 0usize;
    while solved.iter().any(|&s| !s) && skip_times < n_work.max(1) {
        let n = idx % n_work;
        idx += 1;
        if solved[n] {
            skip_times += 1;
            continue;
        }
        let made_progress = if let Some(&base) = driver_of.get(&n) {
            if work[n].ty == JointType::R && solved[base] {
                let l = sym.length();
                let a = sym.angle();
                stack.push(Expr::Pla { c1: Sym::P(base), l, a, target: Sym::P(n) });
                true
            } else {
                false
            }
        } else {
            match work[n].ty {
                JointType::R => {
                    let friends = reliable_friends(&work, &solved, n, 2);
                    if friends.len() < 2 {
                        false
                    } else {
                        let (mut fa, mut fb) = (friends[0], friends[1]);
                        if clockwise(work[fa].pos, work[n].pos, work[fb].pos) {
                            std::mem::swap(&mut fa, &mut fb);
                        }
                        let l0 = sym.length();
                        let l1 = sym.length();
                        stack.push(Expr::Pllp {
                            c1: Sym::P(fa),
                            l0,
                            l1,
                            c2: Sym::P(fb),
                            target: Sym::P(n),
                            inv: false,
                        });
                        true
                    }
                }
                JointType::P => {
                    if !work[n].grounded || work[n].pin_grounded || work[n].has_offset {
                        false
                    } else if let Some(fa) = reliable_pin_friend(&work, &solved, n) {
                        let lx = sym.length();
                        let ly = sym.length();
                        stack.push(Expr::Pxy { c1: Sym::P(fa), lx, ly, target: Sym::P(n) });
                        solved[n] = true;
                        for fb in unsolved_pin_friends(&work, &solved, n) {
                            let lx = sym.length();
                            let ly = sym.length();
                            stack.push(Expr::Pxy { c1: Sym::P(n), lx, ly, target: Sym::P(fb) });
                            solved[fb] = true;
                        }
                        true
                    } else {
                        false
                    }
                }
                JointType::RP => {
                    if !work[n].grounded || work[n].pin_grounded || work[n].has_offset {
                        false
                    } else {
                        let fa = reliable_pin_friend(&work, &solved, n);
                        let fa = fa.or_else(|| {
                            reliable_friends(&work, &solved, n, 1).into_iter().next()
                        });
                        match fa {
                            Some(fa) => {
                                // The synthetic slot-end point is derived
                                // directly from the (known, grounded) anchor
                                // and the fixed slot angle -- no friend pair
                                // is needed once groundedness is assumed.
                                // See DESIGN.md for why this departs from
                                // the friend-pairing description for the
                                // non-grounded case.
                                let unit = sym.length();
                                let theta = sym.angle();
                                stack.push(Expr::Pla {
                                    c1: Sym::Anchor(n),
                                    l: unit,
                                    a: theta,
                                    target: Sym::S(n),
                                });
                                let l = sym.length();
                                let op = (work[fa].pos[0] - work[n].pos[0] > 0.)
                                    ^ (work[n].angle > 90.);
                                stack.push(Expr::Plpp {
                                    c1: Sym::P(fa),
                                    l,
                                    c2: Sym::Anchor(n),
                                    c3: Sym::S(n),
                                    target: Sym::P(n),
                                    op,
                                });
                                true
                            }
                            None => false,
                        }
                    }
                }
            }
        };
        if made_progress {
            solved[n] = true;
            skip_times = 0;
        } else {
            skip_times += 1;
        }
    }

    let n_solved = solved.iter().filter(|&&s| s).count();
    debug!(
        "triangulation swept {n_joints} joints, solved {n_solved}, {} constructions emitted{}",
        stack.len(),
        if n_solved < n_joints { " (under-determined)" } else { "" }
    );

    if let Some(status) = status.as_deref_mut() {
        *status = solved;
    }
    EStack { exprs: stack }
}

/// Replay an [`EStack`] for a concrete mechanism and driver angles (degrees),
/// producing the slot-anchor/pin coordinate pair for every joint.
///
/// Length and angle symbol values are recovered from `vpoints`' original
/// design geometry, mirroring how the real-valued meaning of a symbol is
/// "attached by the consumer" per §4.B. Joints the stack never reached keep
/// their design-time coordinates.
pub fn execute(
    vpoints: &[VPoint],
    stack: &EStack,
    driver_angles: &HashMap<(usize, usize), f64>,
) -> Vec<[[f64; 2]; 2]> {
    let mut pos: Vec<[[f64; 2]; 2]> =
        vpoints.iter().map(|vp| [[vp.x, vp.y], [vp.x, vp.y]]).collect();
    let visible = |pos: &[[[f64; 2]; 2]], vp: &VPoint, i: usize| -> [f64; 2] {
        match vp.ty {
            JointType::R => pos[i][0],
            JointType::P | JointType::RP => pos[i][1],
        }
    };
    let mut synthetic: HashMap<usize, [f64; 2]> = HashMap::new();

    for e in stack.exprs() {
        match *e {
            Expr::Pla { c1, l: _, a: _, target } => {
                if let Sym::S(n) = target {
                    // Synthetic slot endpoint: anchor + unit vector(angle).
                    let anchor = match c1 {
                        Sym::Anchor(i) => pos[i][0],
                        Sym::P(i) => visible(&pos, &vpoints[i], i),
                        _ => unreachable!("PLA anchor operand must be a point"),
                    };
                    let theta = vpoints[n].angle().to_radians();
                    synthetic.insert(n, pla(anchor, 1., theta));
                    continue;
                }
                let Sym::P(bi) = c1 else { unreachable!("PLA driver base must be a point") };
                let Sym::P(ti) = target else { unreachable!("PLA target must be a point") };
                let d = vpoints[bi].distance(&vpoints[ti]);
                let theta = driver_angles.get(&(bi, ti)).copied().unwrap_or(0.).to_radians();
                let p = pla(visible(&pos, &vpoints[bi], bi), d, theta);
                write_visible(&mut pos, vpoints, ti, p);
            }
            Expr::Plap { .. } => unreachable!("triangulation never emits a true Plap record"),
            Expr::Pllp { c1, c2, target, inv, .. } => {
                let Sym::P(ci) = c1 else { unreachable!() };
                let Sym::P(cj) = c2 else { unreachable!() };
                let Sym::P(ti) = target else { unreachable!() };
                let d0 = vpoints[ci].distance(&vpoints[ti]);
                let d1 = vpoints[cj].distance(&vpoints[ti]);
                let p = crate::formula::pllp(
                    visible(&pos, &vpoints[ci], ci),
                    d0,
                    d1,
                    visible(&pos, &vpoints[cj], cj),
                    inv,
                );
                write_visible(&mut pos, vpoints, ti, p);
            }
            Expr::Plpp { c1, c2, c3, target, op, .. } => {
                let Sym::P(ci) = c1 else { unreachable!() };
                let Sym::Anchor(anchor_i) = c2 else { unreachable!() };
                let Sym::S(s_i) = c3 else { unreachable!() };
                let Sym::P(ti) = target else { unreachable!() };
                let d = vpoints[ci].distance(&vpoints[ti]);
                let anchor = pos[anchor_i][0];
                let s = synthetic[&s_i];
                let p = plpp(visible(&pos, &vpoints[ci], ci), d, anchor, s, op);
                write_visible(&mut pos, vpoints, ti, p);
            }
            Expr::Pxy { c1, target, .. } => {
                let Sym::P(ci) = c1 else { unreachable!() };
                let Sym::P(ti) = target else { unreachable!() };
                let lx = vpoints[ti].x - vpoints[ci].x;
                let ly = vpoints[ti].y - vpoints[ci].y;
                let p = crate::formula::pxy(visible(&pos, &vpoints[ci], ci), lx, ly);
                write_visible(&mut pos, vpoints, ti, p);
            }
        }
    }
    pos
}

fn write_visible(pos: &mut [[[f64; 2]; 2]], vpoints: &[VPoint], i: usize, p: [f64; 2]) {
    match vpoints[i].ty {
        JointType::R => pos[i] = [p, p],
        JointType::P | JointType::RP => pos[i][1] = p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn fourbar() -> Vec<VPoint> {
        vec![
            VPoint::r_joint("ground,L1", 0., 0.),
            VPoint::r_joint("ground,L3", 0., 90.),
            VPoint::r_joint("L1,L2", 10., 30.),
            VPoint::r_joint("L2,L3", 70., 30.),
        ]
    }

    #[test]
    fn determinism() {
        let vpoints = fourbar();
        let a = t_config(&vpoints, &[(0, 2)], None).as_list();
        let b = t_config(&vpoints, &[(0, 2)], None).as_list();
        assert_eq!(a, b);
    }

    #[test]
    fn soundness_every_target_solved_once() {
        let vpoints = fourbar();
        let mut status = Vec::new();
        let stack = t_config(&vpoints, &[(0, 2)], Some(&mut status));
        assert!(status.iter().all(|&s| s), "fourbar should be fully solved: {status:?}");
        assert!(!stack.exprs().is_empty());
    }

    #[test]
    fn pla_vs_plap_tag_merge_is_preserved() {
        let vpoints = fourbar();
        let stack = t_config(&vpoints, &[(0, 2)], None);
        let pla_row = stack
            .as_list()
            .into_iter()
            .find(|row| row.len() == 5)
            .expect("a PLA row (4 operands + tag) should be present");
        assert_eq!(pla_row[0], "PLAP");
    }

    #[test]
    fn under_determined_reports_partial_status() {
        // A lone floating joint with no driver and no friends can never be
        // triangulated.
        let vpoints = vec![VPoint::r_joint("L1,L2", 0., 0.), VPoint::r_joint("L1,L2", 1., 1.)];
        let mut status = Vec::new();
        let _ = t_config(&vpoints, &[], Some(&mut status));
        assert!(status.iter().any(|&s| !s));
    }

    /// S1: replaying the stack at `angle = 0` lands the driven joint
    /// exactly on `(d(P0, P2), 0)`.
    #[test]
    fn execute_places_driver_target_exactly() {
        let vpoints = fourbar();
        let stack = t_config(&vpoints, &[(0, 2)], None);
        let driver_angles = HashMap::from([((0, 2), 0.)]);
        let pos = execute(&vpoints, &stack, &driver_angles);

        let d02 = vpoints[0].distance(&vpoints[2]);
        assert_abs_diff_eq!(pos[2][0][0], d02, epsilon = 1e-9);
        assert_abs_diff_eq!(pos[2][0][1], 0., epsilon = 1e-9);
    }

    /// S4: two fourbars sharing only the `"ground"` link are solved
    /// independently -- each chain's driver only moves its own joints.
    #[test]
    fn execute_disjoint_chains_do_not_cross_talk() {
        let mut vpoints = fourbar();
        vpoints.extend([
            VPoint::r_joint("ground,M1", 100., 0.),
            VPoint::r_joint("ground,M3", 100., 90.),
            VPoint::r_joint("M1,M2", 110., 30.),
            VPoint::r_joint("M2,M3", 170., 30.),
        ]);
        let stack = t_config(&vpoints, &[(0, 2), (4, 6)], None);
        let driver_angles = HashMap::from([((0, 2), 0.), ((4, 6), 0.)]);
        let pos = execute(&vpoints, &stack, &driver_angles);

        let d02 = vpoints[0].distance(&vpoints[2]);
        let d46 = vpoints[4].distance(&vpoints[6]);
        assert_abs_diff_eq!(pos[2][0][0], d02, epsilon = 1e-9);
        assert_abs_diff_eq!(pos[2][0][1], 0., epsilon = 1e-9);
        assert_abs_diff_eq!(pos[6][0][0], 100. + d46, epsilon = 1e-9);
        assert_abs_diff_eq!(pos[6][0][1], 0., epsilon = 1e-9);
    }

    /// Invariant 8: driven at the fourbar's own design angle, both the
    /// triangulation replay and the numerical solver reproduce the
    /// original design coordinates (and therefore agree with each other).
    #[test]
    fn execute_agrees_with_solver_at_design_configuration() {
        use crate::solver::{JointPosition, Precision, SolverSystem};

        let vpoints = fourbar();
        let angle_deg = vpoints[2].slope_angle(&vpoints[0], 2, 2);
        let stack = t_config(&vpoints, &[(0, 2)], None);
        let driver_angles = HashMap::from([((0, 2), angle_deg)]);
        let triangulated = execute(&vpoints, &stack, &driver_angles);

        for (i, vp) in vpoints.iter().enumerate() {
            assert_abs_diff_eq!(triangulated[i][0][0], vp.x, epsilon = 1e-6);
            assert_abs_diff_eq!(triangulated[i][0][1], vp.y, epsilon = 1e-6);
        }

        let mut sys = SolverSystem::build(&vpoints, &[((0, 2), angle_deg)], &HashMap::new())
            .expect("fourbar builds");
        let solved =
            sys.solve(Precision::Fine).expect("fourbar at its own design angle should solve");
        for (i, vp) in vpoints.iter().enumerate() {
            let JointPosition::Single(p) = solved[i] else { panic!("fourbar joints are all R") };
            assert_abs_diff_eq!(p[0], vp.x, epsilon = 1e-3);
            assert_abs_diff_eq!(p[1], vp.y, epsilon = 1e-3);
        }
    }
}
