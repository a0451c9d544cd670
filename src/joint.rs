//! The joint/link topology model (component A).
use crate::error::{KinematicError, Result};
use std::f64::consts::PI;

/// Kind of kinematic pair a [`VPoint`] represents.
///
/// + `R` — pure rotation (pin).
/// + `P` — pure translation (slider on a slot, no relative rotation).
/// + `RP` — combined rotation and translation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointType {
    /// Revolute pair.
    R,
    /// Prismatic pair.
    P,
    /// Revolute-prismatic pair.
    RP,
}

impl JointType {
    /// A slider in the [`P`](JointType::P)/[`RP`](JointType::RP) sense,
    /// i.e. it carries a slot anchor and a pin.
    pub const fn is_slider(self) -> bool {
        !matches!(self, Self::R)
    }
}

impl std::fmt::Display for JointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::R => "R",
            Self::P => "P",
            Self::RP => "RP",
        })
    }
}

fn split_links(links: &str) -> Vec<String> {
    let mut out = Vec::new();
    for name in links.split(',') {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n: &String| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// A kinematic joint.
///
/// R joints carry a single current coordinate in `c[0]`; `c[1]` mirrors it.
/// P/RP joints use `c[0]` as the slot anchor and `c[1]` as the pin.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct VPoint {
    /// Ordered, deduplicated link membership. First entry is the base/slot
    /// link; the rest are pin links.
    pub links: Vec<String>,
    /// Pair kind.
    pub ty: JointType,
    angle: f64,
    /// Design-time x coordinate (immutable after construction).
    pub x: f64,
    /// Design-time y coordinate (immutable after construction).
    pub y: f64,
    c: [[f64; 2]; 2],
    offset: Option<f64>,
    /// Visual metadata, not part of the kinematic contract.
    pub color: Option<String>,
}

impl PartialEq for VPoint {
    fn eq(&self, other: &Self) -> bool {
        self.links == other.links
            && self.c == other.c
            && self.ty == other.ty
            && self.x == other.x
            && self.y == other.y
            && self.angle == other.angle
    }
}

impl VPoint {
    /// Create a pure-rotation joint.
    pub fn r_joint(links: &str, x: f64, y: f64) -> Self {
        Self {
            links: split_links(links),
            ty: JointType::R,
            angle: 0.,
            x,
            y,
            c: [[x, y], [x, y]],
            offset: None,
            color: None,
        }
    }

    /// Create a slider joint (`P` or `RP`).
    ///
    /// Returns [`KinematicError::MalformedJoint`] if `ty` is
    /// [`JointType::R`].
    pub fn slider_joint(links: &str, ty: JointType, angle: f64, x: f64, y: f64) -> Result<Self> {
        if ty == JointType::R {
            return Err(KinematicError::MalformedJoint(
                "slider_joint requires a P or RP type".to_string(),
            ));
        }
        Ok(Self {
            links: split_links(links),
            ty,
            angle: angle.rem_euclid(180.),
            x,
            y,
            c: [[x, y], [x, y]],
            offset: None,
            color: None,
        })
    }

    /// Deep logical copy, preserving `c` exactly.
    pub fn copy(&self) -> Self {
        let mut v = self.clone();
        v.move_to(self.c[0], Some(self.c[1]));
        v
    }

    /// Slot orientation in degrees, meaningful only for `P`/`RP`.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Set the slot orientation, normalized to `[0, 180)`.
    pub fn rotate(&mut self, angle: f64) {
        self.angle = angle.rem_euclid(180.);
    }

    /// Overwrite the current coordinate(s).
    ///
    /// For `R` joints `c2` is ignored and both slots mirror `c1`. For
    /// `P`/`RP` joints `c[1]` becomes `c2` (defaulting to `c1` if `None`).
    pub fn move_to(&mut self, c1: [f64; 2], c2: Option<[f64; 2]>) {
        self.c[0] = c1;
        self.c[1] = match self.ty {
            JointType::R => c1,
            JointType::P | JointType::RP => c2.unwrap_or(c1),
        };
    }

    /// The current slot anchor (`c[0]`).
    pub fn c0(&self) -> [f64; 2] {
        self.c[0]
    }

    /// The current pin (`c[1]`); equal to `c[0]` for `R` joints.
    pub fn c1(&self) -> [f64; 2] {
        self.c[1]
    }

    /// Set the fixed pin/anchor offset distance.
    pub fn set_offset(&mut self, v: f64) {
        self.offset = Some(v);
    }

    /// Disable the offset constraint.
    pub fn disable_offset(&mut self) {
        self.offset = None;
    }

    /// Whether an offset constraint is active.
    pub fn has_offset(&self) -> bool {
        self.offset.is_some()
    }

    /// The managed offset scalar, if any.
    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    /// Euclidean distance between the current slot anchor and pin.
    pub fn true_offset(&self) -> f64 {
        let [ax, ay] = self.c[0];
        let [px, py] = self.c[1];
        (px - ax).hypot(py - ay)
    }

    /// Whether this joint is incident on the inertial frame `"ground"`.
    pub fn grounded(&self) -> bool {
        match self.ty {
            JointType::R => self.links.iter().any(|l| l == "ground"),
            JointType::P | JointType::RP => {
                self.links.first().is_some_and(|l| l == "ground")
            }
        }
    }

    /// Whether `"ground"` appears among the pin-side links.
    pub fn pin_grounded(&self) -> bool {
        self.links.len() > 1 && self.links[1..].iter().any(|l| l == "ground")
    }

    /// Whether `name` is this joint's first (slot/base) link.
    pub fn is_slot_link(&self, name: &str) -> bool {
        self.links.first().is_some_and(|l| l == name)
    }

    /// Whether this joint shares at least one link with `other`.
    pub fn same_link(&self, other: &Self) -> bool {
        self.links.iter().any(|l| other.links.contains(l))
    }

    /// Whether this joint belongs to no link (free floating).
    pub fn no_link(&self) -> bool {
        self.links.is_empty()
    }

    /// The "visible" coordinate: the slot anchor for `R`, the pin for
    /// `P`/`RP`.
    pub fn cx(&self) -> f64 {
        match self.ty {
            JointType::R => self.c[0][0],
            JointType::P | JointType::RP => self.c[1][0],
        }
    }

    /// See [`VPoint::cx`].
    pub fn cy(&self) -> f64 {
        match self.ty {
            JointType::R => self.c[0][1],
            JointType::P | JointType::RP => self.c[1][1],
        }
    }

    /// The contact-end coordinate used when measuring against a joint that
    /// shares a link named `shared`: `c[0]` unless this joint is not `R` and
    /// its base link differs from `shared`, in which case `c[1]` (pin end).
    fn contact_end(&self, shared: &str) -> [f64; 2] {
        if matches!(self.ty, JointType::R) || self.is_slot_link(shared) {
            self.c[0]
        } else {
            self.c[1]
        }
    }

    /// Distance to `other`. If the joints share a link, the distance is
    /// measured from each joint's contact end on that link; otherwise from
    /// `c[0]` on both.
    pub fn distance(&self, other: &Self) -> f64 {
        let shared = self.links.iter().find(|l| other.links.contains(l));
        let (a, b) = match shared {
            Some(shared) => (self.contact_end(shared), other.contact_end(shared)),
            None => (self.c[0], other.c[0]),
        };
        (a[0] - b[0]).hypot(a[1] - b[1])
    }

    fn endpoint(&self, num: u8) -> [f64; 2] {
        match num {
            0 => self.c[0],
            1 => self.c[1],
            _ => [self.x, self.y],
        }
    }

    /// Angle from horizontal of the vector `other -> self`, in degrees.
    ///
    /// `num1`/`num2` select which endpoint of `self`/`other` is used:
    /// `0` = slot anchor, `1` = pin, `>=2` = original design coordinate.
    pub fn slope_angle(&self, other: &Self, num1: u8, num2: u8) -> f64 {
        let [sx, sy] = self.endpoint(num1);
        let [ox, oy] = other.endpoint(num2);
        f64::atan2(sy - oy, sx - ox) * 180. / PI
    }

    /// `true` if any coordinate component is NaN.
    pub fn is_nan(&self) -> bool {
        self.c.iter().flatten().any(|v| v.is_nan())
    }

    /// Render in the `J[...]` expression form (see crate-level docs).
    pub fn to_expr(&self) -> String {
        crate::expr_str::vpoint_to_expr(self)
    }
}

impl std::str::FromStr for VPoint {
    type Err = KinematicError;

    fn from_str(s: &str) -> Result<Self> {
        crate::expr_str::vpoint_from_expr(s)
    }
}

impl std::fmt::Display for VPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_expr())
    }
}

/// A rigid body named group of joints.
///
/// The reserved name `"ground"` designates the inertial frame.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VLink {
    /// Link name.
    pub name: String,
    /// Indices (into the owning joint list) of the joints on this link, in
    /// insertion order.
    pub joints: Vec<usize>,
}

impl VLink {
    /// Create a new, empty link.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), joints: Vec::new() }
    }

    /// Whether this is the reserved ground link.
    pub fn is_ground(&self) -> bool {
        self.name == "ground"
    }

    /// Derive the set of [`VLink`]s implied by a joint list's `links`
    /// fields, in first-seen order.
    pub fn build(vpoints: &[VPoint]) -> Vec<Self> {
        let mut links: Vec<Self> = Vec::new();
        for (i, vp) in vpoints.iter().enumerate() {
            for name in &vp.links {
                match links.iter_mut().find(|l| &l.name == name) {
                    Some(l) => l.joints.push(i),
                    None => links.push(Self { name: name.clone(), joints: vec![i] }),
                }
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_normalizes() {
        let mut vp = VPoint::slider_joint("ground", JointType::P, 0., 0., 0.).unwrap();
        for a in [-370., -181., -1., 0., 179., 180., 181., 540.5] {
            vp.rotate(a);
            assert!((0. ..180.).contains(&vp.angle()), "angle {} out of range", vp.angle());
        }
    }

    #[test]
    fn copy_preserves_c() {
        let mut vp = VPoint::r_joint("ground,L1", 1., 2.);
        vp.move_to([3., 4.], None);
        let cp = vp.copy();
        assert_eq!(cp, vp);
        assert_eq!(cp.c0(), vp.c0());
        assert_eq!(cp.c1(), vp.c1());
    }

    #[test]
    fn distance_symmetric() {
        let a = VPoint::r_joint("ground,L1", 0., 0.);
        let b = VPoint::r_joint("L1,L2", 3., 4.);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert!((a.distance(&b) - 5.).abs() < 1e-12);
    }

    #[test]
    fn slope_angle_antisymmetric() {
        let a = VPoint::r_joint("ground", 0., 0.);
        let b = VPoint::r_joint("ground", 1., 1.);
        let ab = a.slope_angle(&b, 2, 2);
        let ba = b.slope_angle(&a, 2, 2);
        let diff = (ab - (ba - 180.)).rem_euclid(360.);
        assert!(diff < 1e-9 || (360. - diff) < 1e-9);
    }

    #[test]
    fn grounded_rules() {
        let r = VPoint::r_joint("ground,L1", 0., 0.);
        assert!(r.grounded());
        let p = VPoint::slider_joint("ground,L1", JointType::P, 0., 0., 0.).unwrap();
        assert!(p.grounded());
        let p2 = VPoint::slider_joint("L1,ground", JointType::P, 0., 0., 0.).unwrap();
        assert!(!p2.grounded());
        assert!(p2.pin_grounded());
    }

    #[test]
    fn slider_joint_rejects_r() {
        assert!(VPoint::slider_joint("ground", JointType::R, 0., 0., 0.).is_err());
    }

    #[test]
    fn vlink_build_orders_by_first_seen() {
        let vpoints = vec![
            VPoint::r_joint("ground,L1", 0., 0.),
            VPoint::r_joint("L1,L2", 1., 1.),
        ];
        let links = VLink::build(&vpoints);
        assert_eq!(links[0].name, "ground");
        assert_eq!(links[1].name, "L1");
        assert_eq!(links[1].joints, vec![0, 1]);
    }
}
