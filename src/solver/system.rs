//! Mechanism -> parameter pool + constraint list (component C, §4.C).
use super::arena::Arena;
use super::constraint::{Cell, Constraint, PointCell};
use crate::error::{KinematicError, Result};
use crate::joint::{JointType, VLink, VPoint};
use log::trace;
use std::collections::HashMap;

/// Key into the caller-supplied known-data map: either a single joint's
/// coordinate, or an unordered pair of joints' link-length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataKey {
    Joint(usize),
    /// Canonicalized so that `Pair(a, b) == Pair(b, a)`.
    Pair(usize, usize),
}

impl DataKey {
    /// Build a canonical pair key (`_sort_pairs` in the original design).
    pub fn pair(a: usize, b: usize) -> Self {
        if a <= b {
            Self::Pair(a, b)
        } else {
            Self::Pair(b, a)
        }
    }
}

/// A known value supplied for a [`DataKey`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataValue {
    Coord(f64, f64),
    Distance(f64),
}

#[derive(Clone, Copy, Debug)]
pub(super) enum DataCell {
    Coord(Cell, Cell),
    Distance(Cell),
}

enum Kind {
    Param,
    Constant,
    Data,
}

/// The built parameter pools and constraint list for one mechanism
/// snapshot. See §3/§4.C for the allocation rules this implements.
pub struct SolverSystem {
    pub(super) params: Arena<f64>,
    pub(super) constants: Arena<f64>,
    pub(super) data_values: Arena<f64>,
    pub(super) constraints: Vec<Constraint>,
    /// The "visible" point per joint: the single coordinate for R/no-link
    /// joints, the pin for P/RP joints.
    pub(super) joint_points: Vec<PointCell>,
    /// The slot-anchor point per joint, for P/RP joints only.
    pub(super) joint_base: Vec<Option<PointCell>>,
    slider_dir: HashMap<usize, PointCell>,
    input_order: Vec<(usize, usize)>,
    input_cells: Vec<usize>,
    data_order: Vec<DataKey>,
    data_cells: Vec<DataCell>,
    link_signature: Vec<(String, Vec<usize>)>,
}

impl SolverSystem {
    fn allocate_point(&mut self, kind: Kind, value: (f64, f64)) -> PointCell {
        match kind {
            Kind::Param => PointCell {
                x: Cell::Param(self.params.push(value.0)),
                y: Cell::Param(self.params.push(value.1)),
            },
            Kind::Constant => PointCell {
                x: Cell::Constant(self.constants.push(value.0)),
                y: Cell::Constant(self.constants.push(value.1)),
            },
            Kind::Data => PointCell {
                x: Cell::Data(self.data_values.push(value.0)),
                y: Cell::Data(self.data_values.push(value.1)),
            },
        }
    }

    fn is_rigid(p: PointCell) -> bool {
        !matches!(p.x, Cell::Param(_)) && !matches!(p.y, Cell::Param(_))
    }

    /// The point used to anchor a link-length constraint for joint `i` on
    /// `link_name`: the slot anchor when `link_name` is that joint's slot
    /// link, otherwise the joint's visible point.
    fn point_for_link(&self, vpoints: &[VPoint], i: usize, link_name: &str) -> PointCell {
        if vpoints[i].ty.is_slider() && vpoints[i].is_slot_link(link_name) {
            self.joint_base[i].expect("slider joint must have an allocated slot anchor")
        } else {
            self.joint_points[i]
        }
    }

    fn distance_cell(
        &mut self,
        vpoints: &[VPoint],
        data: &HashMap<DataKey, DataValue>,
        a: usize,
        b: usize,
        track: bool,
    ) -> Cell {
        let key = DataKey::pair(a, b);
        let value = match data.get(&key) {
            Some(DataValue::Distance(d)) => *d,
            _ => vpoints[a].distance(&vpoints[b]),
        };
        let cell = Cell::Constant(self.constants.push(value));
        if track && data.contains_key(&key) {
            self.data_order.push(key);
            self.data_cells.push(DataCell::Distance(cell));
        }
        cell
    }

    /// Build a solver system for `vpoints`, the ordered `(driver, driven) ->
    /// angle_deg` input set, and any externally known coordinates/lengths.
    pub fn build(
        vpoints: &[VPoint],
        inputs: &[((usize, usize), f64)],
        data: &HashMap<DataKey, DataValue>,
    ) -> Result<Self> {
        let vlinks = VLink::build(vpoints);
        let mut sys = Self {
            params: Arena::new(),
            constants: Arena::new(),
            data_values: Arena::new(),
            constraints: Vec::new(),
            joint_points: Vec::with_capacity(vpoints.len()),
            joint_base: Vec::with_capacity(vpoints.len()),
            slider_dir: HashMap::new(),
            input_order: Vec::new(),
            input_cells: Vec::new(),
            data_order: Vec::new(),
            data_cells: Vec::new(),
            link_signature: vlinks.iter().map(|l| (l.name.clone(), l.joints.clone())).collect(),
        };

        for (i, vp) in vpoints.iter().enumerate() {
            if vp.no_link() {
                let p = sys.allocate_point(Kind::Constant, (vp.x, vp.y));
                sys.joint_points.push(p);
                sys.joint_base.push(None);
                continue;
            }

            let grounded = vp.grounded();
            let data_key = DataKey::Joint(i);
            let coord = match data.get(&data_key) {
                Some(DataValue::Coord(x, y)) => Some((*x, *y)),
                _ => None,
            };
            let (anchor_kind, anchor_val) = match coord {
                Some(xy) => (Kind::Data, xy),
                None if grounded => (Kind::Constant, (vp.x, vp.y)),
                None => (Kind::Param, (vp.x, vp.y)),
            };

            if !vp.ty.is_slider() {
                let p = sys.allocate_point(anchor_kind, anchor_val);
                if coord.is_some() {
                    sys.data_order.push(data_key);
                    sys.data_cells.push(DataCell::Coord(p.x, p.y));
                }
                sys.joint_points.push(p);
                sys.joint_base.push(None);
                continue;
            }

            let base = sys.allocate_point(anchor_kind, anchor_val);
            if coord.is_some() {
                sys.data_order.push(data_key);
                sys.data_cells.push(DataCell::Coord(base.x, base.y));
            }

            let theta = vp.angle().to_radians();
            let dir_val = (anchor_val.0 + theta.cos(), anchor_val.1 + theta.sin());
            // Allocated into `params` even for a grounded slider: the slot
            // *direction* is a soft constraint (LineInternalAngle), not a
            // hard-coded constant, so the minimizer needs room to move it.
            let dir = sys.allocate_point(Kind::Param, dir_val);

            let pin_val = if vp.has_offset() && vp.true_offset() <= 0.1 {
                (anchor_val.0 + 0.1, anchor_val.1)
            } else {
                (vp.cx(), vp.cy())
            };
            let pin_kind =
                if !grounded && vp.pin_grounded() { Kind::Constant } else { Kind::Param };
            let pin = sys.allocate_point(pin_kind, pin_val);

            sys.joint_points.push(pin);
            sys.joint_base.push(Some(base));
            sys.slider_dir_insert(i, dir);
        }

        sys.build_link_length_constraints(vpoints, &vlinks, data);
        sys.build_slider_constraints(vpoints, &vlinks);
        sys.build_driver_constraints(vpoints, inputs)?;

        trace!(
            "solver system built: {} params, {} constants, {} constraints",
            sys.params.len(),
            sys.constants.len(),
            sys.constraints.len()
        );
        Ok(sys)
    }

    fn build_link_length_constraints(
        &mut self,
        vpoints: &[VPoint],
        vlinks: &[VLink],
        data: &HashMap<DataKey, DataValue>,
    ) {
        for link in vlinks {
            if link.is_ground() || link.joints.len() < 2 {
                continue;
            }
            let a = link.joints[0];
            let b = link.joints[1];
            let pa = self.point_for_link(vpoints, a, &link.name);
            let pb = self.point_for_link(vpoints, b, &link.name);
            if !(Self::is_rigid(pa) && Self::is_rigid(pb)) {
                let d = self.distance_cell(vpoints, data, a, b, true);
                self.constraints.push(Constraint::P2PDistance(pa, pb, d));
            }
            for &c in &link.joints[2..] {
                let pc = self.point_for_link(vpoints, c, &link.name);
                let dac = self.distance_cell(vpoints, data, a, c, true);
                self.constraints.push(Constraint::P2PDistance(pa, pc, dac));
                let dbc = self.distance_cell(vpoints, data, b, c, true);
                self.constraints.push(Constraint::P2PDistance(pb, pc, dbc));
            }
        }
    }

    fn build_slider_constraints(&mut self, vpoints: &[VPoint], vlinks: &[VLink]) {
        for (i, vp) in vpoints.iter().enumerate() {
            if !vp.ty.is_slider() {
                continue;
            }
            let base = self.joint_base[i].expect("slider has a base point");
            let dir = *self.slider_dir_get(i);
            let pin = self.joint_points[i];
            let slot = (base, dir);

            if vp.grounded() {
                let theta_cell = Cell::Constant(self.constants.push(vp.angle().to_radians()));
                self.constraints.push(Constraint::LineInternalAngle(slot, theta_cell));
            } else if let Some(mate) = vlinks
                .iter()
                .find(|l| l.name == vp.links[0])
                .and_then(|l| l.joints.iter().copied().find(|&j| j != i))
            {
                let ang = (vp.slope_angle(&vpoints[mate], 2, 2) - vp.angle()).to_radians();
                let ang_cell = Cell::Constant(self.constants.push(ang));
                let mate_point = self.point_for_link(vpoints, mate, &vp.links[0]);
                self.constraints.push(Constraint::InternalAngle(slot, (base, mate_point), ang_cell));
            }

            if vp.has_offset() && vp.offset().unwrap_or(0.).abs() >= 1e-12 {
                // The pin does not ride the slot centerline itself: it's
                // offset from it by a fixed perpendicular distance (a
                // crank-slider with its pin mounted off-axis), and still
                // free to slide along that offset line. `anchor` is the
                // point on the offset line closest to `base` -- pinned at
                // exactly distance `offset` from `base` and a quarter turn
                // from the slot direction -- and the pin rides the line
                // through `anchor` parallel to the slot.
                let off = vp.offset().unwrap_or(0.).abs();
                let off_cell = Cell::Constant(self.constants.push(off));
                let quarter = Cell::Constant(self.constants.push(std::f64::consts::FRAC_PI_2));
                let parallel = Cell::Constant(self.constants.push(0.));
                let seed = (vp.cx(), vp.cy());
                let theta = vp.angle().to_radians();
                let anchor = self.allocate_point(Kind::Param, seed);
                let anchor_dir =
                    self.allocate_point(Kind::Param, (seed.0 + theta.cos(), seed.1 + theta.sin()));
                self.constraints.push(Constraint::P2PDistance(base, anchor, off_cell));
                self.constraints.push(Constraint::InternalAngle(slot, (base, anchor), quarter));
                self.constraints
                    .push(Constraint::InternalAngle(slot, (anchor, anchor_dir), parallel));
                self.constraints.push(Constraint::PointOnLine(pin, (anchor, anchor_dir)));
            } else if vp.has_offset() {
                self.constraints.push(Constraint::PointOnPoint(base, pin));
            } else {
                self.constraints.push(Constraint::PointOnLine(pin, slot));
            }

            if vp.ty == JointType::P {
                for link_name in &vp.links[1..] {
                    let Some(friend) = vlinks
                        .iter()
                        .find(|l| &l.name == link_name)
                        .and_then(|l| l.joints.iter().copied().find(|&j| j != i))
                    else {
                        continue;
                    };
                    let ang = (vp.slope_angle(&vpoints[friend], 1, 2) - vp.angle()).to_radians();
                    let ang_cell = Cell::Constant(self.constants.push(ang));
                    let friend_point = self.point_for_link(vpoints, friend, link_name);
                    self.constraints.push(Constraint::InternalAngle(
                        slot,
                        (pin, friend_point),
                        ang_cell,
                    ));
                }
            }
        }
    }

    fn build_driver_constraints(
        &mut self,
        vpoints: &[VPoint],
        inputs: &[((usize, usize), f64)],
    ) -> Result<()> {
        for &((b, d), angle_deg) in inputs {
            if b >= vpoints.len() || d >= vpoints.len() {
                return Err(KinematicError::MalformedJoint(format!(
                    "driver input ({b}, {d}) references a joint out of range"
                )));
            }
            let line = (self.joint_points[b], self.joint_points[d]);
            let idx = self.constants.push(angle_deg.to_radians());
            self.constraints.push(Constraint::LineInternalAngle(line, Cell::Constant(idx)));
            self.input_order.push((b, d));
            self.input_cells.push(idx);
        }
        Ok(())
    }

    fn slider_dir_insert(&mut self, i: usize, p: PointCell) {
        self.slider_dir.insert(i, p);
    }
    fn slider_dir_get(&self, i: usize) -> &PointCell {
        self.slider_dir.get(&i).expect("slider has a direction marker")
    }

    pub(super) fn resolve(&self, cell: Cell, params: &[f64]) -> f64 {
        match cell {
            Cell::Param(i) => params[i],
            Cell::Constant(i) => self.constants.as_slice()[i],
            Cell::Data(i) => self.data_values.as_slice()[i],
        }
    }

    /// Structural comparison of link memberships only (not coordinates);
    /// lets a caller decide whether a previously built system can be reused.
    pub fn same_points(&self, other: &Self) -> bool {
        self.link_signature == other.link_signature
    }

    pub(super) fn input_order(&self) -> &[(usize, usize)] {
        &self.input_order
    }
    pub(super) fn input_cells(&self) -> &[usize] {
        &self.input_cells
    }
    pub(super) fn data_order(&self) -> &[DataKey] {
        &self.data_order
    }
    pub(super) fn data_cells(&self) -> &[DataCell] {
        &self.data_cells
    }
}
