//! The numerical constraint solver (components C and D, §4.C/§4.D).
//!
//! Builds a parameter pool and constraint list from a mechanism ([`build`]),
//! then drives an external BFGS minimizer to a fixed point ([`solve`]).
//!
//! [`build`]: SolverSystem::build
//! [`solve`]: SolverSystem::solve
mod arena;
mod constraint;
mod drive;
mod system;

pub use drive::{JointPosition, Precision};
pub use system::{DataKey, DataValue, SolverSystem};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{JointType, VPoint};
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    fn fourbar() -> Vec<VPoint> {
        vec![
            VPoint::r_joint("ground,L1", 0., 0.),
            VPoint::r_joint("ground,L3", 0., 90.),
            VPoint::r_joint("L1,L2", 10., 30.),
            VPoint::r_joint("L2,L3", 70., 30.),
        ]
    }

    /// S1: at `angle = 0`, the driven joint lands exactly on
    /// `(d(P0, P2), 0)`; link lengths (invariant 9) hold regardless of
    /// which branch the undriven joint settles into.
    #[test]
    fn solve_fourbar_places_driver_at_zero_degrees() {
        let vpoints = fourbar();
        let d02 = vpoints[0].distance(&vpoints[2]);
        let mut sys = SolverSystem::build(&vpoints, &[((0, 2), 0.)], &HashMap::new()).unwrap();
        let solved = sys.solve(Precision::Fine).unwrap();

        let JointPosition::Single(p2) = solved[2] else { panic!("joint 2 is an R joint") };
        assert_abs_diff_eq!(p2[0], d02, epsilon = 1e-6);
        assert_abs_diff_eq!(p2[1], 0., epsilon = 1e-6);

        let JointPosition::Single(p0) = solved[0] else { panic!("joint 0 is an R joint") };
        let JointPosition::Single(p1) = solved[1] else { panic!("joint 1 is an R joint") };
        let JointPosition::Single(p3) = solved[3] else { panic!("joint 3 is an R joint") };
        assert_abs_diff_eq!((p2[0] - p0[0]).hypot(p2[1] - p0[1]), d02, epsilon = 1e-6);
        assert_abs_diff_eq!(
            (p3[0] - p2[0]).hypot(p3[1] - p2[1]),
            vpoints[2].distance(&vpoints[3]),
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            (p3[0] - p1[0]).hypot(p3[1] - p1[1]),
            vpoints[1].distance(&vpoints[3]),
            epsilon = 1e-6
        );
    }

    /// S2: a grounded crank (P0, P2) driving an RP slider (P3) whose slot
    /// runs along the x-axis through the origin. At a 90-degree crank
    /// angle the slider's pin lands at `x(P0) + sqrt(d(P2,P3)^2 -
    /// d(P0,P2)^2)`, seeded at that exact configuration so the branch the
    /// circle/line intersection resolves to is unambiguous.
    #[test]
    fn solve_slider_crank_matches_closed_form_at_90_degrees() {
        let crank = 10.;
        let coupler = 20.;
        let pin_x = (coupler * coupler - crank * crank).sqrt();
        let mut slider = VPoint::slider_joint("ground,L2", JointType::RP, 0., 0., 0.).unwrap();
        slider.move_to([0., 0.], Some([pin_x, 0.]));
        let vpoints = vec![
            VPoint::r_joint("ground,L1", 0., 0.),
            VPoint::r_joint("L1,L2", 0., crank),
            slider,
        ];
        let mut sys = SolverSystem::build(&vpoints, &[((0, 1), 90.)], &HashMap::new()).unwrap();
        let solved = sys.solve(Precision::Fine).unwrap();

        let JointPosition::Slider { slot, pin } = solved[2] else { panic!("joint 2 is a slider") };
        let expected_x = vpoints[0].x + (coupler * coupler - crank * crank).sqrt();
        assert_abs_diff_eq!(pin[0], expected_x, epsilon = 1e-6);
        assert_abs_diff_eq!(pin[1], slot[1], epsilon = 1e-6);
    }

    /// S3: a lone grounded RP joint with `angle = 45`, `offset = 2`.
    /// After solving, the anchor-to-pin vector reproduces `true_offset()
    /// ≈ 2` (invariant 10) and is perpendicular to the slot direction.
    #[test]
    fn solve_rp_joint_offset_is_perpendicular() {
        let angle_deg = 45.;
        let offset = 2.;
        let theta: f64 = angle_deg.to_radians();
        let perp = (-theta.sin(), theta.cos());
        let pin = (offset * perp.0, offset * perp.1);

        let mut vp = VPoint::slider_joint("ground,L1", JointType::RP, angle_deg, 0., 0.).unwrap();
        vp.set_offset(offset);
        vp.move_to([0., 0.], Some([pin.0, pin.1]));
        let vpoints = vec![vp];

        let mut sys = SolverSystem::build(&vpoints, &[], &HashMap::new()).unwrap();
        let solved = sys.solve(Precision::Fine).unwrap();
        let JointPosition::Slider { slot, pin } = solved[0] else { panic!("joint is a slider") };

        let true_offset = (pin[0] - slot[0]).hypot(pin[1] - slot[1]);
        assert_abs_diff_eq!(true_offset, offset, epsilon = 1e-6);

        let dot = (pin[0] - slot[0]) * theta.cos() + (pin[1] - slot[1]) * theta.sin();
        assert_abs_diff_eq!(dot, 0., epsilon = 1e-6);
    }

    #[test]
    fn build_rejects_out_of_range_driver() {
        let vpoints = fourbar();
        let err = SolverSystem::build(&vpoints, &[((0, 9), 0.)], &HashMap::new());
        assert!(err.is_err());
    }

    #[test]
    fn same_points_compares_topology_only() {
        let vpoints = fourbar();
        let a = SolverSystem::build(&vpoints, &[((0, 2), 0.)], &HashMap::new()).unwrap();
        let b = SolverSystem::build(&vpoints, &[((0, 2), 30.)], &HashMap::new()).unwrap();
        assert!(a.same_points(&b));

        let mut other = fourbar();
        other.push(VPoint::r_joint("L3", 5., 5.));
        let c = SolverSystem::build(&other, &[((0, 2), 0.)], &HashMap::new()).unwrap();
        assert!(!a.same_points(&c));
    }

    #[test]
    fn set_inputs_rejects_undeclared_key() {
        let vpoints = fourbar();
        let mut sys = SolverSystem::build(&vpoints, &[((0, 2), 0.)], &HashMap::new()).unwrap();
        assert!(sys.set_inputs(&[((1, 3), 0.)]).is_err());
        assert!(sys.set_inputs(&[((0, 2), 45.)]).is_ok());
        let shown = sys.show_inputs();
        assert_eq!(shown, vec![((0, 2), 45.)]);
    }

    #[test]
    fn set_data_rejects_undeclared_key() {
        let vpoints = fourbar();
        let mut data = HashMap::new();
        data.insert(DataKey::Joint(0), DataValue::Coord(0., 0.));
        let mut sys = SolverSystem::build(&vpoints, &[((0, 2), 0.)], &data).unwrap();
        assert!(sys.set_data(&[(DataKey::Joint(2), DataValue::Coord(1., 1.))]).is_err());
        assert!(sys.set_data(&[(DataKey::Joint(0), DataValue::Coord(1., 1.))]).is_ok());
        assert_eq!(sys.show_data(), vec![(DataKey::Joint(0), DataValue::Coord(1., 1.))]);
    }
}
