//! Planar-mechanism kinematics: joint/link topology, a symbolic
//! triangulation compiler, and a numerical constraint solver for arbitrary
//! linkages.
//!
//! Two ways to go from a mechanism to joint positions:
//! - [`triangulate::t_config`] compiles the mechanism and a driver set into
//!   an ordered stack of closed-form constructions ([`triangulate::EStack`]),
//!   cheap to replay for every new input angle.
//! - [`solver::SolverSystem`] builds a constraint system for the same
//!   mechanism and drives a BFGS minimizer to a fixed point; it handles
//!   topologies the triangulation compiler cannot fully resolve.
pub mod error;
mod expr_str;
pub mod formula;
pub mod joint;
pub mod solver;
pub mod triangulate;

pub use error::{KinematicError, Result};
pub use joint::{JointType, VLink, VPoint};
pub use solver::{DataKey, DataValue, JointPosition, Precision, SolverSystem};
pub use triangulate::{t_config, EStack, Expr, Sym};
