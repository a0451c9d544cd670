//! Runs the BFGS minimizer over a built [`SolverSystem`] (component D, §4.D,
//! hosted on the `argmin`/`argmin-math` stack per §6a) and edits its inputs.
use super::constraint::Cell;
use super::system::{DataCell, DataKey, DataValue, SolverSystem};
use crate::error::{KinematicError, Result};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::BFGS;
use log::warn;
use nalgebra::{DMatrix, DVector};

/// Iteration/tolerance preset named in §4.D/§6a.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    /// Fast, loose convergence; the interactive default.
    Rough,
    /// Slow, tight convergence.
    Fine,
}

impl Precision {
    fn max_iters(self) -> u64 {
        match self {
            Self::Rough => 200,
            Self::Fine => 2000,
        }
    }

    fn tolerance(self) -> f64 {
        match self {
            Self::Rough => 1e-6,
            Self::Fine => 1e-12,
        }
    }
}

/// A solved joint position, per the §4.D step 4 output shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointPosition {
    /// The single coordinate of an R joint (or a free-floating one).
    Single([f64; 2]),
    /// Slot anchor and pin, for P/RP joints.
    Slider { slot: [f64; 2], pin: [f64; 2] },
}

struct CostProblem<'a> {
    system: &'a SolverSystem,
}

impl CostProblem<'_> {
    fn total_cost(&self, params: &[f64]) -> f64 {
        let get = |cell: Cell| self.system.resolve(cell, params);
        self.system.constraints.iter().map(|c| c.residual(&get)).sum()
    }
}

impl CostFunction for CostProblem<'_> {
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        Ok(self.total_cost(p.as_slice()))
    }
}

impl Gradient for CostProblem<'_> {
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    /// Central finite differences: individual constraint partials are cheap
    /// scalar expressions, but not worth hand-deriving across five
    /// constraint kinds (§6a).
    fn gradient(&self, p: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        const H: f64 = 1e-6;
        let base = p.as_slice().to_vec();
        let mut grad = vec![0.; base.len()];
        for (i, g) in grad.iter_mut().enumerate() {
            let mut fwd = base.clone();
            let mut bwd = base.clone();
            fwd[i] += H;
            bwd[i] -= H;
            *g = (self.total_cost(&fwd) - self.total_cost(&bwd)) / (2. * H);
        }
        Ok(DVector::from_vec(grad))
    }
}

impl SolverSystem {
    /// Run the minimizer and, on success, write the solution back into the
    /// `params` pool and return every joint's solved position.
    pub fn solve(&mut self, precision: Precision) -> Result<Vec<JointPosition>> {
        if self.params.is_empty() {
            let cost = CostProblem { system: self }.total_cost(&[]);
            return if cost <= precision.tolerance() {
                Ok(self.read_positions())
            } else {
                warn!("fully-constrained system violates its own constraints: cost = {cost}");
                Err(KinematicError::NoSolution)
            };
        }

        let n = self.params.len();
        let init = DVector::from_vec(self.params.as_slice().to_vec());
        let linesearch = MoreThuenteLineSearch::new();
        let solver = BFGS::new(linesearch);
        let init_hessian = DMatrix::identity(n, n);
        let problem = CostProblem { system: self };
        let run = Executor::new(problem, solver)
            .configure(|state| {
                state.param(init).inv_hessian(init_hessian).max_iters(precision.max_iters())
            })
            .run();

        let best = run.ok().and_then(|res| res.state().best_param.clone());
        let Some(best) = best else {
            warn!("BFGS executor failed to produce a solution");
            return Err(KinematicError::NoSolution);
        };
        let final_cost = CostProblem { system: self }.total_cost(best.as_slice());
        if final_cost > precision.tolerance() {
            warn!("solver stalled above tolerance: cost = {final_cost}");
            return Err(KinematicError::NoSolution);
        }
        self.params.as_mut_slice().copy_from_slice(best.as_slice());
        Ok(self.read_positions())
    }

    fn read_positions(&self) -> Vec<JointPosition> {
        let params = self.params.as_slice();
        self.joint_points
            .iter()
            .zip(&self.joint_base)
            .map(|(&pin, base)| {
                let pin_xy = [self.resolve(pin.x, params), self.resolve(pin.y, params)];
                match base {
                    Some(b) => JointPosition::Slider {
                        slot: [self.resolve(b.x, params), self.resolve(b.y, params)],
                        pin: pin_xy,
                    },
                    None => JointPosition::Single(pin_xy),
                }
            })
            .collect()
    }

    /// Rebind driver angles in place. Rejects any key outside the set
    /// originally passed to [`SolverSystem::build`] (§4.D, §8 scenario S5).
    pub fn set_inputs(&mut self, new: &[((usize, usize), f64)]) -> Result<()> {
        for (key, _) in new {
            if !self.input_order().contains(key) {
                return Err(KinematicError::UnsupportedEdit(format!(
                    "{key:?} is not a declared driver input"
                )));
            }
        }
        for &(key, angle_deg) in new {
            let pos = self.input_order().iter().position(|&k| k == key).unwrap();
            let idx = self.input_cells()[pos];
            self.constants.as_mut_slice()[idx] = angle_deg.to_radians();
        }
        Ok(())
    }

    /// The currently bound driver angles, in declaration order, degrees.
    pub fn show_inputs(&self) -> Vec<((usize, usize), f64)> {
        self.input_order()
            .iter()
            .zip(self.input_cells())
            .map(|(&key, &idx)| (key, self.constants.as_slice()[idx].to_degrees()))
            .collect()
    }

    /// Rebind known coordinates/lengths in place. Rejects any key outside
    /// the set originally passed to [`SolverSystem::build`].
    pub fn set_data(&mut self, new: &[(DataKey, DataValue)]) -> Result<()> {
        for (key, _) in new {
            if !self.data_order().contains(key) {
                return Err(KinematicError::UnsupportedEdit(format!(
                    "{key:?} is not a declared data key"
                )));
            }
        }
        for &(key, value) in new {
            let pos = self.data_order().iter().position(|&k| k == key).unwrap();
            match (self.data_cells()[pos], value) {
                (DataCell::Coord(xc, yc), DataValue::Coord(x, y)) => {
                    self.write_cell(xc, x);
                    self.write_cell(yc, y);
                }
                (DataCell::Distance(dc), DataValue::Distance(d)) => self.write_cell(dc, d),
                _ => {
                    return Err(KinematicError::UnsupportedEdit(format!(
                        "{key:?} does not accept this value shape"
                    )))
                }
            }
        }
        Ok(())
    }

    fn write_cell(&mut self, cell: Cell, value: f64) {
        match cell {
            Cell::Param(i) => self.params.as_mut_slice()[i] = value,
            Cell::Constant(i) => self.constants.as_mut_slice()[i] = value,
            Cell::Data(i) => self.data_values.as_mut_slice()[i] = value,
        }
    }

    /// The currently bound known data, in declaration order.
    pub fn show_data(&self) -> Vec<(DataKey, DataValue)> {
        let params = self.params.as_slice();
        self.data_order()
            .iter()
            .zip(self.data_cells())
            .map(|(&key, &cell)| {
                let value = match cell {
                    DataCell::Coord(xc, yc) => {
                        DataValue::Coord(self.resolve(xc, params), self.resolve(yc, params))
                    }
                    DataCell::Distance(dc) => DataValue::Distance(self.resolve(dc, params)),
                };
                (key, value)
            })
            .collect()
    }
}
