//! Matching the general solution's constants against initial conditions.

use crate::basis::{GeneralSolution, ParticularSolution};
use crate::error::{ResponseError, ResponseResult};
use crate::model::InitialConditions;
use log::debug;
use nalgebra::{Matrix2, Vector2};

/// Resolves the constants of `general` so that the solution meets `initial` at `t = 0`.
///
/// Order 1 divides directly; order 2 inverts the 2x2 matrix of basis values
/// and first derivatives. A determinant within `tolerance` of zero, relative
/// to the product of the column norms, is reported as `SingularInitialSystem`.
pub fn resolve_constants(
    general: &GeneralSolution,
    initial: &InitialConditions,
    tolerance: f64,
) -> ResponseResult<ParticularSolution> {
    let basis = &general.basis;
    let state = initial.state(basis.len())?;

    let values = match basis.functions.as_slice() {
        [only] => {
            let pivot = only.value_at(0.0);
            if pivot.abs() <= tolerance {
                return Err(ResponseError::SingularInitialSystem { determinant: pivot });
            }
            vec![state[0] / pivot]
        }
        [first, second] => {
            let matrix = Matrix2::new(
                first.value_at(0.0),
                second.value_at(0.0),
                first.derivative_at(0.0),
                second.derivative_at(0.0),
            );
            let determinant = matrix.determinant();
            // Columns may differ in scale by many orders of magnitude.
            let scale = matrix.column(0).norm() * matrix.column(1).norm();
            if determinant.abs() <= tolerance * scale {
                return Err(ResponseError::SingularInitialSystem { determinant });
            }
            let inverse = matrix
                .try_inverse()
                .ok_or(ResponseError::SingularInitialSystem { determinant })?;
            let solution = inverse * Vector2::new(state[0], state[1]);
            vec![solution[0], solution[1]]
        }
        other => {
            return Err(ResponseError::invalid(format!(
                "basis of size {} is not first or second order",
                other.len()
            )))
        }
    };

    let constants = basis
        .functions
        .iter()
        .map(|f| (f.slot, values[f.slot.index()]))
        .collect::<Vec<_>>();
    debug!("resolved constants {constants:?}");

    Ok(ParticularSolution {
        basis: basis.clone(),
        expression: basis.combine(&values),
        constants,
    })
}
