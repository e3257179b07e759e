use crate::discretization::mesh::{Face, Mesh};
use num_dual::DualNum;
use serde::Deserialize;

/// Boundary condition on a boundary face of the domain.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// Fixed value `u = value` on the face.
    Dirichlet { value: f64 },
    /// Fixed outward normal gradient `du/dn = flux` on the face.
    Neumann { flux: f64 },
}

impl Default for BoundaryCondition {
    fn default() -> Self {
        BoundaryCondition::Dirichlet { value: 0.0 }
    }
}

impl BoundaryCondition {
    /// Robin coefficients `(alpha, beta, gamma)` of `alpha u + beta du/dn = gamma`.
    pub fn coefficients(&self) -> (f64, f64, f64) {
        match *self {
            BoundaryCondition::Dirichlet { value } => (1.0, 0.0, value),
            BoundaryCondition::Neumann { flux } => (0.0, 1.0, flux),
        }
    }

    /// Ghost value mirrored across the face for interior value `u_i`.
    /// `delta` is the normal distance from the cell centroid to the face.
    pub fn ghost_value<T: DualNum<f64>>(&self, u_i: T, delta: f64) -> T {
        let (alpha, beta, gamma) = self.coefficients();
        robin_ghost_val(u_i, alpha, beta, gamma, delta)
    }

    /// Whether the condition pins the value of `u` on the face.
    pub fn fixes_value(&self) -> bool {
        self.coefficients().0 != 0.0
    }
}

const NORMAL_MATCH: f64 = 1e-6;

/// A condition for the boundary faces whose outward normal points along
/// `normal`, e.g. `[1, 0, 0]` for the right end of a line.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct BoundaryRule {
    pub normal: [f64; 3],
    pub condition: BoundaryCondition,
}

impl BoundaryRule {
    pub fn applies_to(&self, face: &Face) -> bool {
        let norm = self.normal.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !(norm > 0.0) {
            return false;
        }
        let cos = (0..=2).map(|i| self.normal[i] * face.normal[i]).sum::<f64>() / norm;
        cos > 1.0 - NORMAL_MATCH
    }
}

/// Condition for every face of `mesh`: the last rule that applies, else
/// `default`. Interior faces carry `default` and are never read.
pub fn resolve_boundary(mesh: &Mesh, default: BoundaryCondition, rules: &[BoundaryRule]) -> Vec<BoundaryCondition> {
    mesh.faces
        .iter()
        .map(|face| {
            rules
                .iter()
                .rev()
                .find(|rule| face.neighbor_cell_ids.1.is_none() && rule.applies_to(face))
                .map_or(default, |rule| rule.condition)
        })
        .collect()
}

#[inline]
pub fn robin_ghost_val<T: DualNum<f64>>(
    u_i: T,
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
) -> T {
    let two = T::from(2.0);
    let alpha_t = T::from(alpha);
    let beta_t = T::from(beta);
    let gamma_t = T::from(gamma);
    let delta_t = T::from(delta);
    if beta == 0.0 {
        two * (gamma_t / alpha_t) - u_i
    } else {
        // ghost sits at distance 2*delta from the cell centroid
        let denom = alpha_t.clone() + beta_t.clone() / delta_t.clone();
        let numer = two * gamma_t - (alpha_t - beta_t / delta_t) * u_i;
        numer / denom
    }
}
