use crate::discretization::mesh::{Face, Mesh, distance};
use crate::physics::bc::BoundaryCondition;
use nalgebra::DVector;
use num_dual::DualNum;

#[derive(Clone, Copy, Debug)]
pub struct NumericalTolerances {
    pub min_distance: f64,
}

impl Default for NumericalTolerances {
    fn default() -> Self {
        Self {
            min_distance: 1e-14,
        }
    }
}

/// Two-point-flux finite-volume discretization of `-div(sigma grad u) = q`.
///
/// The residual for cell `k` is
/// `sum_faces sigma_f (u_k - u_l) A_f / d_f - s_k`, where `s_k` is the
/// source integrated over the cell and `sigma_f` the harmonic mean of the
/// two cell conductivities. It is affine in `u` and smooth in `sigma`.
#[derive(Clone, Copy, Debug)]
pub struct DiffusionOperator<'a> {
    pub mesh: &'a Mesh,
    /// One condition per mesh face; read on boundary faces only.
    pub boundary: &'a [BoundaryCondition],
    pub tolerances: NumericalTolerances,
}

impl<'a> DiffusionOperator<'a> {
    pub fn new(mesh: &'a Mesh, boundary: &'a [BoundaryCondition]) -> Self {
        Self {
            mesh,
            boundary,
            tolerances: NumericalTolerances::default(),
        }
    }

    #[inline]
    fn safe_distance(&self, p1: [f64; 3], p2: [f64; 3]) -> f64 {
        distance(p1, p2).max(self.tolerances.min_distance)
    }

    /// Normal distance from a cell centroid to one of its boundary faces.
    #[inline]
    fn bc_delta(&self, face: &Face, cell_centroid: [f64; 3]) -> f64 {
        let delta: f64 = (0..=2)
            .map(|i| face.normal[i] * (face.centroid[i] - cell_centroid[i]))
            .sum();
        delta.abs().max(self.tolerances.min_distance)
    }

    /// Residual `c(sigma, u)` for cell conductivities `sigma`, cell values
    /// `u` and integrated cell sources `source`.
    pub fn residual<T>(&self, sigma: &DVector<T>, u: &DVector<T>, source: &DVector<f64>) -> DVector<T>
    where
        T: nalgebra::Scalar + DualNum<f64> + num_traits::Zero,
    {
        let mut residual = DVector::zeros(self.mesh.cells.len());

        for (f, face) in self.mesh.faces.iter().enumerate() {
            match face.neighbor_cell_ids {
                (k, Some(l)) => {
                    let sigma_f = harmonic_mean(sigma[k].clone(), sigma[l].clone());
                    let d = self.safe_distance(self.mesh.cells[k].centroid, self.mesh.cells[l].centroid);
                    let flux = sigma_f * (u[k].clone() - u[l].clone()) * (face.area / d);
                    residual[k] += flux.clone();
                    residual[l] -= flux;
                }
                (k, None) => {
                    let delta = self.bc_delta(face, self.mesh.cells[k].centroid);
                    let ghost = self.boundary[f].ghost_value(u[k].clone(), delta);
                    let flux =
                        sigma[k].clone() * (u[k].clone() - ghost) * (face.area / (2.0 * delta));
                    residual[k] += flux;
                }
            }
        }

        for (k, s) in source.iter().enumerate() {
            residual[k] -= T::from(*s);
        }

        residual
    }
}

#[inline]
fn harmonic_mean<T: DualNum<f64>>(a: T, b: T) -> T {
    a.clone() * b.clone() * 2.0 / (a + b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_uniform_line_mesh;
    use crate::physics::bc::{BoundaryRule, resolve_boundary};
    use nalgebra::DMatrix;
    use num_dual::{DualDVec64, jacobian};

    #[test]
    fn poisson_on_a_line_matches_parabola() {
        let (length, n, q) = (1.0, 100, 4.0);
        let mesh = create_uniform_line_mesh(length, n, 1.0);
        let bcs = resolve_boundary(&mesh, BoundaryCondition::default(), &[]);
        let op = DiffusionOperator::new(&mesh, &bcs);
        let sigma = DVector::from_element(n, 1.0);
        let source = DVector::from_iterator(n, mesh.cells.iter().map(|c| q * c.volume));

        let (r0, a) = jacobian(
            |u: DVector<DualDVec64>| {
                op.residual(&sigma.map(DualDVec64::from_re), &u, &source)
            },
            DVector::zeros(n),
        );
        let u = a.lu().solve(&-r0).expect("system is nonsingular");

        let max_err = mesh
            .cells
            .iter()
            .map(|c| {
                let x = c.centroid[0];
                (u[c.id] - 0.5 * q * x * (length - x)).abs()
            })
            .fold(0.0, f64::max);
        assert!(max_err < 1e-3, "max error {max_err}");
    }

    #[test]
    fn system_matrix_is_symmetric() {
        let mesh = create_uniform_line_mesh(2.0, 6, 0.5);
        let bcs = resolve_boundary(&mesh, BoundaryCondition::default(), &[]);
        let op = DiffusionOperator::new(&mesh, &bcs);
        let sigma = DVector::from_vec(vec![1.0, 2.0, 0.5, 3.0, 1.5, 1.0]);
        let source = DVector::zeros(6);

        let (_, a): (DVector<f64>, DMatrix<f64>) = jacobian(
            |u: DVector<DualDVec64>| {
                op.residual(&sigma.map(DualDVec64::from_re), &u, &source)
            },
            DVector::zeros(6),
        );

        assert!((&a - a.transpose()).amax() < 1e-12);
    }

    #[test]
    fn residual_vanishes_for_constant_dirichlet_value() {
        let mesh = create_uniform_line_mesh(1.0, 5, 1.0);
        let bcs = resolve_boundary(&mesh, BoundaryCondition::Dirichlet { value: 2.0 }, &[]);
        let op = DiffusionOperator::new(&mesh, &bcs);
        let sigma = DVector::from_element(5, 3.0);
        let u = DVector::from_element(5, 2.0);

        let r = op.residual(&sigma, &u, &DVector::zeros(5));

        assert!(r.amax() < 1e-12);
    }

    // -u'' = q, u(0) = 0, u'(L) = 0  =>  u = q (L x - x^2 / 2)
    #[test]
    fn insulated_right_end_matches_half_parabola() {
        let (length, n, q) = (1.0, 100, 2.0);
        let mesh = create_uniform_line_mesh(length, n, 1.0);
        let insulated = BoundaryRule {
            normal: [1.0, 0.0, 0.0],
            condition: BoundaryCondition::Neumann { flux: 0.0 },
        };
        let bcs = resolve_boundary(&mesh, BoundaryCondition::default(), &[insulated]);
        let op = DiffusionOperator::new(&mesh, &bcs);
        let sigma = DVector::from_element(n, 1.0);
        let source = DVector::from_iterator(n, mesh.cells.iter().map(|c| q * c.volume));

        let (r0, a) = jacobian(
            |u: DVector<DualDVec64>| {
                op.residual(&sigma.map(DualDVec64::from_re), &u, &source)
            },
            DVector::zeros(n),
        );
        let u = a.lu().solve(&-r0).expect("system is nonsingular");

        let max_err = mesh
            .cells
            .iter()
            .map(|c| {
                let x = c.centroid[0];
                (u[c.id] - q * (length * x - 0.5 * x * x)).abs()
            })
            .fold(0.0, f64::max);
        assert!(max_err < 1e-3, "max error {max_err}");
    }
}
