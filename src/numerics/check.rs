//! Verification helpers for sensitivities.
//!
//! [`check_derivative`] runs a Taylor test: for a correct derivative the
//! first-order remainder `|f(x + h dx) - f(x) - h J dx|` shrinks as `h^2`.
//! [`adjoint_mismatch`] compares `w^T (J v)` against `v^T (J^T w)`.

use log::debug;
use nalgebra::DVector;

#[derive(Clone, Debug)]
pub struct DerivativeCheck {
    pub h: Vec<f64>,
    /// `|f(x + h dx) - f(x)|`
    pub zeroth_order: Vec<f64>,
    /// `|f(x + h dx) - f(x) - h J dx|`
    pub first_order: Vec<f64>,
    /// `log10` ratios of consecutive first-order remainders.
    pub orders: Vec<f64>,
}

impl DerivativeCheck {
    /// True if the mean observed order reaches `expected - tolerance`, or if
    /// the remainders are already at round-off level.
    pub fn passed(&self, expected: f64, tolerance: f64) -> bool {
        if self.first_order.iter().all(|e| *e < 1e-12) {
            return true;
        }
        let finite: Vec<f64> = self.orders.iter().copied().filter(|o| o.is_finite()).collect();
        if finite.is_empty() {
            return false;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        mean > expected - tolerance
    }
}

/// Taylor test of `df` (the product `J(x) dx`) against `f`.
///
/// Step sizes are `10^-1 .. 10^-num`.
pub fn check_derivative<F, D, E>(
    f: F,
    df: D,
    x0: &DVector<f64>,
    dx: &DVector<f64>,
    num: usize,
) -> Result<DerivativeCheck, E>
where
    F: Fn(&DVector<f64>) -> Result<DVector<f64>, E>,
    D: Fn(&DVector<f64>, &DVector<f64>) -> Result<DVector<f64>, E>,
{
    let f0 = f(x0)?;
    let jdx = df(x0, dx)?;

    let mut h = Vec::with_capacity(num);
    let mut zeroth_order = Vec::with_capacity(num);
    let mut first_order = Vec::with_capacity(num);

    for i in 1..=num {
        let step = 10f64.powi(-(i as i32));
        let fh = f(&(x0 + dx * step))?;
        let e0 = (&fh - &f0).norm();
        let e1 = (&fh - &f0 - &jdx * step).norm();
        debug!("h = {step:.1e}  |E0| = {e0:.3e}  |E1| = {e1:.3e}");
        h.push(step);
        zeroth_order.push(e0);
        first_order.push(e1);
    }

    let orders = first_order
        .windows(2)
        .map(|w| (w[0] / w[1]).log10())
        .collect();

    Ok(DerivativeCheck {
        h,
        zeroth_order,
        first_order,
        orders,
    })
}

/// Relative mismatch `|w.(Jv) - v.(J^T w)| / max(|w.(Jv)|, |v.(J^T w)|)`.
pub fn adjoint_mismatch(
    v: &DVector<f64>,
    jv: &DVector<f64>,
    w: &DVector<f64>,
    jtw: &DVector<f64>,
) -> f64 {
    let lhs = w.dot(jv);
    let rhs = v.dot(jtw);
    let scale = lhs.abs().max(rhs.abs());
    if scale == 0.0 {
        0.0
    } else {
        (lhs - rhs).abs() / scale
    }
}
