//! Derivative-free Nelder-Mead minimizer
//!
//! Used for the penalized maximum-likelihood fits. Runs single-threaded to
//! completion; the only stopping controls are the iteration cap and the
//! convergence tolerance.

use serde::{Deserialize, Serialize};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Optimizer stopping controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerOptions {
    /// Hard cap on simplex iterations
    pub max_iterations: usize,
    /// Converged when objective values across the simplex differ by at most
    /// this much and the vertices lie within its square root of the best one
    pub tolerance: f64,
    /// Offset of the initial simplex vertices from the starting point
    pub initial_step: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-7,
            initial_step: 0.1,
        }
    }
}

/// Result of a minimization run
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize `objective` starting from `x0`.
///
/// Non-finite objective values are treated as `+inf`, so the simplex moves
/// away from regions where the likelihood is undefined.
pub fn nelder_mead<F>(objective: F, x0: &[f64], options: &OptimizerOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let value = objective(x);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    let n = x0.len();
    let x_tolerance = options.tolerance.sqrt();

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((x0.to_vec(), eval(x0)));
    for i in 0..n {
        let mut vertex = x0.to_vec();
        vertex[i] += if vertex[i] != 0.0 {
            options.initial_step * vertex[i].abs().max(1.0)
        } else {
            options.initial_step
        };
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        if is_converged(&simplex, options.tolerance, x_tolerance) {
            converged = true;
            break;
        }
        iterations += 1;

        let best = simplex[0].1;
        let second_worst = simplex[n - 1].1;
        let (worst_x, worst) = simplex[n].clone();

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |target: &[f64], coeff: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(target)
                .map(|(c, t)| c + coeff * (t - c))
                .collect()
        };

        let reflected = towards(&worst_x, -REFLECTION);
        let reflected_value = eval(&reflected);

        if reflected_value < best {
            let expanded = towards(&reflected, EXPANSION);
            let expanded_value = eval(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < second_worst {
            simplex[n] = (reflected, reflected_value);
            continue;
        }

        let (contracted, limit) = if reflected_value < worst {
            (towards(&reflected, CONTRACTION), reflected_value)
        } else {
            (towards(&worst_x, CONTRACTION), worst)
        };
        let contracted_value = eval(&contracted);
        if contracted_value < limit {
            simplex[n] = (contracted, contracted_value);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&vertex.0)
                .map(|(a, x)| a + SHRINK * (x - a))
                .collect();
            let value = eval(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);

    Minimum {
        x,
        value,
        iterations,
        converged,
    }
}

fn is_converged(simplex: &[(Vec<f64>, f64)], f_tolerance: f64, x_tolerance: f64) -> bool {
    let (best_x, best) = &simplex[0];
    if !best.is_finite() {
        return false;
    }

    simplex[1..].iter().all(|(x, value)| {
        (value - best).abs() <= f_tolerance
            && x.iter().zip(best_x).all(|(a, b)| (a - b).abs() <= x_tolerance)
    })
}
