//! Special functions used by the likelihoods and conditional expectations

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Series terms are summed until they fall below this fraction of the sum
const SERIES_EPSILON: f64 = 1e-15;
const MAX_SERIES_TERMS: usize = 200_000;

/// Natural log of |Γ(x)| (Lanczos approximation, reflection below 0.5).
///
/// Returns `+inf` at the poles (0, -1, -2, ...).
pub fn ln_gamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::INFINITY;
    }
    if x < 0.5 {
        let sin = (PI * x).sin().abs();
        return (PI / sin).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFS[0], |acc, (i, coeff)| acc + coeff / (x + i as f64));

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `ln(exp(a) + exp(b))` without overflow
pub fn log_sum_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Logistic function `1 / (1 + exp(-x))`
pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Natural log of the Gauss hypergeometric function 2F1(a, b; c; z) for `0 <= z < 1`.
///
/// Sums the power series directly; when that overflows, falls back to the
/// Euler transformation `(1-z)^(c-a-b) 2F1(c-a, c-b; c; z)`. Returns `None`
/// outside the domain or when neither form produces a positive finite value.
pub fn ln_hyp2f1(a: f64, b: f64, c: f64, z: f64) -> Option<f64> {
    if !(0.0..1.0).contains(&z) || c <= 0.0 {
        return None;
    }
    if z == 0.0 {
        return Some(0.0);
    }

    if let Some(sum) = hyp2f1_series(a, b, c, z) {
        if sum > 0.0 {
            return Some(sum.ln());
        }
    }

    let transformed = hyp2f1_series(c - a, c - b, c, z)?;
    if transformed > 0.0 {
        Some(transformed.ln() + (c - a - b) * (1.0 - z).ln())
    } else {
        None
    }
}

fn hyp2f1_series(a: f64, b: f64, c: f64, z: f64) -> Option<f64> {
    let mut term = 1.0;
    let mut sum = 1.0;

    for k in 0..MAX_SERIES_TERMS {
        let k = k as f64;
        term *= (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        sum += term;

        if !sum.is_finite() {
            return None;
        }
        if term.abs() <= SERIES_EPSILON * sum.abs() {
            return Some(sum);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * (1.0 + b.abs())
    }

    #[test]
    fn test_ln_gamma_known_values() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(2.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-12));
        assert!(close(ln_gamma(100.0), 359.134_205_369_575_4, 1e-12));
        assert!(close(ln_gamma(1e-3), 6.907_178_885_383_853, 1e-10));
        assert_eq!(ln_gamma(0.0), f64::INFINITY);
    }

    #[test]
    fn test_ln_gamma_recurrence() {
        for &x in &[0.3, 1.7, 4.2, 12.9] {
            let lhs = ln_gamma(x + 1.0);
            let rhs = ln_gamma(x) + f64::ln(x);
            assert!(close(lhs, rhs, 1e-12), "x={x}");
        }
    }

    #[test]
    fn test_hyp2f1_closed_forms() {
        // 2F1(1, 1; 2; z) = -ln(1 - z) / z
        for &z in &[0.1, 0.5, 0.9, 0.99] {
            let expected = (-(1.0 - z as f64).ln() / z).ln();
            assert!(close(ln_hyp2f1(1.0, 1.0, 2.0, z).unwrap(), expected, 1e-10), "z={z}");
        }

        // 2F1(a, b; b; z) = (1 - z)^-a
        let value = ln_hyp2f1(2.5, 3.0, 3.0, 0.4).unwrap();
        assert!(close(value, -2.5 * 0.6f64.ln(), 1e-12));
    }

    #[test]
    fn test_hyp2f1_domain() {
        assert_eq!(ln_hyp2f1(1.0, 1.0, 2.0, 0.0), Some(0.0));
        assert_eq!(ln_hyp2f1(1.0, 1.0, 2.0, 1.0), None);
        assert_eq!(ln_hyp2f1(1.0, 1.0, -2.0, 0.5), None);
    }

    #[test]
    fn test_log_sum_exp_and_logistic() {
        assert!(close(log_sum_exp(0.0, 0.0), 2f64.ln(), 1e-15));
        assert!(close(log_sum_exp(1000.0, 0.0), 1000.0, 1e-15));
        assert_eq!(log_sum_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert!(close(logistic(0.0), 0.5, 1e-15));
        assert!(logistic(-800.0) >= 0.0);
        assert!(close(logistic(800.0), 1.0, 1e-15));
    }
}
