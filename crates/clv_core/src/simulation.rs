//! Deterministic synthetic populations
//!
//! Draws customers from the BG/NBD and Gamma-Gamma generative processes
//! with a seeded LCG, so the same seed reproduces the same population on
//! every platform. Used to sanity-check fits and by the test suites.

use std::f64::consts::PI;

use crate::frequency::BetaGeoParams;
use crate::monetary::GammaGammaParams;
use crate::types::{CustomerId, CustomerSummary};

/// 64-bit linear congruential generator (Knuth MMIX constants)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: seed };
        rng.next_u64();
        rng
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    /// Uniform draw from the open interval (0, 1)
    pub fn next_unit(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 0.5) / (1u64 << 53) as f64
    }

    pub fn exponential(&mut self, rate: f64) -> f64 {
        -self.next_unit().ln() / rate
    }

    /// Box-Muller
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = self.next_unit();
        let u2 = self.next_unit();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Gamma draw with the given shape and rate (Marsaglia-Tsang)
    pub fn gamma(&mut self, shape: f64, rate: f64) -> f64 {
        if shape < 1.0 {
            let boost = self.next_unit().powf(1.0 / shape);
            return self.gamma(shape + 1.0, rate) * boost;
        }

        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.standard_normal();
            let v = (1.0 + c * x).powi(3);
            if v <= 0.0 {
                continue;
            }
            let u = self.next_unit();
            if u.ln() < 0.5 * x * x + d - d * v + d * v.ln() {
                return d * v / rate;
            }
        }
    }

    pub fn beta(&mut self, a: f64, b: f64) -> f64 {
        let x = self.gamma(a, 1.0);
        let y = self.gamma(b, 1.0);
        x / (x + y)
    }
}

/// Simulate one summary row per entry of `observation_lengths`.
///
/// Purchase timing follows BG/NBD with `frequency_params`. When
/// `monetary_params` is given, repeat-purchase amounts follow Gamma-Gamma and
/// `monetary_value` is their mean.
pub fn simulate_population(
    frequency_params: &BetaGeoParams,
    monetary_params: Option<&GammaGammaParams>,
    observation_lengths: &[f64],
    seed: u64,
) -> Vec<CustomerSummary> {
    let mut rng = LcgRng::new(seed);

    observation_lengths
        .iter()
        .enumerate()
        .map(|(idx, &t)| {
            let rate = rng.gamma(frequency_params.r, frequency_params.alpha);
            let dropout = rng.beta(frequency_params.a, frequency_params.b);

            let mut elapsed = 0.0;
            let mut frequency = 0u32;
            let mut recency = 0.0;
            loop {
                elapsed += rng.exponential(rate);
                if elapsed > t {
                    break;
                }
                frequency += 1;
                recency = elapsed;
                if rng.next_unit() < dropout {
                    break;
                }
            }

            let monetary_value = match monetary_params {
                Some(gg) if frequency > 0 => {
                    let spend_rate = rng.gamma(gg.q, gg.v);
                    let total: f64 = (0..frequency).map(|_| rng.gamma(gg.p, spend_rate)).sum();
                    Some(total / frequency as f64)
                }
                _ => None,
            };

            CustomerSummary {
                customer_id: CustomerId::new(format!("sim-{idx:06}")),
                frequency,
                recency,
                t,
                monetary_value,
            }
        })
        .collect()
}
