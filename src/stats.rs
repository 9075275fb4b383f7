//! Sample statistics for the randomized-policy checks.
//!
//! The Shapiro–Wilk implementation follows Royston's algorithm AS R94
//! (Applied Statistics, 1995): approximate the optimal coefficients from
//! expected normal order statistics, compute W, then map `ln(1 - W)` to a
//! normal deviate to get the p-value. Valid for 3 <= n <= 5000.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{Error, Result};

/// Smallest sample size the test is defined for.
pub const SHAPIRO_WILK_MIN_SAMPLES: usize = 3;

const SMALL: f64 = 1e-19;

// Polynomial coefficients from AS R94, lowest order first.
const G: [f64; 2] = [-2.273, 0.459];
const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_19, 4.434_685, -2.706_056];
const C2: [f64; 6] = [
    0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633,
];
const C3: [f64; 4] = [0.544, -0.399_78, 0.025_054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.778_57, 0.062_767, -0.002_032_2];
const C5: [f64; 4] = [-1.5861, -0.310_82, -0.083_751, 0.003_891_5];
const C6: [f64; 3] = [-0.4803, -0.082_676, 0.003_030_2];

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = samples.len() as f64;
    Some(samples.iter().sum::<f64>() / n)
}

/// Result of a Shapiro–Wilk test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    /// Test statistic in `(0, 1]`; values near 1 look normal.
    pub w: f64,
    pub p_value: f64,
}

/// Run the Shapiro–Wilk normality test on `samples` (any order).
pub fn shapiro_wilk(samples: &[f64]) -> Result<ShapiroWilk> {
    let n = samples.len();
    if n < SHAPIRO_WILK_MIN_SAMPLES {
        return Err(Error::statistics(format!(
            "Shapiro-Wilk needs at least {SHAPIRO_WILK_MIN_SAMPLES} samples, got {n}"
        )));
    }
    if samples.iter().any(|x| !x.is_finite()) {
        return Err(Error::statistics("Shapiro-Wilk input is not finite"));
    }

    let mut x = samples.to_vec();
    x.sort_by(f64::total_cmp);

    let range = x[n - 1] - x[0];
    if range < SMALL {
        // Constant data: W is undefined; report it as perfectly normal.
        return Ok(ShapiroWilk {
            w: 1.0,
            p_value: 1.0,
        });
    }

    let std_normal = Normal::new(0.0, 1.0).map_err(|err| Error::statistics(err.to_string()))?;
    let a = coefficients(n, &std_normal);

    // Mean-centred, range-scaled data against the antisymmetric coefficients.
    #[allow(clippy::cast_precision_loss)]
    let an = n as f64;
    let scaled: Vec<f64> = x.iter().map(|v| v / range).collect();
    let x_mean = scaled.iter().sum::<f64>() / an;
    let a_mean = a.iter().sum::<f64>() / an;

    let (mut ssa, mut ssx, mut sax) = (0.0, 0.0, 0.0);
    for (ai, xi) in a.iter().zip(&scaled) {
        let da = ai - a_mean;
        let dx = xi - x_mean;
        ssa += da * da;
        ssx += dx * dx;
        sax += da * dx;
    }
    let ssassx = (ssa * ssx).sqrt();
    let w1 = (ssassx - sax) * (ssassx + sax) / (ssa * ssx);
    let w = 1.0 - w1;

    let p_value = p_value(n, w, w1)?;
    Ok(ShapiroWilk { w, p_value })
}

/// Full-length coefficient vector `a`, antisymmetric about the middle.
fn coefficients(n: usize, std_normal: &Normal) -> Vec<f64> {
    let half = n / 2;
    let mut upper = vec![0.0; half];

    if n == 3 {
        upper[0] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        #[allow(clippy::cast_precision_loss)]
        let an = n as f64;
        let an25 = an + 0.25;
        let m: Vec<f64> = (1..=half)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let i = i as f64;
                std_normal.inverse_cdf((i - 0.375) / an25)
            })
            .collect();
        let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / an.sqrt();
        let a1 = poly(&C1, rsn) - m[0] / ssumm2;

        let (first_free, fac) = if n > 5 {
            let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
            let numerator = summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1];
            let denominator = 1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2;
            let fac = (numerator / denominator).sqrt();
            upper[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        upper[0] = a1;
        for i in first_free..half {
            upper[i] = -m[i] / fac;
        }
    }

    // upper[i] weights the i-th largest value; mirror it onto the smallest.
    let mut a = vec![0.0; n];
    for (i, &coef) in upper.iter().enumerate() {
        a[i] = -coef;
        a[n - 1 - i] = coef;
    }
    a
}

fn p_value(n: usize, w: f64, w1: f64) -> Result<f64> {
    if n == 3 {
        const SIX_OVER_PI: f64 = 1.909_859_317_102_74;
        const PI_OVER_THREE: f64 = 1.047_197_551_196_6;
        return Ok((SIX_OVER_PI * (w.sqrt().asin() - PI_OVER_THREE)).clamp(0.0, 1.0));
    }

    #[allow(clippy::cast_precision_loss)]
    let an = n as f64;
    let mut y = w1.ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(1e-99);
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    let dist = Normal::new(m, s).map_err(|err| Error::statistics(err.to_string()))?;
    Ok(dist.sf(y))
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`.
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coef| acc * x + coef)
}
