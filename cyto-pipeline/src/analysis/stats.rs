//! Two-sample tests for the responder comparison
//!
//! Both tests are two-sided. Degenerate inputs resolve to defined outcomes
//! instead of NaN:
//! - Mann-Whitney with every value tied: p = 1.0
//! - Welch with zero spread in both groups: t = 0, p = 1.0 when the means are
//!   equal; t = ±∞, p = 0.0 otherwise

use crate::error::{PipelineError, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::{erfc, erfc_inv};
use std::f64::consts::SQRT_2;

/// Largest group size that still gets the exact Mann-Whitney null distribution
pub const EXACT_MAX_GROUP_SIZE: usize = 8;

/// Test statistic and two-sided p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance (n - 1 denominator)
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

fn moments(values: &[f64]) -> Option<(f64, f64)> {
    Some((mean(values)?, sample_variance(values)?))
}

/// Sample standard deviation (n - 1 denominator)
pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Effect size r = |Z| / √N, with Z recovered from a two-sided p-value
pub fn effect_size(p_value: f64, n_total: usize) -> f64 {
    if n_total == 0 {
        return 0.0;
    }
    // |Φ⁻¹(p/2)| = √2 · erfc⁻¹(p)
    let z = SQRT_2 * erfc_inv(p_value.clamp(0.0, 1.0));
    z.abs() / (n_total as f64).sqrt()
}

/// Two-sided standard normal tail probability, 2 · P(Z ≥ z)
fn two_sided_normal_sf(z: f64) -> f64 {
    erfc(z / SQRT_2)
}

/// Ranks of the pooled sample, ties receiving their average rank
///
/// Returns the ranks in input order and the sizes of all tie groups.
fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share ranks start+1 ..= end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        ties.push(end - start);
        start = end;
    }
    (ranks, ties)
}

/// Frequencies of each U value under the null hypothesis, for group sizes m, n
///
/// Entry k counts the orderings of m + n distinct values giving U = k; the
/// entries sum to C(m + n, m). The counts are the coefficients of the
/// Gaussian binomial ∏ (1 - q^(n+i)) / (1 - q^i) for i in 1..=min(m, n),
/// built in place in one vector of length m·n + 1.
pub fn exact_u_distribution(m: usize, n: usize) -> Vec<f64> {
    // The distribution is symmetric in (m, n); iterate over the smaller group
    let (small, large) = (m.min(n), m.max(n));
    let top = small * large;

    let mut counts = vec![0.0; top + 1];
    counts[0] = 1.0;
    for i in 1..=small {
        // Multiply by (1 - q^(large+i)), high degrees first
        let k = large + i;
        for j in (k..=top).rev() {
            counts[j] -= counts[j - k];
        }
        // Divide by (1 - q^i), low degrees first
        for j in i..=top {
            counts[j] += counts[j - i];
        }
    }
    counts
}

/// Mann-Whitney U test, two-sided
///
/// The statistic is U of the first group. The exact null distribution is
/// used when either group has at most [`EXACT_MAX_GROUP_SIZE`] values and
/// there are no ties; otherwise the normal approximation with tie and
/// continuity corrections.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    if x.is_empty() || y.is_empty() {
        return Err(PipelineError::InsufficientData(format!(
            "Mann-Whitney U needs both groups non-empty (got {} and {})",
            x.len(),
            y.len()
        )));
    }

    let (n1, n2) = (x.len(), y.len());
    let pooled: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, ties) = average_ranks(&pooled);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u_max = u1.max(u2);

    let has_ties = ties.iter().any(|&t| t > 1);
    let exact = n1.min(n2) <= EXACT_MAX_GROUP_SIZE && !has_ties;

    let p_value = if exact {
        let distribution = exact_u_distribution(n1, n2);
        let total: f64 = distribution.iter().sum();
        // P(U >= u_max) summed from the lower tail, P(U <= n1·n2 - u_max)
        let threshold = u_max.round() as usize;
        let lower: f64 = distribution[..=n1 * n2 - threshold].iter().sum();
        2.0 * lower / total
    } else {
        let n = (n1 + n2) as f64;
        let mu = (n1 * n2) as f64 / 2.0;
        let tie_term: f64 = ties
            .iter()
            .map(|&t| {
                let t = t as f64;
                t * t * t - t
            })
            .sum::<f64>()
            / (n * (n - 1.0));
        let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term);
        if variance <= 0.0 {
            1.0
        } else {
            let z = (u_max - mu - 0.5) / variance.sqrt();
            two_sided_normal_sf(z)
        }
    };

    Ok(TestOutcome {
        statistic: u1,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// Welch's unequal-variance t-test, two-sided
pub fn welch_t_test(x: &[f64], y: &[f64]) -> Result<TestOutcome> {
    let (Some((mean1, var1)), Some((mean2, var2))) = (moments(x), moments(y)) else {
        return Err(PipelineError::InsufficientData(format!(
            "Welch's t-test needs at least 2 values per group (got {} and {})",
            x.len(),
            y.len()
        )));
    };

    let v1 = var1 / x.len() as f64;
    let v2 = var2 / y.len() as f64;
    let se = (v1 + v2).sqrt();
    let diff = mean1 - mean2;

    if se == 0.0 {
        return Ok(if diff == 0.0 {
            TestOutcome {
                statistic: 0.0,
                p_value: 1.0,
            }
        } else {
            TestOutcome {
                statistic: diff.signum() * f64::INFINITY,
                p_value: 0.0,
            }
        });
    }

    let t = diff / se;
    let df = (v1 + v2).powi(2)
        / (v1.powi(2) / (x.len() - 1) as f64 + v2.powi(2) / (y.len() - 1) as f64);
    let distribution = StudentsT::new(0.0, 1.0, df).map_err(|e| {
        PipelineError::InsufficientData(format!("Invalid Welch degrees of freedom {}: {}", df, e))
    })?;
    let p_value = 2.0 * distribution.sf(t.abs());

    Ok(TestOutcome {
        statistic: t,
        p_value: p_value.clamp(0.0, 1.0),
    })
}
