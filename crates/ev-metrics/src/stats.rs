//! Descriptive statistics over evacuation ticks.

use crate::{MetricsError, MetricsResult};

/// `p`-th percentile (0–100) of an ascending slice, linearly interpolated
/// between the two closest ranks.  `None` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> MetricsResult<Option<f64>> {
    if !(0.0..=100.0).contains(&p) {
        return Err(MetricsError::Percentile(p));
    }
    debug_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    Ok(match sorted {
        [] => None,
        [only] => Some(*only),
        _ => {
            let rank = p / 100.0 * (sorted.len() - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
        }
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// `std_dev / mean`; `None` with fewer than two values.  Zero spread gives
/// `0.0` even when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sd = std_dev(values)?;
    if sd == 0.0 {
        Some(0.0)
    } else {
        Some(sd / m)
    }
}
