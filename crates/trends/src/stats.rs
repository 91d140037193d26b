/// Sample size at which the sample-count contribution to confidence
/// saturates.
const OPTIMAL_SAMPLE_SIZE: f64 = 50.0;

/// Variance at which the variance contribution to confidence reaches zero.
const VARIANCE_CEILING: f64 = 100.0;

/// Exponential recency-weighted average. Index 0 is the most recent value
/// and carries weight `decay^0`; index n carries `decay^n`. Returns 0 for
/// empty input.
#[must_use]
pub fn weighted_average(values: &[f64], decay: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut weight = 1.0;
    for value in values {
        weighted_sum += value * weight;
        weight_sum += weight;
        weight *= decay;
    }

    weighted_sum / weight_sum
}

/// Population variance; 0 for fewer than two samples.
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Confidence score in [0, 100]. Sample size contributes up to 60 points
/// (linear to the optimal sample size of 50); low variance contributes up
/// to 40 points, falling away linearly as variance approaches 100.
#[must_use]
pub fn confidence_score(sample_size: usize, variance: f64) -> u8 {
    #[allow(clippy::cast_precision_loss)]
    let sample_points = (sample_size as f64 / OPTIMAL_SAMPLE_SIZE).min(1.0) * 60.0;
    let variance_points = (1.0 - variance / VARIANCE_CEILING).clamp(0.0, 1.0) * 40.0;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = (sample_points + variance_points).round().clamp(0.0, 100.0) as u8;
    score
}
