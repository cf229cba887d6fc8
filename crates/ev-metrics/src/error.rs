//! Metrics error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("percentile must be within [0, 100], got {0}")]
    Percentile(f64),

    #[error("histogram bucket width must be positive")]
    BucketWidth,
}

pub type MetricsResult<T> = Result<T, MetricsError>;
