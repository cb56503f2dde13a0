//! Error type shared by every fallible operation in the crate.
//!
//! Errors are never recovered inside the library. An ordering or coverage error means the caller
//! fed inconsistent data, and a numerical-validity error means the state itself is corrupt; in
//! both cases continuing would silently poison every later propagation.

use thiserror::Error;

/// Failure modes of the IMU store, the propagation equations and the noise estimators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    /// A sample was offered whose timestamp does not strictly follow the newest stored one.
    #[error("IMU timestamp {received} does not follow the last stored timestamp {previous}")]
    NonIncreasingTimestamp { previous: f64, received: f64 },

    /// The database holds no samples at all.
    #[error("IMU database is empty")]
    EmptyDatabase,

    /// The requested time cannot be represented by the stored samples.
    #[error("time {time} is not covered by stored IMU samples [{oldest}, {newest}]")]
    TimeNotCovered { time: f64, oldest: f64, newest: f64 },

    /// A range query with an empty or inverted window.
    #[error("degenerate time interval [{start}, {end}]")]
    DegenerateInterval { start: f64, end: f64 },

    /// Two bracketing samples share a timestamp, so no interpolation weight exists.
    #[error("duplicate IMU timestamp {time}")]
    DuplicateTimestamp { time: f64 },

    /// The imaginary part of a quaternion has norm above one.
    #[error("quaternion imaginary part has norm {norm} > 1")]
    InvalidQuaternion { norm: f64 },

    /// A configuration or noise parameter is outside of its documented range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Allan-variance analysis could not form two chunks at some chunk size.
    #[error("chunk size {chunk_size} yields {chunks} chunk(s); at least 2 are required")]
    InsufficientData { chunk_size: usize, chunks: usize },

    /// Fewer than two samples fall into the propagation window.
    #[error("propagation window contains {found} IMU sample(s); at least 2 are required")]
    InsufficientSamples { found: usize },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PropagationError>;
