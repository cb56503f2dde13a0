//! Time-indexed IMU sample storage and interpolation.
//!
//! [`ImuDatabase`] is a bounded FIFO of samples with strictly increasing timestamps. Queries are
//! binary searches over the timestamps. [`LinearImuInterpolator`] borrows a database and
//! produces a sample at an arbitrary covered time by blending the two bracketing samples.
//!
//! The database performs no locking. A host that ingests samples on one thread and propagates on
//! another must serialise access itself, for example by holding the database behind a mutex for
//! the duration of a propagation call.

use std::collections::VecDeque;

use log::warn;

use crate::ImuSample;
use crate::error::{PropagationError, Result};

/// Bounded, strictly time-ordered sequence of IMU samples.
#[derive(Clone, Debug)]
pub struct ImuDatabase {
    samples: VecDeque<ImuSample>,
    capacity: usize,
    evicting: bool,
}
impl ImuDatabase {
    /// Create an empty database holding at most `capacity` samples.
    ///
    /// # Errors
    /// [`PropagationError::InvalidParameter`] if `capacity < 2`, since no interval could ever be
    /// bracketed.
    pub fn new(capacity: usize) -> Result<ImuDatabase> {
        if capacity < 2 {
            return Err(PropagationError::InvalidParameter(format!(
                "IMU database capacity must be at least 2, got {capacity}"
            )));
        }
        Ok(ImuDatabase {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            evicting: false,
        })
    }
    /// Append a sample, evicting the oldest one when the database is full.
    ///
    /// # Errors
    /// [`PropagationError::NonIncreasingTimestamp`] if the sample does not strictly follow the
    /// newest stored sample. The database is left untouched in that case.
    pub fn add_imu_sample(&mut self, sample: ImuSample) -> Result<()> {
        if let Some(last) = self.samples.back()
            && !(sample.timestamp() > last.timestamp())
        {
            return Err(PropagationError::NonIncreasingTimestamp {
                previous: last.timestamp(),
                received: sample.timestamp(),
            });
        }
        if self.samples.len() == self.capacity {
            if !self.evicting {
                warn!(
                    "IMU database reached capacity {}; evicting oldest samples",
                    self.capacity
                );
                self.evicting = true;
            }
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        Ok(())
    }
    /// Return the samples `(left, right)` with `left.t <= t < right.t`.
    ///
    /// # Errors
    /// - [`PropagationError::EmptyDatabase`] if nothing is stored.
    /// - [`PropagationError::TimeNotCovered`] if `t` is not strictly before the newest sample or
    ///   precedes the oldest one.
    pub fn adjacent_samples_at_time(&self, t: f64) -> Result<(ImuSample, ImuSample)> {
        let (oldest, newest) = self.bounds()?;
        // upper bound: first sample strictly after t
        let right = self.samples.partition_point(|s| s.timestamp() <= t);
        if right == 0 || right == self.samples.len() {
            return Err(PropagationError::TimeNotCovered {
                time: t,
                oldest,
                newest,
            });
        }
        Ok((self.samples[right - 1], self.samples[right]))
    }
    /// All stored samples with timestamp in `[t0, t1]`, oldest first.
    ///
    /// The result is empty if `t0` is covered but no sample falls inside the window.
    ///
    /// # Errors
    /// - [`PropagationError::EmptyDatabase`] if nothing is stored.
    /// - [`PropagationError::DegenerateInterval`] if `t0 >= t1` or either bound is not finite.
    /// - [`PropagationError::TimeNotCovered`] if `t0` predates the oldest stored sample.
    pub fn in_range(&self, t0: f64, t1: f64) -> Result<Vec<ImuSample>> {
        let (oldest, newest) = self.bounds()?;
        if !(t0 < t1) || !t0.is_finite() || !t1.is_finite() {
            return Err(PropagationError::DegenerateInterval { start: t0, end: t1 });
        }
        if t0 < oldest {
            return Err(PropagationError::TimeNotCovered {
                time: t0,
                oldest,
                newest,
            });
        }
        let first = self.samples.partition_point(|s| s.timestamp() < t0);
        let last = self.samples.partition_point(|s| s.timestamp() <= t1);
        Ok(self.samples.range(first..last).copied().collect())
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn oldest(&self) -> Option<ImuSample> {
        self.samples.front().copied()
    }
    pub fn newest(&self) -> Option<ImuSample> {
        self.samples.back().copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = &ImuSample> {
        self.samples.iter()
    }
    fn bounds(&self) -> Result<(f64, f64)> {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => Ok((oldest.timestamp(), newest.timestamp())),
            _ => Err(PropagationError::EmptyDatabase),
        }
    }
}

/// Produces IMU readings at arbitrary times by linear interpolation.
///
/// Holds a shared borrow of the database, so the database cannot be appended to while an
/// interpolator (and every ODE built on it) is alive.
#[derive(Clone, Copy, Debug)]
pub struct LinearImuInterpolator<'a> {
    database: &'a ImuDatabase,
}
impl<'a> LinearImuInterpolator<'a> {
    pub fn new(database: &'a ImuDatabase) -> LinearImuInterpolator<'a> {
        LinearImuInterpolator { database }
    }
    /// Blend the two samples bracketing `t` by the fractional position of `t` between them.
    ///
    /// A query exactly at the newest stored timestamp returns that sample, so that the final
    /// Runge-Kutta stage of the last interval in the database can be evaluated.
    ///
    /// # Errors
    /// Coverage errors from [`ImuDatabase::adjacent_samples_at_time`], and
    /// [`PropagationError::DuplicateTimestamp`] if the bracketing samples share a timestamp.
    pub fn imu_sample_at_time(&self, t: f64) -> Result<ImuSample> {
        if let Some(newest) = self.database.newest()
            && newest.timestamp() == t
        {
            return Ok(newest);
        }
        let (left, right) = self.database.adjacent_samples_at_time(t)?;
        let span = right.timestamp() - left.timestamp();
        if !(span > 0.0) {
            return Err(PropagationError::DuplicateTimestamp {
                time: left.timestamp(),
            });
        }
        let alpha = (t - left.timestamp()) / span;
        Ok(ImuSample::new(
            t,
            left.gyro() + (right.gyro() - left.gyro()) * alpha,
            left.accel() + (right.accel() - left.accel()) * alpha,
        ))
    }
}
