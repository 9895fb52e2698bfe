use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PlanningError {
    #[error("size ceiling must be positive, got {0}")]
    InvalidSizeCeiling(u64),
    #[error("duration ceiling must be positive, got {0}")]
    InvalidDurationCeiling(f64),
    #[error("audio duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error("{duration_ms}ms of audio cannot be divided into {segments} segments")]
    TooManySegments { duration_ms: u64, segments: u64 },
}

/// One contiguous time range of the source, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkSegment {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkSegment {
    pub fn start_seconds(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Ordered, gap-free, non-overlapping cover of `[0, duration)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkPlan {
    segments: Vec<ChunkSegment>,
}

impl ChunkPlan {
    /// Decides whether a recording must be split and where.
    ///
    /// Files inside both ceilings get the single-segment plan. Otherwise the
    /// segment count is `ceil(max(size/size_ceiling, duration/duration_ceiling))`
    /// and the duration is divided evenly, the last segment absorbing the
    /// rounding remainder. The byte estimate assumes roughly constant bitrate;
    /// real chunk sizes are verified after cutting.
    pub fn plan(
        size_bytes: u64,
        duration_seconds: f64,
        size_ceiling: u64,
        duration_ceiling: f64,
    ) -> Result<Self, PlanningError> {
        if size_ceiling == 0 {
            return Err(PlanningError::InvalidSizeCeiling(size_ceiling));
        }
        if !(duration_ceiling.is_finite() && duration_ceiling > 0.0) {
            return Err(PlanningError::InvalidDurationCeiling(duration_ceiling));
        }
        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Err(PlanningError::InvalidDuration(duration_seconds));
        }

        let duration_ms = (duration_seconds * 1000.0).round().max(1.0) as u64;

        if size_bytes <= size_ceiling && duration_seconds <= duration_ceiling {
            return Ok(Self {
                segments: vec![ChunkSegment {
                    index: 0,
                    start_ms: 0,
                    end_ms: duration_ms,
                }],
            });
        }

        let by_size = size_bytes as f64 / size_ceiling as f64;
        let by_duration = duration_seconds / duration_ceiling;
        let count = by_size.max(by_duration).ceil().max(1.0) as u64;

        let step = duration_ms / count;
        if step == 0 {
            return Err(PlanningError::TooManySegments {
                duration_ms,
                segments: count,
            });
        }

        let segments = (0..count)
            .map(|i| ChunkSegment {
                index: i as usize,
                start_ms: i * step,
                end_ms: if i + 1 == count {
                    duration_ms
                } else {
                    (i + 1) * step
                },
            })
            .collect();

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[ChunkSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when the plan is the single whole-file segment: no cutting needed.
    pub fn is_trivial(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn total_ms(&self) -> u64 {
        self.segments.last().map(|s| s.end_ms).unwrap_or(0)
    }
}
