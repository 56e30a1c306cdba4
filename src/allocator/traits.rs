//! Memory usage reporting
//!
//! Capacity-oriented reporting shared by all allocators. For allocation
//! counters and peaks, see [`StatisticsProvider`](super::StatisticsProvider).

/// Memory usage reporting trait
///
/// All three allocators own a bounded arena, so `available_memory` and
/// `total_memory` always return `Some` here; the `Option` is kept so the
/// trait can also describe sources without an inherent limit.
pub trait MemoryUsage {
    /// Returns current allocated memory in bytes
    fn used_memory(&self) -> usize;

    /// Returns memory currently available for allocation in bytes
    fn available_memory(&self) -> Option<usize>;

    /// Returns total memory capacity in bytes
    fn total_memory(&self) -> Option<usize> {
        match (self.used_memory(), self.available_memory()) {
            (used, Some(available)) => Some(used + available),
            _ => None,
        }
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    ///
    /// Returns `None` if total memory is unknown or zero.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().and_then(|total| {
            if total == 0 {
                Some(0.0)
            } else {
                Some((self.used_memory() as f32 / total as f32) * 100.0)
            }
        })
    }

    /// Returns a combined usage snapshot
    fn memory_usage(&self) -> BasicMemoryUsage {
        BasicMemoryUsage {
            used: self.used_memory(),
            available: self.available_memory(),
            total: self.total_memory(),
            usage_percent: self.memory_usage_percent(),
        }
    }
}

/// Basic memory usage snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicMemoryUsage {
    /// Currently used memory in bytes
    pub used: usize,
    /// Available memory in bytes (`None` if unlimited)
    pub available: Option<usize>,
    /// Total memory capacity in bytes (`None` if unlimited)
    pub total: Option<usize>,
    /// Memory usage as a percentage (`None` if it cannot be calculated)
    pub usage_percent: Option<f32>,
}

impl core::fmt::Display for BasicMemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "used: {} bytes", self.used)?;

        if let Some(total) = self.total {
            write!(f, ", total: {total} bytes")?;
        }

        if let Some(percent) = self.usage_percent {
            write!(f, " ({percent:.1}%)")?;
        }

        Ok(())
    }
}
