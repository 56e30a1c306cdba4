//! Stack allocator configuration

/// Configuration for [`StackAllocator`](super::StackAllocator)
#[derive(Debug, Clone, Copy)]
pub struct StackConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern written to a region when it is allocated
    pub alloc_pattern: Option<u8>,
    /// Fill pattern written to a region when the head rewinds over it
    pub dealloc_pattern: Option<u8>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl StackConfig {
    /// Production configuration - no tracking, no fill patterns
    pub fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - full tracking and fill patterns
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
        }
    }
}
