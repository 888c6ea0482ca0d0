// MIT/Apache2 License

/// The lane an event is queued in. Higher lanes always drain before lower ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Ultimate = 3,
}

/// The number of lanes in an event queue.
pub const LANE_COUNT: usize = 4;

impl Priority {
    /// Every priority, in the order lanes are drained.
    pub const DESCENDING: [Priority; LANE_COUNT] = [
        Priority::Ultimate,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Index of this priority's lane.
    #[inline]
    pub fn lane(self) -> usize {
        self as usize
    }
}

impl Default for Priority {
    #[inline]
    fn default() -> Self {
        Self::Normal
    }
}
