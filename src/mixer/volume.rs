/// Raw volume limits reported by a backend for one control
///
/// Values are in the backend's own units; `normal` is the 100% level and
/// `base` the level at which the hardware does no amplification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRange {
    /// Lowest accepted level
    pub min: u32,
    /// Highest accepted level
    pub max: u32,
    /// 100% level
    pub normal: u32,
    /// Hardware reference level
    pub base: u32,
}

impl VolumeRange {
    /// Create a range where `normal` and `base` both equal `max`
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min,
            max,
            normal: max,
            base: max,
        }
    }

    /// Whether `level` lies within the range
    pub fn contains(&self, level: u32) -> bool {
        (self.min..=self.max).contains(&level)
    }
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self::new(0, 65536)
    }
}

/// Per-channel volume levels of a control
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Volume {
    levels: Vec<u32>,
}

impl Volume {
    /// Create a volume from explicit channel levels
    pub fn new(levels: Vec<u32>) -> Self {
        Self { levels }
    }

    /// Create a volume with every channel at `level`
    pub fn uniform(channels: usize, level: u32) -> Self {
        Self::new(vec![level; channels])
    }

    /// Level of a specific channel
    pub fn channel(&self, channel: usize) -> Option<u32> {
        self.levels.get(channel).copied()
    }

    /// Copy of this volume with one channel changed
    ///
    /// Returns `None` if the channel does not exist.
    pub fn with_channel(&self, channel: usize, level: u32) -> Option<Self> {
        let mut levels = self.levels.clone();
        *levels.get_mut(channel)? = level;
        Some(Self { levels })
    }

    /// Loudest channel level, which is what a single volume slider shows
    pub fn max(&self) -> u32 {
        self.levels.iter().copied().max().unwrap_or(0)
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.levels.len()
    }

    /// All channel levels
    pub fn as_slice(&self) -> &[u32] {
        &self.levels
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn max_of_empty_volume_is_zero() {
        assert_eq!(Volume::default().max(), 0);
        assert_eq!(Volume::new(vec![10, 40, 20]).max(), 40);
    }

    #[test]
    fn with_channel_rejects_missing_channel() {
        let volume = Volume::uniform(2, 100);

        assert_eq!(volume.with_channel(1, 5), Some(Volume::new(vec![100, 5])));
        assert_eq!(volume.with_channel(2, 5), None);
    }

    #[test]
    fn range_contains_bounds() {
        let range = VolumeRange::new(10, 20);

        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
        assert_eq!(range.normal, 20);
    }
}
