//! Playable stereo response buffers

/// Two-channel sample buffer handed to convolution stages
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Left ear samples
    pub left: Vec<f32>,
    /// Right ear samples
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Create buffer from two channels
    pub fn new(sample_rate: u32, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            sample_rate,
            left,
            right,
        }
    }

    /// Frames per channel (longest channel)
    pub fn len(&self) -> usize {
        self.left.len().max(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Channel by index (0 = left, 1 = right)
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        match index {
            0 => Some(&self.left),
            1 => Some(&self.right),
            _ => None,
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }
}
