use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (0..self.width as i64).contains(&x) && (0..self.height as i64).contains(&y)
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured screen, ready to be sent to the model.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Base64 PNG of the downscaled image.
    pub image_base64: String,
    /// Size of the image that was encoded. Model coordinates live in this space.
    pub sent: FrameSize,
    /// Size of the screen the executor clicks on.
    pub screen: FrameSize,
}

impl Frame {
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.image_base64)
    }
}
