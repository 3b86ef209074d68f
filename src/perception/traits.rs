use async_trait::async_trait;

use crate::errors::SeeClickResult;
use crate::perception::types::Frame;

/// Source of screen frames for the agent loop.
/// The desktop implementation is `XcapCapturer`; tests script their own.
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    async fn capture(&self) -> SeeClickResult<Frame>;
}
