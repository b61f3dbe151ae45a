//! UI interaction layer.
//!
//! Resolves windows and controls on an isolated surface and performs
//! interactions against them. Target resolution runs through an
//! ordered fallback chain: accessibility tree, then pixel template
//! match, then vision-model coordinate inference, then OCR as a
//! read-only last resort. Screenshots live exactly as long as the
//! operation that captured them.

pub mod chain;
pub mod error;
pub mod ocr;
pub mod provider;
pub mod screen;
pub mod search;
pub mod template;
pub mod types;
pub mod vlm;

pub use chain::{ClickContext, ClickOutcome, ClickStrategy, ScreenSource, UiSession, VisionLocator};
pub use error::{UiError, UiResult};
pub use provider::{AccessibilityProvider, PointerDriver, WmctrlWindows, XdoPointer};
pub use search::{control_search, score_name};
pub use types::{ControlMatch, Point, UiNode, WindowInfo};
pub use vlm::{VlmClient, VlmConfig};
