//! Output stream processing: segmentation and classification.

pub mod classifier;
pub mod segmenter;

pub use classifier::{Classifier, DEFAULT_PROMPT_KEYWORDS, PatternClassifier, Unit};
pub use segmenter::{LineSegmenter, Segment};
