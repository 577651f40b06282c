//! Incremental line segmentation of raw tool output.
//!
//! Bytes arrive in arbitrary chunks. Complete lines are emitted as soon as their
//! terminator shows up; whatever follows the last terminator stays pending until
//! more data arrives, unless it already looks like a prompt. Tools routinely
//! print `Pilih menu: ` and then block on stdin without a newline, so waiting for
//! the terminator would stall the conversation.

use super::classifier::Classifier;

/// Replacement for bytes that are not valid UTF-8.
const REPLACEMENT: char = '\u{FFFD}';

/// A unit of text cut out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// Set when the text arrived without a line terminator.
    pub partial: bool,
}

impl Segment {
    fn line(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: false,
        }
    }

    fn fragment(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: true,
        }
    }
}

/// Accumulates decoded output and cuts it into segments.
#[derive(Debug, Default)]
pub struct LineSegmenter {
    /// Decoded text after the last line terminator.
    pending: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    carry: Vec<u8>,
}

impl LineSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of raw output and collect the segments it completes.
    pub fn push(&mut self, bytes: &[u8], classifier: &dyn Classifier) -> Vec<Segment> {
        let text = self.decode(bytes);
        self.pending.push_str(&text);

        let mut segments = Vec::new();

        if let Some(last) = self.pending.rfind('\n') {
            let complete: String = self.pending.drain(..=last).collect();
            segments.extend(
                complete
                    .split('\n')
                    .map(|line| line.strip_suffix('\r').unwrap_or(line))
                    .filter(|line| !line.is_empty())
                    .map(Segment::line),
            );
        }

        let fragment = self.pending.trim();
        if !fragment.is_empty() && classifier.looks_like_prompt(fragment) {
            segments.push(Segment::fragment(fragment));
            self.pending.clear();
        }

        segments
    }

    /// Drain whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<Segment> {
        if !self.carry.is_empty() {
            self.carry.clear();
            self.pending.push(REPLACEMENT);
        }

        let leftover = std::mem::take(&mut self.pending);
        let leftover = leftover.trim_end_matches(['\r', '\n']);
        if leftover.is_empty() {
            None
        } else {
            Some(Segment::fragment(leftover))
        }
    }

    /// Text received after the last line terminator.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Drop any pending text and carried bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.carry.clear();
    }

    /// Decode lossily, holding back an incomplete multi-byte sequence at the end
    /// of the chunk so it can be completed by the next one.
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(bytes);

        let mut out = String::with_capacity(data.len());
        let mut rest = data.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &tail[len..];
                        }
                        None => {
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}
