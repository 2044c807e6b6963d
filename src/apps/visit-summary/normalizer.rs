// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::types::{EventLine, StreamChunk};
use crate::RelayError;
use futures::{Stream, StreamExt};

/// Split one chunk into framed lines.
///
/// Every fragment but the last is followed by a keep-alive; empty chunks
/// produce nothing. CR and CRLF count as line breaks.
pub fn frame_chunk(chunk: &StreamChunk) -> Vec<EventLine> {
    frame_text(&chunk.text)
}

fn frame_text(text: &str) -> Vec<EventLine> {
    if text.is_empty() {
        return Vec::new();
    }

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let fragments: Vec<&str> = text.split('\n').collect();
    let last = fragments.len() - 1;

    let mut lines = Vec::with_capacity(fragments.len() * 2);
    for (i, fragment) in fragments.into_iter().enumerate() {
        lines.push(EventLine::Data(fragment.to_string()));
        if i < last {
            lines.push(EventLine::KeepAlive);
        }
    }
    lines
}

/// Frames consecutive chunks of one stream.
///
/// A CRLF may arrive split across two chunks. The CR already counted as a
/// line break, so the LF opening the next non-empty chunk is skipped.
#[derive(Debug, Default)]
pub struct LineFramer {
    after_cr: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&mut self, chunk: &StreamChunk) -> Vec<EventLine> {
        if chunk.is_empty() {
            return Vec::new();
        }

        let text = if self.after_cr {
            chunk.text.strip_prefix('\n').unwrap_or(&chunk.text)
        } else {
            chunk.text.as_str()
        };
        self.after_cr = chunk.text.ends_with('\r');
        frame_text(text)
    }
}

/// Re-frame a provider stream, one chunk at a time and in arrival order.
///
/// A provider error is passed through once and ends the sequence.
pub fn normalize<S>(chunks: S) -> impl Stream<Item = Result<EventLine, RelayError>> + Send
where
    S: Stream<Item = Result<StreamChunk, RelayError>> + Send + 'static,
{
    async_stream::stream! {
        futures::pin_mut!(chunks);
        let mut framer = LineFramer::new();
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    for line in framer.frame(&chunk) {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
