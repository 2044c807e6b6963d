// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::RelayError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Visit notes submitted by a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub patient_name: String,
    pub date_of_visit: String,
    pub notes: String,
}

impl VisitRecord {
    /// Parse a raw request body. Any missing or non-string field is an InvalidInput.
    pub fn from_json(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body)
            .map_err(|e| RelayError::InvalidInput(format!("Malformed visit payload: {e}")))
    }
}

/// Subject of a verified bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

/// The fixed system instruction plus the per-visit user instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// One unit of raw text from a provider's generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,
}

impl StreamChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One frame of the outbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLine {
    /// A line fragment, written as `data: <text>\n\n`.
    Data(String),
    /// A bare `data: \n` line with no terminator. SSE clients fold it into
    /// the following frame as a leading line break.
    KeepAlive,
}

impl EventLine {
    pub fn to_frame(&self) -> String {
        match self {
            EventLine::Data(text) => format!("data: {text}\n\n"),
            EventLine::KeepAlive => "data: \n".to_string(),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.to_frame())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_visit_from_json() {
        let visit = VisitRecord::from_json(
            br#"{"patient_name":"Jane Doe","date_of_visit":"2024-01-01","notes":"BP 120/80"}"#,
        )
        .unwrap();
        assert_eq!(visit.patient_name, "Jane Doe");
        assert_eq!(visit.date_of_visit, "2024-01-01");
        assert_eq!(visit.notes, "BP 120/80");
    }

    #[test]
    fn test_visit_missing_field() {
        let err = VisitRecord::from_json(br#"{"patient_name":"Jane Doe","notes":"x"}"#).unwrap_err();
        match err {
            RelayError::InvalidInput(msg) => assert!(msg.contains("date_of_visit")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_visit_not_json() {
        assert!(matches!(
            VisitRecord::from_json(b"patient_name=Jane"),
            Err(RelayError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_frames() {
        assert_eq!(EventLine::Data("All normal.".into()).to_frame(), "data: All normal.\n\n");
        assert_eq!(EventLine::Data(String::new()).to_frame(), "data: \n\n");
        assert_eq!(EventLine::KeepAlive.to_frame(), "data: \n");
    }
}
