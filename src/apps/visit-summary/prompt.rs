// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::types::{Prompt, VisitRecord};

// ============================================
// System Prompt
// ============================================

pub const SYSTEM_PROMPT: &str = r#"You are provided with notes written by a doctor from a patient's visit.
Your job is to summarize the visit for the doctor and provide an email.
Reply with exactly three sections with the headings:
### Summary of visit for the doctor's records
### Next steps for the doctor
### Draft of email to patient in patient-friendly language"#;

/// Turn a visit into the instruction pair sent to the provider.
///
/// Field contents are interpolated verbatim.
pub fn build_prompt(visit: &VisitRecord) -> Prompt {
    let user = format!(
        r#"Create the summary, next steps and draft email for:
Patient Name: {patient_name}
Date of Visit: {date_of_visit}
Notes:
{notes}"#,
        patient_name = visit.patient_name,
        date_of_visit = visit.date_of_visit,
        notes = visit.notes,
    );

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}
