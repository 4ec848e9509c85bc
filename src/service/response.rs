//! Classification of the text the platform shows after a claim is submitted.

const FAILURE_MARKERS: &[&str] = &[
    "error",
    "failed",
    "unable to",
    "could not",
    "invalid",
    "try again",
    "not submitted",
    "declined",
];

const SUCCESS_MARKERS: &[&str] = &[
    "success",
    "submitted",
    "thank you",
    "received",
    "has been filed",
];

const ID_ANCHORS: &[&str] = &["confirmation", "reference", "claim"];
const ID_FILLERS: &[&str] = &["#", "number", "no", "no.", "id", "num", ":", "is"];

const MAX_MESSAGE_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Confirmed {
        confirmation_id: Option<String>,
        message: String,
    },
    Rejected {
        message: String,
    },
    /// Neither signal was found; treated as success pending confirmation
    Pending {
        message: String,
    },
}

pub fn classify_response(text: &str) -> SubmitOutcome {
    let lower = text.to_lowercase();

    if let Some(marker) = FAILURE_MARKERS.iter().find(|m| lower.contains(*m)) {
        return SubmitOutcome::Rejected {
            message: extract_sentence(text, &lower, marker),
        };
    }

    if SUCCESS_MARKERS.iter().any(|m| lower.contains(m)) {
        let confirmation_id = extract_confirmation_id(text);
        let message = match &confirmation_id {
            Some(id) => format!("Claim submitted successfully (confirmation {id})"),
            None => "Claim submitted successfully".to_string(),
        };
        return SubmitOutcome::Confirmed {
            confirmation_id,
            message,
        };
    }

    SubmitOutcome::Pending {
        message: "Claim submitted, confirmation pending".to_string(),
    }
}

/// First token after a confirmation/reference/claim anchor that carries a digit
pub fn extract_confirmation_id(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let anchor = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if !ID_ANCHORS.contains(&anchor.as_str()) {
            continue;
        }

        for next in &words[i + 1..] {
            let lowered = next.to_lowercase();
            if ID_FILLERS.contains(&lowered.as_str())
                || ID_FILLERS.contains(&lowered.trim_end_matches(':'))
            {
                continue;
            }
            let candidate = next
                .trim_start_matches('#')
                .trim_matches(|c: char| !c.is_alphanumeric());
            let well_formed = candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !candidate.is_empty() && well_formed && candidate.chars().any(|c| c.is_ascii_digit())
            {
                return Some(candidate.to_string());
            }
            break;
        }
    }
    None
}

/// The sentence around `marker`, trimmed to a readable length
fn extract_sentence(text: &str, lower: &str, marker: &str) -> String {
    let Some(pos) = lower.find(marker) else {
        return truncate(text.trim());
    };
    let is_break = |c: char| matches!(c, '.' | '!' | '\n');
    let start = lower[..pos].rfind(is_break).map_or(0, |p| p + 1);
    let end = lower[pos..].find(is_break).map_or(lower.len(), |p| pos + p);
    // lowercase can change byte lengths; fall back to the whole text then
    let sentence = text.get(start..end).unwrap_or(text).trim();
    truncate(sentence)
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_MESSAGE_LEN {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_MESSAGE_LEN).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_confirmation_number() {
        let outcome = classify_response(
            "Thank you! Your claim was submitted. Confirmation number: TC-48213.",
        );
        assert_eq!(
            outcome,
            SubmitOutcome::Confirmed {
                confirmation_id: Some("TC-48213".into()),
                message: "Claim submitted successfully (confirmation TC-48213)".into(),
            }
        );
    }

    #[test]
    fn success_without_identifier() {
        match classify_response("Claim submitted successfully") {
            SubmitOutcome::Confirmed {
                confirmation_id, ..
            } => assert_eq!(confirmation_id, None),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn failure_wins_over_success_words() {
        let outcome = classify_response(
            "Your request was received. Error: amount exceeds reimbursable limit. Please review.",
        );
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                message: "Error: amount exceeds reimbursable limit".into()
            }
        );
    }

    #[test]
    fn ambiguous_response_is_pending() {
        assert!(matches!(
            classify_response("Trips  |  Vehicles  |  Earnings"),
            SubmitOutcome::Pending { .. }
        ));
        assert!(matches!(classify_response(""), SubmitOutcome::Pending { .. }));
    }

    #[test]
    fn confirmation_id_shapes() {
        assert_eq!(extract_confirmation_id("Claim #98765 created"), Some("98765".into()));
        assert_eq!(
            extract_confirmation_id("Reference: R-1234 has been filed"),
            Some("R-1234".into())
        );
        assert_eq!(
            extract_confirmation_id("Your confirmation number is ABC123."),
            Some("ABC123".into())
        );
        assert_eq!(extract_confirmation_id("Claim submitted successfully"), None);
    }
}
