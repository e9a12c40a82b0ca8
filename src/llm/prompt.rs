//! Prompt construction for the two analysis stages.
//!
//! The system prompts pin the output contract: strict JSON, fixed field
//! names, and for responsiveness an exact-array-length rule keyed to the
//! number of requests. The parser enforces the same contract on the way
//! back in, so a model that drifts from it triggers a retry rather than a
//! silently wrong record.

use crate::models::{Document, InformationRequest};

pub const RESPONSIVENESS_SYSTEM_PROMPT: &str = "\
You are an assistant helping a government agency respond to public records \
requests. You determine whether documents are responsive to specific \
requests for information.

A document is RESPONSIVE to a request if its content relates to the \
subject matter of the request. Judge responsiveness on content, not on \
whether the document would ultimately be released.

Respond with ONLY a JSON object, no other text, in exactly this format:
{
  \"responsive\": [true, false, ...],
  \"confidence\": [\"high\", \"medium\", \"low\", ...],
  \"reasoning\": [\"explanation for request 1\", \"explanation for request 2\", ...]
}

Each array must have EXACTLY one entry per request, in request order. \
Confidence must be one of: high, medium, low. Each reasoning entry must \
briefly explain the determination for that request.";

pub const EXEMPTION_SYSTEM_PROMPT: &str = "\
You are an assistant helping a government agency respond to public records \
requests. You determine whether statutory exemptions from disclosure apply \
to a responsive document.

Evaluate exactly these three exemption categories:

1. attorney_client: Communications between agency staff and legal counsel \
made for the purpose of seeking or providing legal advice.
2. personnel: Information from personnel files or about identifiable \
employees whose disclosure would be an unwarranted invasion of privacy, \
such as performance reviews, discipline, or medical matters.
3. deliberative: Pre-decisional drafts, recommendations, and internal \
deliberations that precede a final agency decision.

Respond with ONLY a JSON object, no other text, in exactly this format:
{
  \"exemptions\": {
    \"attorney_client\": {\"applies\": true, \"confidence\": \"high\", \"reasoning\": \"...\"},
    \"personnel\": {\"applies\": false, \"confidence\": \"high\", \"reasoning\": \"...\"},
    \"deliberative\": {\"applies\": false, \"confidence\": \"medium\", \"reasoning\": \"...\"}
  }
}

All three categories must be present. Confidence must be one of: high, \
medium, low.";

/// Build the stage-one user prompt for one document against all requests.
pub fn responsiveness_prompt(document: &Document, requests: &[InformationRequest]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "There are {} information request(s):\n\n",
        requests.len()
    ));
    for request in requests {
        prompt.push_str(&format!("Request {}: {}\n", request.index, request.text));
    }
    prompt.push_str("\nDocument to evaluate:\n---\n");
    prompt.push_str(&document.display_text());
    prompt.push_str("\n---\n\n");
    prompt.push_str(&format!(
        "Determine, for each of the {} request(s) in order, whether this \
         document is responsive. Remember: each JSON array must contain \
         exactly {} entries.",
        requests.len(),
        requests.len()
    ));
    prompt
}

/// Build the stage-two user prompt for one responsive document.
pub fn exemption_prompt(document: &Document) -> String {
    let mut prompt = String::new();
    prompt.push_str("Document to evaluate for exemptions:\n---\n");
    prompt.push_str(&document.display_text());
    prompt.push_str("\n---\n\n");
    prompt.push_str(
        "Determine, for each of the three exemption categories, whether it \
         applies to this document.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn doc() -> Document {
        Document {
            id: "msg-1".into(),
            from_address: "counsel@city.gov".into(),
            to_addresses: vec!["manager@city.gov".into()],
            cc_addresses: vec![],
            subject: "Re: litigation hold".into(),
            body: "Please preserve all records related to the Oak St project.".into(),
            sent_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            parsed_successfully: true,
            parse_errors: vec![],
        }
    }

    #[test]
    fn responsiveness_prompt_lists_all_requests() {
        let requests = vec![
            InformationRequest::new(1, "Records about the Oak St project"),
            InformationRequest::new(2, "Communications with outside counsel"),
        ];
        let prompt = responsiveness_prompt(&doc(), &requests);
        assert!(prompt.contains("There are 2 information request(s)"));
        assert!(prompt.contains("Request 1: Records about the Oak St project"));
        assert!(prompt.contains("Request 2: Communications with outside counsel"));
        assert!(prompt.contains("exactly 2 entries"));
        assert!(prompt.contains("Re: litigation hold"));
    }

    #[test]
    fn exemption_prompt_embeds_document_text() {
        let prompt = exemption_prompt(&doc());
        assert!(prompt.contains("From: counsel@city.gov"));
        assert!(prompt.contains("exemption categories"));
    }

    #[test]
    fn system_prompts_name_the_output_contract() {
        assert!(RESPONSIVENESS_SYSTEM_PROMPT.contains("\"responsive\""));
        assert!(RESPONSIVENESS_SYSTEM_PROMPT.contains("EXACTLY one entry per request"));
        for category in ["attorney_client", "personnel", "deliberative"] {
            assert!(EXEMPTION_SYSTEM_PROMPT.contains(category));
        }
    }
}
