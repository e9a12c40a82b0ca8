//! Full pipeline walk-through: three documents against two requests, one of
//! which hits a dead model, then review, persistence, and export.

use chrono::{TimeZone, Utc};
use recordflow::config::ModelConfig;
use recordflow::llm::ollama::MockLlmClient;
use recordflow::llm::ModelClient;
use recordflow::models::{
    Document, ExemptionCategory, ExemptionOutcome, InformationRequest, OverrideField,
    OverrideValue, ProcessingSession, ReviewStatus,
};
use recordflow::pipeline::{run_batch, BatchOptions};
use recordflow::review::{
    apply_override, batch_approve, final_determination, mark_reviewed, review_summary,
    BatchApproveOutcome, ReviewError,
};
use recordflow::session_store::SessionStore;
use std::time::Duration;

fn doc(id: &str, subject: &str, body: &str) -> Document {
    Document {
        id: id.into(),
        from_address: "staff@city.gov".into(),
        to_addresses: vec!["records@city.gov".into()],
        cc_addresses: vec![],
        subject: subject.into(),
        body: body.into(),
        sent_at: Utc.with_ymd_and_hms(2024, 7, 10, 14, 0, 0).unwrap(),
        parsed_successfully: true,
        parse_errors: vec![],
    }
}

const A_RESPONSIVE: &str = r#"{
    "responsive": [true, false],
    "confidence": ["high", "high"],
    "reasoning": ["Directly discusses the Oak St budget.", "No personnel complaint content."]
}"#;

const A_NO_EXEMPTIONS: &str = r#"{
    "exemptions": {
        "attorney_client": {"applies": false, "confidence": "high", "reasoning": "No counsel on thread."},
        "personnel": {"applies": false, "confidence": "high", "reasoning": "No employee matters."},
        "deliberative": {"applies": false, "confidence": "medium", "reasoning": "Adopted final figures."}
    }
}"#;

const B_NOT_RESPONSIVE: &str = r#"{
    "responsive": [false, false],
    "confidence": ["high", "medium"],
    "reasoning": ["Cafeteria schedule, unrelated to the budget.", "Not a personnel complaint."]
}"#;

#[test]
fn three_documents_two_requests_full_workflow() {
    let mut session = ProcessingSession::new(
        "gemma3:latest",
        vec![
            InformationRequest::new(1, "Records concerning the Oak St budget"),
            InformationRequest::new(2, "Personnel complaints filed in 2024"),
        ],
        vec![
            doc("a", "Oak St budget adopted", "Final budget figures attached."),
            doc("b", "Cafeteria hours", "New cafeteria schedule next week."),
            doc("c", "Quarterly summary", "Summary of department activity."),
        ],
    )
    .unwrap();

    // A: responsive, then a clean exemption pass. B: non-responsive. C: the
    // model stops answering (three failed attempts exhaust the budget).
    let mock = MockLlmClient::new("")
        .push_response(A_RESPONSIVE)
        .push_response(A_NO_EXEMPTIONS)
        .push_response(B_NOT_RESPONSIVE)
        .fail_after_queue();
    let client = ModelClient::new(
        Box::new(mock),
        ModelConfig {
            retry_delay: Duration::from_millis(0),
            ..ModelConfig::default()
        },
    );

    let result = run_batch(&mut session, &client, &BatchOptions::default());

    assert_eq!(result.documents_processed, 3);
    assert_eq!(result.exemption_calls, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(!result.cancelled);

    // A went through both stages
    assert!(session.responsiveness["a"][0].responsive);
    assert_eq!(session.exemptions["a"].outcome, ExemptionOutcome::NoneFound);

    // B was gated out of stage two without a model call
    assert_eq!(
        session.exemptions["b"].outcome,
        ExemptionOutcome::NotApplicable
    );

    // C got fallback analyses and the batch kept going
    assert!(session.responsiveness["c"].iter().all(|a| a.from_fallback));
    assert_eq!(session.stats.failed_document_ids, vec!["c".to_string()]);
    assert_eq!(session.stats.analysis_error_documents, 1);
    assert_eq!(session.stats.processed_documents, 3);

    // Mid-review persistence: what comes back is exactly what went in
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(dir.path()).unwrap();
    store.save(&session).unwrap();
    let mut session = store.load(session.id).unwrap();

    // A and B approve as-is; C is blocked until its fallbacks are overridden
    let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let outcomes = batch_approve(&mut session, &ids);
    assert_eq!(outcomes[0].1, BatchApproveOutcome::Approved);
    assert_eq!(outcomes[1].1, BatchApproveOutcome::Approved);
    assert!(matches!(outcomes[2].1, BatchApproveOutcome::Rejected { .. }));

    let err = mark_reviewed(&mut session, "c").unwrap_err();
    assert!(matches!(err, ReviewError::IncompleteReview { .. }));

    // Human reads C, overrides both fallback fields, and completes it
    for index in 1..=2 {
        apply_override(
            &mut session,
            "c",
            OverrideField::Responsiveness {
                request_index: index,
            },
            OverrideValue::Responsive(index == 1),
            "manual read after model failure",
        )
        .unwrap();
    }
    apply_override(
        &mut session,
        "c",
        OverrideField::Exemptions,
        OverrideValue::Exemptions(vec![ExemptionCategory::Deliberative]),
        "draft figures quoted in the summary",
    )
    .unwrap();
    mark_reviewed(&mut session, "c").unwrap();

    let summary = review_summary(&session);
    assert_eq!(summary.completed, 3);
    assert!((summary.completion() - 1.0).abs() < 1e-9);

    // Export merges AI verdicts with the human overrides
    let det_a = final_determination(&session, "a").unwrap();
    assert_eq!(det_a.responsive, vec![true, false]);
    assert!(det_a.exemptions.is_empty());
    assert!(det_a.overridden_fields.is_empty());

    let det_c = final_determination(&session, "c").unwrap();
    assert_eq!(det_c.responsive, vec![true, false]);
    assert_eq!(det_c.exemptions, vec![ExemptionCategory::Deliberative]);
    assert_eq!(det_c.overridden_fields.len(), 3);

    // Final state persists and reloads completed
    store.save(&session).unwrap();
    let reloaded = store.load(session.id).unwrap();
    assert_eq!(reloaded, session);
    assert_eq!(reloaded.reviews["c"].status, ReviewStatus::Completed);
}
