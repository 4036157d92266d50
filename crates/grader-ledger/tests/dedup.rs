//! End-to-end registry and ledger flows, including concurrent submitters.

use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use grader_core::KeyId;
use grader_ledger::{
    LedgerError, NewUser, QuestionRecord, Registry, SubmissionDeduplicator, SubmitRequest,
};
use proptest::prelude::*;

fn kid(n: u8) -> KeyId {
    KeyId::from_digest_prefix(&[n; 32], 20)
}

fn setup() -> (Registry, QuestionRecord) {
    let registry = Registry::new();
    let alice = kid(1);
    registry
        .upsert_user(
            NewUser {
                username: "alice".into(),
                email: "alice@example.edu".into(),
                key_id: alice.clone(),
                public_key_der: vec![],
            },
            |_| Ok::<_, LedgerError>(()),
        )
        .unwrap();
    registry.upsert_group("G", &alice).unwrap();
    registry.upsert_module("M", "G", &alice).unwrap();
    let question = registry
        .upsert_question("M", "Q", &BASE64.encode(b"grader"), 0, &alice)
        .unwrap()
        .record;
    (registry, question)
}

fn request<'a>(q: &'a QuestionRecord, b64: &'a str, who: &'a KeyId, group: &'a str) -> SubmitRequest<'a> {
    SubmitRequest {
        namespace: "default",
        question: q,
        payload_b64: b64,
        submitter: who,
        group,
    }
}

#[test]
fn test_alice_submits_twice_and_switching_group_fails() {
    let (registry, q) = setup();
    let ledger = SubmissionDeduplicator::default();
    let alice = kid(1);
    let b64 = BASE64.encode(b"42");

    assert!(registry.is_member("G", &alice).unwrap());
    let first = ledger.submit(request(&q, &b64, &alice, "G")).unwrap();
    let again = ledger.submit(request(&q, &b64, &alice, "G")).unwrap();
    assert_eq!(first.answer_id, again.answer_id);
    assert_eq!(first.result_id, again.result_id);

    registry.upsert_group("H", &alice).unwrap();
    let err = ledger.submit(request(&q, &b64, &alice, "H")).unwrap_err();
    assert!(matches!(err, LedgerError::OwnershipConflict { .. }));
    assert_eq!(ledger.answer_count(), 1);
    assert_eq!(ledger.result_count(), 1);
}

#[test]
fn test_question_lookup_requires_existing_module() {
    let (registry, _) = setup();
    assert!(matches!(
        registry.question("nope", "Q"),
        Err(LedgerError::UnknownModule(_))
    ));
    assert!(matches!(
        registry.question("M", "nope"),
        Err(LedgerError::UnknownQuestion { .. })
    ));
}

#[test]
fn test_concurrent_identical_submissions_share_one_result() {
    let (_, q) = setup();
    let ledger = SubmissionDeduplicator::default();
    let b64 = BASE64.encode(br#"{"answer": 42}"#);
    let threads = 8;
    let barrier = Barrier::new(threads);

    let receipts: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let (ledger, q, b64, barrier) = (&ledger, &q, &b64, &barrier);
                s.spawn(move || {
                    let who = kid(i as u8 + 1);
                    barrier.wait();
                    ledger.submit(request(q, b64, &who, "G")).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let results: HashSet<i64> = receipts.iter().map(|r| r.result_id).collect();
    let answers: HashSet<i64> = receipts.iter().map(|r| r.answer_id).collect();
    assert_eq!(results.len(), 1);
    assert_eq!(answers.len(), threads);
    assert_eq!(ledger.result_count(), 1);
    assert_eq!(ledger.answer_count(), threads);
}

#[test]
fn test_concurrent_resubmissions_by_one_submitter() {
    let (_, q) = setup();
    let ledger = SubmissionDeduplicator::default();
    let b64 = BASE64.encode(b"42");
    let alice = kid(1);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| ledger.submit(request(&q, &b64, &alice, "G")).unwrap());
        }
    });

    assert_eq!(ledger.answers_for(&alice, q.id).len(), 1);
    assert_eq!(ledger.result_count(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_result_rows_match_distinct_payloads(values in prop::collection::vec(0u8..6, 1..20)) {
        let (_, q) = setup();
        let ledger = SubmissionDeduplicator::default();
        for (i, v) in values.iter().enumerate() {
            let b64 = BASE64.encode(v.to_string());
            let who = kid((i % 3) as u8 + 1);
            ledger.submit(request(&q, &b64, &who, "G")).unwrap();
        }
        let distinct: HashSet<u8> = values.iter().copied().collect();
        prop_assert_eq!(ledger.result_count(), distinct.len());
    }
}
