// Tests for transcript folding: delta accumulation, citation dedup and
// turn-complete finalization.

use witness_live::transcript::{Citation, Speaker, TranscriptLog};

fn citation(uri: &str) -> Citation {
    Citation {
        uri: uri.to_string(),
        title: Some(format!("Title for {}", uri)),
    }
}

#[test]
fn test_deltas_accumulate_into_one_entry() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::Ai, "Hel");
    log.apply_delta(Speaker::Ai, "lo");

    assert_eq!(log.len(), 1);
    let entry = &log.entries()[0];
    assert_eq!(entry.text, "Hello");
    assert_eq!(entry.source, Speaker::Ai);
    assert!(!entry.is_final);
}

#[test]
fn test_turn_complete_finalizes_and_resets() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::Ai, "Hel");
    log.apply_delta(Speaker::Ai, "lo");
    log.complete_turn();

    assert!(log.entries().iter().all(|e| e.is_final));
    let first_id = log.entries()[0].id;

    // The next delta starts a fresh entry with a distinct id and none of
    // the previous turn's text
    log.apply_delta(Speaker::Ai, "Again");
    assert_eq!(log.len(), 2);
    let entry = &log.entries()[1];
    assert_ne!(entry.id, first_id);
    assert_eq!(entry.text, "Again");
    assert!(!entry.is_final);
}

#[test]
fn test_turn_complete_finalizes_every_entry() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::User, "where do I click?");
    log.apply_delta(Speaker::Ai, "Right");
    log.complete_turn();

    assert_eq!(log.len(), 2);
    assert!(log.entries().iter().all(|e| e.is_final));
}

#[test]
fn test_speakers_get_separate_entries() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::User, "hello");
    log.apply_delta(Speaker::Ai, "hi");

    assert_eq!(log.len(), 2);
    assert_eq!(log.entries()[0].source, Speaker::User);
    assert_eq!(log.entries()[1].source, Speaker::Ai);

    // Ids are monotonic in arrival order
    assert!(log.entries()[0].id < log.entries()[1].id);
}

#[test]
fn test_interleaved_speaker_carries_turn_accumulation() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::User, "can you ");
    log.apply_delta(Speaker::Ai, "Sure");
    log.apply_delta(Speaker::User, "help me?");

    // The user's new entry carries the whole in-turn accumulation, so no
    // text is lost when entries interleave within one turn
    assert_eq!(log.len(), 3);
    assert_eq!(log.entries()[2].text, "can you help me?");
}

#[test]
fn test_citations_dedupe_by_uri_in_first_seen_order() {
    let mut log = TranscriptLog::new();
    log.apply_delta(Speaker::Ai, "answer");

    // Delivered across two events, with a duplicate
    log.apply_citation(citation("https://a.example"));
    log.apply_citation(citation("https://b.example"));
    log.apply_citation(citation("https://a.example"));

    let entry = &log.entries()[0];
    assert_eq!(entry.citations.len(), 2);
    assert_eq!(entry.citations[0].uri, "https://a.example");
    assert_eq!(entry.citations[1].uri, "https://b.example");
}

#[test]
fn test_citations_ignored_without_ai_entry() {
    let mut log = TranscriptLog::new();

    // No entries at all
    log.apply_citation(citation("https://a.example"));
    assert!(log.is_empty());

    // Last entry belongs to the user
    log.apply_delta(Speaker::User, "hello");
    log.apply_citation(citation("https://a.example"));
    assert!(log.entries()[0].citations.is_empty());
}

#[test]
fn test_citations_ignored_after_turn_complete() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::Ai, "answer");
    log.complete_turn();

    // Grounding metadata may straggle in after the turn closed; the
    // finalized entry must not change
    log.apply_citation(citation("https://late.example"));
    assert!(log.entries()[0].citations.is_empty());
}

#[test]
fn test_final_entries_are_never_mutated() {
    let mut log = TranscriptLog::new();

    log.apply_delta(Speaker::Ai, "first");
    log.complete_turn();

    log.apply_delta(Speaker::Ai, "second");

    let first = &log.entries()[0];
    assert_eq!(first.text, "first");
    assert!(first.is_final);
    assert_eq!(log.entries()[1].text, "second");
}
