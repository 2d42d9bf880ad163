//! Ingest integration tests
//!
//! Source trees are built in temp directories and loaded into the in-memory
//! record store; no database is needed.

mod helpers;

use chrono::NaiveDate;
use deedsync::config::IngestConfig;
use deedsync::engine::{IssueKind, ResultAggregator};
use deedsync::ingest::{ExtractKind, Ingestor, SourceFolder};
use deedsync_common::DeedsyncError;
use helpers::{source_folder, write_file, extract, MemoryRecordStore, StoreCall};
use std::path::Path;
use std::sync::Arc;

const PRIME_HEADER: &str = "PRSERV\tInstrument_Date";
const MULTI_HEADER: &str = "PRSERV\tGrantor\tGrantee";

fn config(root: &Path, inner_workers: usize) -> IngestConfig {
    IngestConfig {
        source_root: root.to_path_buf(),
        outer_workers: 2,
        inner_workers,
        ..IngestConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_header_and_detail() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &[PRIME_HEADER, "1\t2024-01-05", "2\tbad-date"],
        &[MULTI_HEADER, "1\tSMITH JOHN\tDOE JANE", "9\tNOBODY\tNEVER"],
    );

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 4))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.sources.counts.committed, 1);
    assert_eq!(report.headers.counts.committed, 2);
    assert_eq!(report.headers.counts.failed, 0);

    let (_, first) = store.document_by_prserv("1").unwrap();
    assert_eq!(first.file_stamp_date, NaiveDate::from_ymd_opt(2024, 1, 5));
    let (_, second) = store.document_by_prserv("2").unwrap();
    assert_eq!(second.file_stamp_date, None);
    assert_eq!(second.degraded, vec!["Instrument_Date"]);

    assert_eq!(report.details.counts.committed, 1);
    assert_eq!(report.details.counts.skipped, 1);
    let issue = &report.details.issues[0];
    assert_eq!(issue.item, "WASTP001/WASTP_multi.txt#2");
    assert_eq!(issue.kind, IssueKind::Skipped);
    assert_eq!(issue.reason, "parent not found: PRSERV=9");

    let (first_id, _) = store.document_by_prserv("1").unwrap();
    let parties = store.parties();
    assert_eq!(parties.len(), 2);
    assert!(parties.iter().all(|p| p.document_id == first_id));
    assert_eq!(parties[0].name, "SMITH JOHN");
    assert_eq!(parties[0].role, "Grantor");
    assert_eq!(parties[1].role, "Grantee");

    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_header_insert_precedes_every_detail_lookup() {
    let tmp = tempfile::tempdir().unwrap();

    let first_headers: Vec<String> = (1..=40).map(|n| format!("{n}\t2020-01-01")).collect();
    let second_headers: Vec<String> = (41..=80).map(|n| format!("{n}\t2021-06-30")).collect();
    // each source's details point at the other source's headers
    let first_details: Vec<String> = (41..=80).map(|n| format!("{n}\tA{n}\tB{n}")).collect();
    let second_details: Vec<String> = (1..=40).map(|n| format!("{n}\tC{n}\t")).collect();

    let rows = |header: &str, body: &[String]| -> Vec<String> {
        std::iter::once(header.to_string()).chain(body.iter().cloned()).collect()
    };
    for (folder, prime, multi) in [
        ("WASTP001", rows(PRIME_HEADER, &first_headers), rows(MULTI_HEADER, &first_details)),
        ("WASTP002", rows(PRIME_HEADER, &second_headers), rows(MULTI_HEADER, &second_details)),
    ] {
        let prime: Vec<&str> = prime.iter().map(String::as_str).collect();
        let multi: Vec<&str> = multi.iter().map(String::as_str).collect();
        source_folder(tmp.path(), folder, &prime, &multi);
    }

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 8))
        .run(tmp.path())
        .await
        .unwrap();

    let calls = store.calls();
    let last_insert = calls
        .iter()
        .rposition(|c| matches!(c, StoreCall::InsertDocument(_)))
        .unwrap();
    let first_lookup = calls
        .iter()
        .position(|c| matches!(c, StoreCall::FindDocument(_)))
        .unwrap();
    assert!(last_insert < first_lookup);

    assert_eq!(report.headers.counts.committed, 80);
    assert_eq!(report.details.counts.committed, 80);
    assert_eq!(store.parties().len(), 40 * 2 + 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_party_written_only_under_committed_document() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &[PRIME_HEADER, "3\t2024-02-01", "4\t2024-02-02"],
        &[MULTI_HEADER, "3\tLOST GRANTOR\tLOST GRANTEE", "4\tKEPT\t"],
    );

    let store = Arc::new(MemoryRecordStore::builder().reject_document("3").build());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 2))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.headers.counts.failed, 1);
    assert!(report.headers.issues[0].reason.starts_with("insert failed for PRSERV=3"));

    assert_eq!(report.details.counts.skipped, 1);
    assert_eq!(report.details.issues[0].reason, "parent not found: PRSERV=3");

    let parties = store.parties();
    assert_eq!(parties.len(), 1);
    assert_eq!(parties[0].name, "KEPT");
    let (kept_id, _) = store.document_by_prserv("4").unwrap();
    assert_eq!(parties[0].document_id, kept_id);
}

#[tokio::test]
async fn test_unknown_abstract_codes_are_dropped() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &["PRSERV\tAbstract", "1\tA-1", "2\tZZZ", "3\t  "],
        &[MULTI_HEADER],
    );

    let store = Arc::new(MemoryRecordStore::builder().abstract_code("A-1").build());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 1))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.headers.counts.committed, 3);
    let codes: Vec<Option<String>> = store
        .documents()
        .into_iter()
        .map(|(_, doc)| doc.abstract_code)
        .collect();
    assert_eq!(codes, vec![Some("A-1".to_string()), None, None]);

    let lookups: Vec<StoreCall> = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::AbstractLookup(_)))
        .collect();
    assert_eq!(
        lookups,
        vec![
            StoreCall::AbstractLookup("A-1".to_string()),
            StoreCall::AbstractLookup("ZZZ".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_structural_problems_skip_the_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    std::fs::create_dir_all(root.join("WASTP001")).unwrap();
    write_file(root, "WASTP002/BLU/WASTP_prime.txt", &extract(&[PRIME_HEADER, "5\t"]));
    source_folder(root, "WASTP003", &[PRIME_HEADER, "6\t"], &[MULTI_HEADER, "6\tX\tY"]);
    source_folder(root, "ARCHIVE", &[PRIME_HEADER, "7\t"], &[MULTI_HEADER]);

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(root, 4))
        .run(root)
        .await
        .unwrap();

    assert_eq!(report.sources.counts.committed, 1);
    assert_eq!(report.sources.counts.skipped, 2);
    assert_eq!(report.sources.issues[0].item, "WASTP001");
    assert_eq!(report.sources.issues[0].reason, "'BLU' subfolder not found");
    assert_eq!(report.sources.issues[1].item, "WASTP002");
    assert_eq!(
        report.sources.issues[1].reason,
        "'WASTP_multi.txt' not found in 'BLU'"
    );

    // only the complete folder was loaded
    assert_eq!(store.documents().len(), 1);
    assert_eq!(report.details.counts.committed, 1);
}

#[tokio::test]
async fn test_detail_extract_without_key_column_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &[PRIME_HEADER, "1\t2024-01-05"],
        &["Grantor\tGrantee", "A\tB"],
    );

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 4))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.headers.counts.committed, 1);
    assert_eq!(report.details.counts.total(), 1);
    assert_eq!(report.details.issues[0].item, "WASTP001/WASTP_multi.txt");
    assert_eq!(report.details.issues[0].reason, "header row has no 'PRSERV' column");
    assert!(store.parties().is_empty());
}

#[tokio::test]
async fn test_header_extract_without_key_column_still_loads() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &["Book\tInstrument_Date", "12\t2024-01-05", "13\tbad"],
        &[MULTI_HEADER, "12\tA\tB"],
    );

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 2))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.headers.counts.committed, 2);
    assert_eq!(report.headers.counts.total(), 2);

    let documents = store.documents();
    assert_eq!(documents.len(), 2);
    assert!(documents.iter().all(|(_, doc)| doc.prserv.is_none()));
    let mut books: Vec<Option<String>> =
        documents.iter().map(|(_, doc)| doc.book.clone()).collect();
    books.sort();
    assert_eq!(books, vec![Some("12".to_string()), Some("13".to_string())]);

    // nothing carries the key, so no detail can find its parent
    assert_eq!(report.details.counts.skipped, 1);
    assert_eq!(report.details.issues[0].reason, "parent not found: PRSERV=12");
}

#[tokio::test]
async fn test_nameless_detail_reports_missing_parent() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &[PRIME_HEADER, "1\t2024-01-05"],
        &[MULTI_HEADER, "9\t\t", "1\t \t"],
    );

    let store = Arc::new(MemoryRecordStore::new());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 1))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.details.counts.skipped, 1);
    assert_eq!(report.details.issues[0].item, "WASTP001/WASTP_multi.txt#1");
    assert_eq!(report.details.issues[0].reason, "parent not found: PRSERV=9");

    // the parent exists, there is just nothing to write under it
    assert_eq!(report.details.counts.committed, 1);
    assert!(store.parties().is_empty());
    assert!(!store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::InsertParties(..))));
}

#[tokio::test]
async fn test_unreadable_extract_is_one_failed_outcome() {
    let tmp = tempfile::tempdir().unwrap();
    let blu = tmp.path().join("WASTP001/BLU");
    let source = SourceFolder {
        name: "WASTP001".to_string(),
        header_path: blu.join("WASTP_prime.txt"),
        detail_path: blu.join("WASTP_multi.txt"),
    };

    let store = Arc::new(MemoryRecordStore::new());
    let ingestor = Ingestor::new(store.clone(), &config(tmp.path(), 4));
    let headers = ResultAggregator::new("headers");
    ingestor.load_file(&source, ExtractKind::Header, &headers).await;

    let report = headers.report();
    assert_eq!(report.counts.total(), 1);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.issues[0].item, "WASTP001/WASTP_prime.txt");
    assert_eq!(report.issues[0].kind, IssueKind::Failed);
    assert!(report.issues[0].reason.starts_with("Failed to read extract"));
    assert_eq!(store.sessions_opened(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lookup_error_aborts_rest_of_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    source_folder(
        tmp.path(),
        "WASTP001",
        &[PRIME_HEADER, "5\t", "6\t"],
        &[MULTI_HEADER, "5\tA\tB", "6\tC\tD"],
    );

    let store = Arc::new(MemoryRecordStore::builder().break_lookup("5").build());
    let report = Ingestor::new(store.clone(), &config(tmp.path(), 1))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.details.counts.failed, 2);
    assert_eq!(report.details.issues[0].item, "WASTP001/WASTP_multi.txt#1");
    assert!(report.details.issues[0].reason.contains("connection reset by peer"));
    assert!(report.details.issues[1]
        .reason
        .starts_with("chunk aborted after WASTP001/WASTP_multi.txt#1"));

    assert!(store.parties().is_empty());
    assert_eq!(store.open_sessions(), 0);
}

#[tokio::test]
async fn test_missing_source_root_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope");

    let result = Ingestor::new(Arc::new(MemoryRecordStore::new()), &config(&missing, 1))
        .run(&missing)
        .await;

    assert!(matches!(result, Err(DeedsyncError::SourceRoot(_))));
}

#[tokio::test]
async fn test_empty_root_produces_empty_report() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let report = Ingestor::new(store.clone(), &config(tmp.path(), 4))
        .run(tmp.path())
        .await
        .unwrap();

    assert_eq!(report.sources.counts.total(), 0);
    assert_eq!(report.headers.counts.total(), 0);
    assert_eq!(store.sessions_opened(), 0);
    assert!(report.to_string().starts_with("sources: 0 committed"));
}
