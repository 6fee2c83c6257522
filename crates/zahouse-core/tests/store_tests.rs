use std::sync::Arc;

use tempfile::TempDir;
use zahouse_core::store::{CaptureOutcome, InquiryStore, JsonStore, LeadStore};
use zahouse_core::{Lead, NewInquiry};

fn inquiry(name: &str, email: &str) -> NewInquiry {
    NewInquiry {
        name: name.into(),
        email: email.into(),
        phone: Some(" ".into()),
        artist_name: Some("Lil Test".into()),
        inquiry_type: None,
        message: "  Need a second look at my publishing deal.  ".into(),
    }
}

#[tokio::test]
async fn missing_file_loads_empty() {
    let dir = TempDir::new().unwrap();
    let store: JsonStore<Lead> = JsonStore::new(dir.path().join("nope.json"));
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_file_loads_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leads.json");
    std::fs::write(&path, "  \n").unwrap();
    let store: JsonStore<Lead> = JsonStore::new(&path);
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_file_is_an_error_and_left_alone() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leads.json");
    std::fs::write(&path, "{not json").unwrap();
    let leads = LeadStore::new(&path);
    assert!(leads.capture("a@b.co", None, "test").await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
}

#[tokio::test]
async fn append_creates_parent_dirs_and_writes_json_array() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/data/items.json");
    let store: JsonStore<String> = JsonStore::new(&path);
    store.append("one".to_string()).await.unwrap();
    store.append("two".to_string()).await.unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, vec!["one", "two"]);
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn lead_capture_dedupes_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let leads = LeadStore::new(dir.path().join("leads.json"));

    let first = leads
        .capture("Artist@Label.com", Some("Ari".into()), "audit")
        .await
        .unwrap();
    let second = leads.capture(" artist@label.COM ", None, "footer").await.unwrap();
    let other = leads.capture("manager@label.com", None, "footer").await.unwrap();

    assert_eq!(first, CaptureOutcome::Created);
    assert_eq!(second, CaptureOutcome::Duplicate);
    assert_eq!(other, CaptureOutcome::Created);

    let all = leads.list().await.unwrap();
    assert_eq!(all.len(), 2);
    // newest first
    assert_eq!(all[0].email, "manager@label.com");
    assert_eq!(all[1].email, "artist@label.com");
    assert_eq!(all[1].name.as_deref(), Some("Ari"));
    assert_eq!(all[1].source, "audit");
}

#[tokio::test]
async fn concurrent_captures_do_not_lose_writes() {
    let dir = TempDir::new().unwrap();
    let leads = Arc::new(LeadStore::new(dir.path().join("leads.json")));

    let mut handles = Vec::new();
    for i in 0..20 {
        let leads = Arc::clone(&leads);
        handles.push(tokio::spawn(async move {
            leads
                .capture(&format!("fan{i}@example.com"), None, "load")
                .await
                .unwrap()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), CaptureOutcome::Created);
    }
    assert_eq!(leads.count().await.unwrap(), 20);
}

#[tokio::test]
async fn inquiry_submit_normalizes_and_assigns_ids() {
    let dir = TempDir::new().unwrap();
    let store = InquiryStore::new(dir.path().join("inquiries.json"));

    let a = store.submit(inquiry(" Dee ", "DEE@Mail.com")).await.unwrap();
    let b = store.submit(inquiry("Dee", "dee@mail.com")).await.unwrap();

    assert!(a.id.starts_with("inq_"));
    assert_ne!(a.id, b.id, "ids stay unique within the same millisecond");
    assert_eq!(a.name, "Dee");
    assert_eq!(a.email, "dee@mail.com");
    assert_eq!(a.phone, None);
    assert_eq!(a.artist_name.as_deref(), Some("Lil Test"));
    assert_eq!(a.inquiry_type, "general");
    assert_eq!(a.message, "Need a second look at my publishing deal.");

    // Inquiries are a log, not a set: both are kept.
    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, b.id);
}
