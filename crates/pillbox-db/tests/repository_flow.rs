//! End-to-end repository flows against a file database with several
//! connections, so requests really run concurrently.

use pillbox_core::{DosageForm, MedicationColor, MedicationRecord, StockLevel};
use pillbox_db::{Database, DbConfig, InsertOutcome, RepositoryError};
use tempfile::TempDir;

async fn open() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("pillbox.db"))
        .max_connections(4)
        .medication_workers(4)
        .record_workers(2);
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

fn medication(name: &str, remaining: u32) -> MedicationRecord {
    let mut record = MedicationRecord::new(name, MedicationColor::Blue, DosageForm::Capsule);
    record.total_quantity = 10;
    record.remaining_quantity = remaining;
    record
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_name_is_reported_then_overridden() {
    let (_dir, db) = open().await;
    let repo = db.medications();

    let first = repo.insert(medication("Lisinopril", 10), false).await;
    assert!(first.is_success());

    let second = repo.insert(medication("  Lisinopril ", 10), false).await;
    assert!(matches!(second, InsertOutcome::DuplicateFound(ref name) if name == "Lisinopril"));
    assert_eq!(repo.count().next().await, Some(1));

    let forced = repo.insert(medication("Lisinopril", 10), true).await;
    assert!(forced.is_success());
    assert_ne!(forced.id(), first.id());
    assert_eq!(repo.count().next().await, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalid_color_never_reaches_store() {
    let (_dir, db) = open().await;
    let repo = db.medications();

    let mut record = medication("Lisinopril", 10);
    record.color = "blue".to_string();

    let InsertOutcome::Error(err) = repo.insert(record, false).await else {
        panic!("lower-case tag must be rejected");
    };
    assert!(matches!(err, RepositoryError::Validation(_)));
    assert_eq!(repo.count().next().await, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_inserts_all_resolve() {
    let (_dir, db) = open().await;
    let repo = db.medications();

    let a = repo.insert(medication("Warfarin", 10), false);
    let b = repo.insert(medication("Warfarin", 10), false);
    let (a, b) = tokio::join!(a, b);

    let successes = [&a, &b].iter().filter(|o| o.is_success()).count();
    for outcome in [&a, &b] {
        assert!(matches!(
            outcome,
            InsertOutcome::Success(_) | InsertOutcome::DuplicateFound(_)
        ));
    }

    // The name check is best-effort: one or both may win
    let stored = repo.count().next().await.unwrap();
    assert!((1..=2).contains(&stored));
    assert_eq!(stored as usize, successes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn updating_a_missing_row_is_not_found() {
    let (_dir, db) = open().await;

    let mut ghost = medication("Ghost", 1);
    ghost.id = 4_242;
    let err = db.medications().update(ghost).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "medication not found: 4242");
    assert_eq!(db.medications().count().next().await, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn live_list_refreshes_after_each_write() {
    let (_dir, db) = open().await;
    let repo = db.medications();
    let mut blue = repo.by_color(MedicationColor::Blue);
    let mut refill = repo.needing_refill(30);

    assert_eq!(blue.next().await, Some(vec![]));
    assert_eq!(refill.next().await, Some(vec![]));

    let full = repo.insert(medication("Full", 10), false).await.id().unwrap();
    let low = repo.insert(medication("Low", 2), false).await.id().unwrap();

    let list = blue.wait_for(|list| list.len() == 2).await.unwrap();
    assert_eq!(list[0].id, low);
    assert_eq!(list[1].id, full);

    let list = refill.wait_for(|list| !list.is_empty()).await.unwrap();
    assert_eq!(list.iter().map(|m| m.id).collect::<Vec<_>>(), vec![low]);

    repo.restock(low, 10).await.unwrap();
    assert_eq!(refill.wait_for(|list| list.is_empty()).await, Some(vec![]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn doses_run_down_to_out_of_stock() {
    let (_dir, db) = open().await;
    let repo = db.medications();

    let mut record = medication("Prednisone", 10);
    record.dosage_per_intake = 3;
    let id = repo.insert(record, false).await.id().unwrap();
    let mut out = repo.out_of_stock();
    let mut history = db.intake_records().count_by_medication_name("Prednisone");

    let mut levels = Vec::new();
    for _ in 0..4 {
        let dose = repo.take_dose(id).await.unwrap();
        levels.push((dose.remaining, dose.stock_level));
    }
    assert_eq!(
        levels,
        vec![
            (7, StockLevel::Sufficient),
            (4, StockLevel::Low),
            (1, StockLevel::Low),
            (0, StockLevel::OutOfStock),
        ]
    );

    assert!(matches!(
        repo.take_dose(id).await,
        Err(RepositoryError::OutOfStock { .. })
    ));
    assert_eq!(out.wait_for(|list| list.len() == 1).await.unwrap()[0].id, id);
    assert_eq!(history.wait_for(|n| *n == 4).await, Some(4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_doses_never_oversell() {
    let (_dir, db) = open().await;
    let repo = db.medications();
    let id = repo.insert(medication("Ibuprofen", 5), false).await.id().unwrap();

    let tickets: Vec<_> = (0..8).map(|_| repo.take_dose(id)).collect();
    let mut taken = 0;
    let mut refused = 0;
    for ticket in tickets {
        match ticket.await {
            Ok(_) => taken += 1,
            Err(RepositoryError::OutOfStock { .. }) => refused += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!((taken, refused), (5, 3));
    assert_eq!(
        db.intake_records().count_by_medication_name("Ibuprofen").next().await,
        Some(5)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleanup_is_terminal() {
    let (_dir, db) = open().await;
    let repo = db.medications();
    let id = repo.insert(medication("Atorvastatin", 10), false).await.id().unwrap();

    repo.cleanup();

    assert!(matches!(
        repo.insert(medication("Later", 1), false).await,
        InsertOutcome::Error(RepositoryError::ShutDown)
    ));
    assert!(matches!(repo.take_dose(id).await, Err(RepositoryError::ShutDown)));
    // Other entity types keep their own workers
    assert!(db.intake_records().get(1).await.is_ok());
    // Reads are not routed through the workers
    assert!(repo.exists_by_name("Atorvastatin").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn diary_belongs_to_its_user() {
    let (_dir, db) = open().await;
    let alice = db.users().create("alice", None).await.unwrap();
    let bob = db.users().create("bob", None).await.unwrap();
    let diary = db.health_diary();

    let entry_id = diary.add(alice, "Headache in the evening").await.unwrap();
    let mut entry = diary.get(entry_id).await.unwrap().unwrap();
    entry.content = "Not mine".to_string();

    let err = diary.update(bob, entry).await.unwrap_err();
    assert_eq!(err.to_string(), format!("user {bob} may not modify diary entry {entry_id}"));

    let mut alice_entries = diary.by_user(alice);
    assert_eq!(alice_entries.next().await.map(|list| list.len()), Some(1));

    db.users().delete(alice).await.unwrap();
    assert_eq!(alice_entries.wait_for(|list| list.is_empty()).await, Some(vec![]));
    assert!(diary.get(entry_id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn profile_update_validates_and_refreshes_timestamp() {
    let (_dir, db) = open().await;
    let users = db.users();
    let id = users.create("grandma", Some("Li Hua".to_string())).await.unwrap();
    let created = users.get(id).await.unwrap().unwrap();

    let mut profile = created.clone();
    profile.email = Some(" grandma@example.com ".to_string());
    profile.phone = Some("+86 138 0013 8000".to_string());
    profile.gender = Some("FEMALE".to_string());
    profile.birth_date = Some("1948-02-29".to_string());
    profile.emergency_contact_name = Some("Li Wei".to_string());
    profile.emergency_contact_phone = Some("555-0100".to_string());
    profile.blood_type = Some("ab+".to_string());
    profile.allergies = Some("Penicillin".to_string());
    profile.medical_conditions = Some("Hypertension".to_string());
    profile.doctor_name = Some("Dr. Chen".to_string());
    profile.doctor_phone = Some("555-0199".to_string());
    profile.hospital_name = Some("City General".to_string());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    users.update_profile(profile).await.unwrap();

    let stored = users.get(id).await.unwrap().unwrap();
    assert_eq!(stored.username, "grandma");
    assert_eq!(stored.email.as_deref(), Some("grandma@example.com"));
    assert_eq!(stored.blood_type.as_deref(), Some("AB+"));
    assert_eq!(stored.hospital_name.as_deref(), Some("City General"));
    assert_eq!(stored.created_at, created.created_at);
    assert!(stored.updated_at > created.updated_at);

    let mut bad = stored.clone();
    bad.email = Some("not-an-email".to_string());
    let err = users.update_profile(bad).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Validation(_)));
    assert_eq!(users.get(id).await.unwrap().unwrap(), stored);

    let mut ghost = stored;
    ghost.id = id + 100;
    let err = users.update_profile(ghost).await.unwrap_err();
    assert_eq!(err.to_string(), format!("user not found: {}", id + 100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reopening_keeps_data_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pillbox.db");

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    db.medications().insert(medication("Keep me", 3), false).await.id().unwrap();
    db.close().await;

    let db = Database::new(DbConfig::new(&path)).await.unwrap();
    assert_eq!(db.migration_status().await.unwrap(), (3, 3));
    assert!(db.medications().exists_by_name("Keep me").await);
}
