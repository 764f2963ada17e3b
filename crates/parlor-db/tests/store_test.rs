/// Integration tests against a real SQLite file: channel resolution,
/// message paging, author-scoped deletes, and the conversation view.

use std::fs;
use std::path::PathBuf;

use parlor_db::Database;
use uuid::Uuid;

fn open_test_db() -> (Database, PathBuf) {
    let path = std::env::temp_dir().join(format!("parlor_store_test_{}.db", Uuid::new_v4()));
    let db = Database::open(&path).expect("open test db");
    (db, path)
}

fn cleanup(db: Database, path: PathBuf) {
    drop(db);
    let _ = fs::remove_file(&path);
    let _ = fs::remove_file(path.with_extension("db-wal"));
    let _ = fs::remove_file(path.with_extension("db-shm"));
}

fn seed_user(db: &Database, username: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, username, "hash").expect("create user");
    db.create_profile(&id, username).expect("create profile");
    id
}

#[test]
fn direct_channel_resolution_is_idempotent() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");

    let first = db.find_or_create_direct_channel(&alice, &bob).unwrap();
    let second = db.find_or_create_direct_channel(&alice, &bob).unwrap();
    let swapped = db.find_or_create_direct_channel(&bob, &alice).unwrap();

    assert_eq!(first, second);
    assert_eq!(first, swapped);

    let mut members = db.channel_member_ids(&first).unwrap();
    members.sort();
    let mut expected = vec![alice.clone(), bob.clone()];
    expected.sort();
    assert_eq!(members, expected);

    cleanup(db, path);
}

#[test]
fn distinct_pairs_get_distinct_channels() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let carol = seed_user(&db, "carol");

    let ab = db.find_or_create_direct_channel(&alice, &bob).unwrap();
    let ac = db.find_or_create_direct_channel(&alice, &carol).unwrap();

    assert_ne!(ab, ac);
    assert_eq!(db.private_channels_of(&alice).unwrap().len(), 2);
    assert_eq!(db.private_channels_of(&bob).unwrap(), vec![ab]);

    cleanup(db, path);
}

#[test]
fn channels_with_more_than_two_members_never_match() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let dave = seed_user(&db, "dave");

    // Hand-build a 3-member private channel containing both alice and bob.
    let group = Uuid::new_v4().to_string();
    db.with_conn(|conn| {
        conn.execute("INSERT INTO channels (id, is_private) VALUES (?1, 1)", [&group])?;
        for uid in [&alice, &bob, &dave] {
            conn.execute(
                "INSERT INTO channel_members (channel_id, user_id) VALUES (?1, ?2)",
                (&group, uid),
            )?;
        }
        Ok(())
    })
    .unwrap();

    let resolved = db.find_or_create_direct_channel(&alice, &bob).unwrap();
    assert_ne!(resolved, group);
    assert_eq!(db.channel_member_ids(&resolved).unwrap().len(), 2);

    cleanup(db, path);
}

#[test]
fn message_page_is_ascending_and_capped() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let channel = db.find_or_create_direct_channel(&alice, &bob).unwrap();

    for i in 0..5 {
        let id = Uuid::new_v4().to_string();
        db.insert_message(&id, &channel, &alice, &format!("message {}", i))
            .unwrap();
    }

    let page = db.get_messages(&channel, 3).unwrap();
    assert_eq!(page.len(), 3);
    let bodies: Vec<&str> = page.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["message 0", "message 1", "message 2"]);

    let all = db.get_messages(&channel, 100).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all.last().unwrap().body, "message 4");

    cleanup(db, path);
}

#[test]
fn delete_is_author_scoped() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let channel = db.find_or_create_direct_channel(&alice, &bob).unwrap();

    let message_id = Uuid::new_v4().to_string();
    db.insert_message(&message_id, &channel, &alice, "hello").unwrap();

    // Non-author delete matches zero rows and leaves the list unchanged.
    let rows = db.delete_message(&message_id, &bob).unwrap();
    assert_eq!(rows, 0);
    assert_eq!(db.get_messages(&channel, 100).unwrap().len(), 1);

    // Author delete removes it.
    let rows = db.delete_message(&message_id, &alice).unwrap();
    assert_eq!(rows, 1);
    assert!(db.get_messages(&channel, 100).unwrap().is_empty());

    cleanup(db, path);
}

#[test]
fn conversations_pair_other_member_with_latest_message() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let bob = seed_user(&db, "bob");
    let carol = seed_user(&db, "carol");

    let with_bob = db.find_or_create_direct_channel(&alice, &bob).unwrap();
    let with_carol = db.find_or_create_direct_channel(&alice, &carol).unwrap();

    db.insert_message(&Uuid::new_v4().to_string(), &with_bob, &alice, "first")
        .unwrap();
    db.insert_message(&Uuid::new_v4().to_string(), &with_bob, &bob, "latest")
        .unwrap();

    let conversations = db.conversations_for(&alice).unwrap();
    assert_eq!(conversations.len(), 2);

    // Channel with activity sorts first; the empty one carries no message.
    assert_eq!(conversations[0].channel_id, with_bob);
    assert_eq!(conversations[0].other_user_id, bob);
    assert_eq!(conversations[0].last_body.as_deref(), Some("latest"));
    assert_eq!(conversations[1].channel_id, with_carol);
    assert_eq!(conversations[1].other_user_id, carol);
    assert!(conversations[1].last_body.is_none());

    // The other side sees the mirror view.
    let bob_conversations = db.conversations_for(&bob).unwrap();
    assert_eq!(bob_conversations.len(), 1);
    assert_eq!(bob_conversations[0].other_user_id, alice);

    cleanup(db, path);
}

#[test]
fn profile_batch_fetch_skips_unknown_ids() {
    let (db, path) = open_test_db();

    let alice = seed_user(&db, "alice");
    let unknown = Uuid::new_v4().to_string();

    let profiles = db
        .get_profiles_for_users(&[alice.clone(), unknown])
        .unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].user_id, alice);
    assert_eq!(profiles[0].display_name, "alice");

    assert!(db.get_profiles_for_users(&[]).unwrap().is_empty());

    cleanup(db, path);
}
