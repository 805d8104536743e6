//! Storage layer tests for the Warble relay.

use super::db::PersonaStore;

async fn test_db() -> PersonaStore {
    PersonaStore::open_in_memory().await.unwrap()
}

// === User tests ===

#[tokio::test]
async fn upsert_creates_user_once() {
    let db = test_db().await;

    let first = db.upsert_user_by_visitor("v_abc").await.unwrap();
    let second = db.upsert_user_by_visitor("v_abc").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.visitor_id, "v_abc");
}

#[tokio::test]
async fn distinct_visitors_get_distinct_users() {
    let db = test_db().await;

    let a = db.upsert_user_by_visitor("v_a").await.unwrap();
    let b = db.upsert_user_by_visitor("v_b").await.unwrap();

    assert_ne!(a.id, b.id);
}

// === Persona tests ===

#[tokio::test]
async fn create_and_get_persona() {
    let db = test_db().await;
    let user = db.upsert_user_by_visitor("v_abc").await.unwrap();

    let persona = db
        .create_persona(
            &user.id,
            "Momo",
            Some("https://cdn.example/momo.png"),
            Some("playful"),
            Some("a stray cat"),
        )
        .await
        .unwrap();

    assert_eq!(persona.name, "Momo");
    assert_eq!(persona.user_id, user.id);
    assert_eq!(persona.avatar_url.as_deref(), Some("https://cdn.example/momo.png"));
    assert_eq!(persona.system_prompt, None);
}

#[tokio::test]
async fn optional_fields_may_be_absent() {
    let db = test_db().await;
    let user = db.upsert_user_by_visitor("v_abc").await.unwrap();

    let persona = db
        .create_persona(&user.id, "Momo", None, None, None)
        .await
        .unwrap();

    assert_eq!(persona.avatar_url, None);
    assert_eq!(persona.style_short, None);
    assert_eq!(persona.canon, None);
}

#[tokio::test]
async fn latest_persona_wins() {
    let db = test_db().await;
    let user = db.upsert_user_by_visitor("v_abc").await.unwrap();

    db.create_persona(&user.id, "First", None, None, None)
        .await
        .unwrap();
    db.create_persona(&user.id, "Second", None, None, None)
        .await
        .unwrap();

    let latest = db
        .latest_persona_for_visitor("v_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.name, "Second");
}

#[tokio::test]
async fn unknown_visitor_has_no_persona() {
    let db = test_db().await;
    assert!(
        db.latest_persona_for_visitor("v_missing")
            .await
            .unwrap()
            .is_none()
    );
}
