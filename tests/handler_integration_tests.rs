mod common;

use axum::http::StatusCode;
use blog_api::models::PostChanges;
use blog_api::repository::Repository;
use blog_api::storage::StorageService;
use common::spawn_app;
use serde_json::json;

// --- Posts: ownership ---

#[tokio::test]
async fn test_only_author_or_admin_may_update_post() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({ "title": "Mine", "content": "x", "published": true }))
        .await;
    let uri = format!("/api/posts/{}", post["id"]);

    let (status, body) = app
        .put(&uri, Some(&bob.access_token), json!({ "title": "Stolen" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app
        .put(&uri, Some(&alice.access_token), json!({ "title": "Still mine" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Still mine");

    let (status, body) = app
        .put(&uri, Some(&admin.access_token), json!({ "content": "moderated" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "moderated");
    assert_eq!(body["title"], "Still mine");
    // Author never changes on update
    assert_eq!(body["authorId"], json!(alice.id));
}

#[tokio::test]
async fn test_admin_may_delete_any_post() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let post = app
        .create_post(&alice, json!({ "title": "t", "content": "c" }))
        .await;

    let (status, _) = app
        .delete(&format!("/api/posts/{}", post["id"]), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_missing_post_is_404() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let (status, _) = app.get("/api/posts/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .put("/api/posts/999", Some(&alice.access_token), json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("/api/posts/999", Some(&alice.access_token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_post_id_is_validation_error() {
    let app = spawn_app();
    let (status, body) = app.get("/api/posts/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_post_validates_fields_and_references() {
    let app = spawn_app();
    let alice = app.user("alice").await;

    let (status, body) = app
        .post(
            "/api/posts",
            Some(&alice.access_token),
            json!({ "title": "   ", "content": "c" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .post(
            "/api/posts",
            Some(&alice.access_token),
            json!({ "title": "t", "content": "c", "imageUrl": "ftp://files/x.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/posts",
            Some(&alice.access_token),
            json!({ "title": "t", "content": "c", "categoryId": 42 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_post_create_trims_title() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let post = app
        .create_post(&alice, json!({ "title": "  Hello  ", "content": "World" }))
        .await;
    assert_eq!(post["title"], "Hello");
}

#[tokio::test]
async fn test_replacing_image_removes_previous_upload() {
    let app = spawn_app();
    let alice = app.user("alice").await;

    let old_url = StorageService::put_object(
        &app.storage,
        &format!("images/{}/old.png", alice.id),
        vec![1, 2, 3],
        "image/png",
    )
    .await
    .unwrap();
    let post = app
        .create_post(
            &alice,
            json!({ "title": "t", "content": "c", "imageUrl": old_url }),
        )
        .await;
    assert_eq!(app.storage.object_count().await, 1);

    let (status, updated) = app
        .put(
            &format!("/api/posts/{}", post["id"]),
            Some(&alice.access_token),
            json!({ "imageUrl": "https://cdn.example.com/new.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["imageUrl"], "https://cdn.example.com/new.png");
    assert_eq!(app.storage.object_count().await, 0);
}

#[tokio::test]
async fn test_post_cleanup_keeps_images_uploaded_by_others() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;

    let alice_url = StorageService::put_object(
        &app.storage,
        &format!("images/{}/cat.png", alice.id),
        vec![1, 2, 3],
        "image/png",
    )
    .await
    .unwrap();

    // Bob may reference the public URL, but dropping it must not delete it.
    let replaced = app
        .create_post(&bob, json!({ "title": "t", "content": "c", "imageUrl": alice_url }))
        .await;
    let (status, _) = app
        .put(
            &format!("/api/posts/{}", replaced["id"]),
            Some(&bob.access_token),
            json!({ "imageUrl": "https://cdn.example.com/other.png" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.storage.get(&alice_url).await.is_some());

    let deleted = app
        .create_post(&bob, json!({ "title": "t", "content": "c", "imageUrl": alice_url }))
        .await;
    let (status, _) = app
        .delete(&format!("/api/posts/{}", deleted["id"]), Some(&bob.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.get(&alice_url).await.is_some());

    // Path tricks do not escape the author's prefix either.
    let sneaky = format!(
        "http://localhost:9000/mock-bucket/images/{}/../{}/cat.png",
        bob.id, alice.id
    );
    let tricked = app
        .create_post(&bob, json!({ "title": "t", "content": "c", "imageUrl": sneaky }))
        .await;
    app.delete(&format!("/api/posts/{}", tricked["id"]), Some(&bob.access_token))
        .await;
    assert!(app.storage.get(&alice_url).await.is_some());
}

#[tokio::test]
async fn test_admin_post_delete_removes_author_upload() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;

    let url = StorageService::put_object(
        &app.storage,
        &format!("images/{}/mine.png", alice.id),
        vec![1, 2, 3],
        "image/png",
    )
    .await
    .unwrap();
    let post = app
        .create_post(&alice, json!({ "title": "t", "content": "c", "imageUrl": url }))
        .await;

    let (status, _) = app
        .delete(&format!("/api/posts/{}", post["id"]), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.get(&url).await.is_none());
}

#[tokio::test]
async fn test_update_null_clears_category_and_image() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let category = app.create_category(&admin, "Rust").await;

    let url = StorageService::put_object(
        &app.storage,
        &format!("images/{}/cover.png", alice.id),
        vec![1, 2, 3],
        "image/png",
    )
    .await
    .unwrap();
    let post = app
        .create_post(
            &alice,
            json!({ "title": "t", "content": "c", "categoryId": category["id"], "imageUrl": url }),
        )
        .await;
    let uri = format!("/api/posts/{}", post["id"]);

    // Absent fields are kept
    let (status, kept) = app
        .put(&uri, Some(&alice.access_token), json!({ "title": "renamed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["categoryId"], category["id"]);
    assert_eq!(kept["imageUrl"], url.as_str());

    let (status, cleared) = app
        .put(
            &uri,
            Some(&alice.access_token),
            json!({ "categoryId": null, "imageUrl": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["categoryId"].is_null());
    assert!(cleared["imageUrl"].is_null());
    assert!(app.storage.get(&url).await.is_none());
}

// --- Comments ---

#[tokio::test]
async fn test_comment_lifecycle_and_ownership() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({ "title": "t", "content": "c", "published": true }))
        .await;
    let comments_uri = format!("/api/posts/{}/comments", post["id"]);

    let (status, first) = app
        .post(&comments_uri, Some(&bob.access_token), json!({ "content": "first!" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["authorId"], json!(bob.id));
    assert_eq!(first["postId"], post["id"]);

    let (status, second) = app
        .post(&comments_uri, Some(&alice.access_token), json!({ "content": "thanks" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, listed) = app.get(&comments_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first!", "thanks"]);

    // Post author does not own bob's comment
    let (status, _) = app
        .delete(&format!("/api/comments/{}", first["id"]), Some(&alice.access_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/comments/{}", first["id"]), Some(&bob.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .delete(&format!("/api/comments/{}", second["id"]), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .delete(&format!("/api/comments/{}", second["id"]), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_on_hidden_draft_are_404() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let draft = app
        .create_post(&alice, json!({ "title": "t", "content": "c" }))
        .await;
    let uri = format!("/api/posts/{}/comments", draft["id"]);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(&uri, Some(&bob.access_token), json!({ "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(&uri, Some(&alice.access_token), json!({ "content": "note to self" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_deleting_post_removes_its_comments() {
    let app = spawn_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app
        .create_post(&alice, json!({ "title": "t", "content": "c", "published": true }))
        .await;
    let post_id = post["id"].as_i64().unwrap();
    let comments_uri = format!("/api/posts/{post_id}/comments");

    let mut comment_ids = Vec::new();
    for (user, text) in [(&alice, "one"), (&bob, "two"), (&bob, "three")] {
        let (status, comment) = app
            .post(&comments_uri, Some(&user.access_token), json!({ "content": text }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        comment_ids.push(comment["id"].as_i64().unwrap());
    }

    let (status, _) = app
        .delete(&format!("/api/posts/{post_id}"), Some(&alice.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(app.repo.list_comments(post_id).await.unwrap().is_empty());
    for id in comment_ids {
        assert!(app.repo.get_comment(id).await.unwrap().is_none());
    }
}

// --- Categories ---

#[tokio::test]
async fn test_category_mutations_require_admin() {
    let app = spawn_app();
    let alice = app.user("alice").await;

    let (status, body) = app
        .post("/api/categories", Some(&alice.access_token), json!({ "name": "Rust" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app
        .post("/api/categories", None, json!({ "name": "Rust" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .delete("/api/categories/1", Some(&alice.access_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_category_names_conflict_ignoring_case() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    app.create_category(&admin, "Rust").await;

    for name in ["Rust", "rust", "RUST", "  rust  "] {
        let (status, body) = app
            .post("/api/categories", Some(&admin.access_token), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{name}");
        assert_eq!(body["code"], "CONFLICT");
    }

    let (_, listed) = app.get("/api/categories", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_category_update_rechecks_name() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let rust = app.create_category(&admin, "Rust").await;
    app.create_category(&admin, "Go").await;
    let uri = format!("/api/categories/{}", rust["id"]);

    let (status, _) = app
        .put(&uri, Some(&admin.access_token), json!({ "name": "go" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renaming to itself with a different case is allowed
    let (status, body) = app
        .put(
            &uri,
            Some(&admin.access_token),
            json!({ "name": "RUST", "description": "Systems" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "RUST");
    assert_eq!(body["description"], "Systems");

    let (status, body) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "RUST");

    let (status, _) = app
        .put("/api/categories/999", Some(&admin.access_token), json!({ "name": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_category_detaches_posts() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let category = app.create_category(&admin, "Rust").await;
    let post = app
        .create_post(
            &alice,
            json!({ "title": "t", "content": "c", "categoryId": category["id"], "published": true }),
        )
        .await;

    let (status, _) = app
        .delete(&format!("/api/categories/{}", category["id"]), Some(&admin.access_token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/posts/{}", post["id"]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["categoryId"].is_null());

    let (status, _) = app
        .get(&format!("/api/categories/{}", category["id"]), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filter_posts_by_category() {
    let app = spawn_app();
    let admin = app.admin("root").await;
    let alice = app.user("alice").await;
    let rust = app.create_category(&admin, "Rust").await;
    app.create_post(
        &alice,
        json!({ "title": "in", "content": "c", "categoryId": rust["id"], "published": true }),
    )
    .await;
    let other = app
        .create_post(&alice, json!({ "title": "out", "content": "c", "published": true }))
        .await;

    let (_, listed) = app
        .get(&format!("/api/posts?categoryId={}", rust["id"]), None)
        .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["title"], "in");

    // Repository-level partial update leaves untouched fields alone
    let updated = app
        .repo
        .update_post(
            other["id"].as_i64().unwrap(),
            PostChanges {
                published: Some(false),
                ..PostChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "out");
    assert!(!updated.published);
}
