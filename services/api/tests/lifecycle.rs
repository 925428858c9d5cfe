mod support;

use std::sync::atomic::Ordering;

use api::{
    access::RequesterContext,
    error::ApiError,
    lifecycle::{BUSINESS_CARD_PROJECT_NAME, UploadRequest},
    validation::UploadRole,
};
use common::{
    blob::BlobStore,
    models::{AssetType, CardSlot, ProjectUpdate, User, UserRole},
    store::MetadataStore,
};
use serde_json::json;
use support::Harness;
use uuid::Uuid;

fn png(role: Option<UploadRole>, name: &str) -> UploadRequest {
    UploadRequest {
        bytes: vec![0x89, b'P', b'N', b'G', 1, 2, 3],
        mime: "image/png".to_string(),
        filename: name.to_string(),
        role,
    }
}

fn mp4(name: &str) -> UploadRequest {
    UploadRequest {
        bytes: vec![0, 0, 0, 0x18, b'f', b't', b'y', b'p'],
        mime: "video/mp4".to_string(),
        filename: name.to_string(),
        role: Some(UploadRole::Final),
    }
}

fn ctx(user: &User) -> RequesterContext {
    RequesterContext::for_user(user)
}

#[tokio::test]
async fn test_business_card_wizard_end_to_end() {
    let h = Harness::new();
    let lifecycle = &h.state.lifecycle;
    let owner = h.user("jane@example.com", UserRole::User).await;

    let project = lifecycle.start_business_card(&owner).await.unwrap();
    assert_eq!(project.name, BUSINESS_CARD_PROJECT_NAME);

    let logo = lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "my logo.png"))
        .await
        .unwrap();
    assert_eq!(logo.next_step, Some(UploadRole::Card));
    assert!(logo.warning.is_none());
    assert!(logo.typed_asset_id.is_some());
    assert!(logo.asset.storage_path.ends_with(&format!("/assets/logo/{}-my_logo.png", logo.asset.id)));

    // The logo becomes the thumbnail of a project without one
    let reloaded = h.store.get_project(project.id).await.unwrap().unwrap();
    assert_eq!(reloaded.thumbnail.as_deref(), Some(logo.asset.url.as_str()));

    let card = lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap();
    assert_eq!(card.next_step, Some(UploadRole::Final));

    let video = lifecycle
        .upload_asset(project.id, &ctx(&owner), mp4("intro.mp4"))
        .await
        .unwrap();
    assert_eq!(video.asset.asset_type, AssetType::Video);
    assert_eq!(video.next_step, None);

    let card_set = h.store.get_card_set(owner.id, project.id).await.unwrap().unwrap();
    assert_eq!(card_set.code, "User001");
    assert_eq!(card_set.slot(CardSlot::Logo), Some(logo.asset.id));
    assert_eq!(card_set.slot(CardSlot::CardImage), Some(card.asset.id));
    assert_eq!(card_set.slot(CardSlot::Video), Some(video.asset.id));

    assert!(!lifecycle.ar_view_exists(project.id).await.unwrap());
    let artifact = lifecycle
        .generate_ar_view(project.id, &ctx(&owner))
        .await
        .unwrap();
    assert_eq!(artifact.key, format!("ar-projects/{}/index.html", project.id));
    assert!(lifecycle.ar_view_exists(project.id).await.unwrap());

    let html = String::from_utf8(h.blobs.get(&artifact.key).await.unwrap()).unwrap();
    assert!(html.contains(&card.asset.url));
    assert!(html.contains(&video.asset.url));
}

#[tokio::test]
async fn test_storage_failure_writes_no_rows() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    h.blobs.fail_put.store(true, Ordering::SeqCst);
    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "StorageError");
    assert_eq!(h.store.asset_count(), 0);
    assert_eq!(h.store.card_set_count(), 0);
    assert!(h.blobs.keys().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_removes_blob_and_row() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    // Generic row fails: only the blob needs removing
    h.store.fail_insert_asset.store(true, Ordering::SeqCst);
    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Persistence(_)));
    assert!(h.blobs.keys().is_empty());
    h.store.fail_insert_asset.store(false, Ordering::SeqCst);

    // Mirror fails after the generic row was written: both are removed
    h.store.fail_typed_insert.store(true, Ordering::SeqCst);
    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), mp4("intro.mp4"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "PersistenceError");
    assert_eq!(h.store.asset_count(), 0);
    assert_eq!(h.store.typed_count(), 0);
    assert_eq!(h.store.card_set_count(), 0);
    assert!(h.blobs.keys().is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_leaves_only_the_orphan_blob() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    h.store.fail_typed_insert.store(true, Ordering::SeqCst);
    h.blobs.fail_delete.store(true, Ordering::SeqCst);

    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(None, "texture.png"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PersistenceError");
    assert_eq!(h.store.asset_count(), 0);
    assert_eq!(h.blobs.keys().len(), 1);
}

#[tokio::test]
async fn test_validation_and_authorisation_precede_side_effects() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let stranger = h.user("mallory@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&stranger), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    let gif = UploadRequest {
        bytes: b"GIF89a".to_vec(),
        mime: "image/gif".to_string(),
        filename: "logo.gif".to_string(),
        role: Some(UploadRole::Logo),
    };
    let err = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), gif)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");

    let err = h
        .state
        .lifecycle
        .upload_asset(Uuid::new_v4(), &ctx(&owner), png(None, "a.png"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");

    assert!(h.blobs.keys().is_empty());
    assert_eq!(h.store.asset_count(), 0);
}

#[tokio::test]
async fn test_admin_upload_is_recorded_for_the_owner() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let admin = h.user("admin@example.com", UserRole::Admin).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    let outcome = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&admin), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap();

    assert_eq!(outcome.asset.user_id, owner.id);
    assert!(outcome.asset.storage_path.starts_with(&owner.id.to_string()));
    let card_set = h.store.get_card_set(owner.id, project.id).await.unwrap();
    assert_eq!(card_set.unwrap().card_image_asset_id, Some(outcome.asset.id));
}

#[tokio::test]
async fn test_card_set_failure_is_a_warning() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    h.store.fail_card_set.store(true, Ordering::SeqCst);
    let outcome = h
        .state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap();

    assert!(outcome.warning.is_some());
    assert_eq!(h.store.asset_count(), 1);
    assert_eq!(h.store.card_set_count(), 0);
}

#[tokio::test]
async fn test_slots_follow_the_latest_upload_and_codes_stay_fixed() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let first = h.state.lifecycle.start_business_card(&owner).await.unwrap();
    let second = h.state.lifecycle.start_business_card(&owner).await.unwrap();
    let lifecycle = &h.state.lifecycle;

    let card_a = lifecycle
        .upload_asset(first.id, &ctx(&owner), png(Some(UploadRole::Card), "a.png"))
        .await
        .unwrap();
    let code = h
        .store
        .get_card_set(owner.id, first.id)
        .await
        .unwrap()
        .unwrap()
        .code;

    let card_b = lifecycle
        .upload_asset(first.id, &ctx(&owner), png(Some(UploadRole::Card), "b.png"))
        .await
        .unwrap();
    // Role-less uploads never touch the card set
    lifecycle
        .upload_asset(first.id, &ctx(&owner), png(None, "c.png"))
        .await
        .unwrap();

    let card_set = h.store.get_card_set(owner.id, first.id).await.unwrap().unwrap();
    assert_ne!(card_a.asset.id, card_b.asset.id);
    assert_eq!(card_set.card_image_asset_id, Some(card_b.asset.id));
    assert_eq!(card_set.code, code);

    lifecycle
        .upload_asset(second.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap();
    let other = h.store.get_card_set(owner.id, second.id).await.unwrap().unwrap();
    assert_eq!(code, "User001");
    assert_eq!(other.code, "User002");
}

#[tokio::test]
async fn test_generate_requires_card_and_video() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();

    h.state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap();

    let err = h
        .state
        .lifecycle
        .generate_ar_view(project.id, &ctx(&owner))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");
    assert!(!h.state.lifecycle.ar_view_exists(project.id).await.unwrap());
}

#[tokio::test]
async fn test_logo_never_stands_in_for_the_card_image() {
    let h = Harness::new();
    let lifecycle = &h.state.lifecycle;
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = lifecycle.start_business_card(&owner).await.unwrap();

    lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap();
    lifecycle
        .upload_asset(project.id, &ctx(&owner), mp4("intro.mp4"))
        .await
        .unwrap();

    let err = lifecycle
        .generate_ar_view(project.id, &ctx(&owner))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");
    assert!(!lifecycle.ar_view_exists(project.id).await.unwrap());
}

#[tokio::test]
async fn test_card_upload_without_slot_still_feeds_the_ar_view() {
    let h = Harness::new();
    let lifecycle = &h.state.lifecycle;
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = lifecycle.start_business_card(&owner).await.unwrap();

    lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap();
    h.store.fail_card_set.store(true, Ordering::SeqCst);
    let card = lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Card), "card.png"))
        .await
        .unwrap();
    assert!(card.warning.is_some());
    h.store.fail_card_set.store(false, Ordering::SeqCst);
    lifecycle
        .upload_asset(project.id, &ctx(&owner), mp4("intro.mp4"))
        .await
        .unwrap();

    let (card_url, _) = lifecycle.ar_sources(&project).await.unwrap();
    assert_eq!(card_url, card.asset.url);
}

#[tokio::test]
async fn test_delete_project_cascades() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let stranger = h.user("mallory@example.com", UserRole::User).await;
    let lifecycle = &h.state.lifecycle;
    let project = lifecycle.start_business_card(&owner).await.unwrap();
    let keep = lifecycle
        .create_project(&owner, "Keep me", None, None)
        .await
        .unwrap();

    for upload in [
        png(Some(UploadRole::Logo), "logo.png"),
        png(Some(UploadRole::Card), "card.png"),
        mp4("intro.mp4"),
    ] {
        lifecycle
            .upload_asset(project.id, &ctx(&owner), upload)
            .await
            .unwrap();
    }
    lifecycle
        .upload_asset(keep.id, &ctx(&owner), png(None, "other.png"))
        .await
        .unwrap();
    lifecycle
        .generate_ar_view(project.id, &ctx(&owner))
        .await
        .unwrap();

    let err = lifecycle
        .delete_project(project.id, &ctx(&stranger))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    lifecycle
        .delete_project(project.id, &ctx(&owner))
        .await
        .unwrap();

    assert!(h.store.get_project(project.id).await.unwrap().is_none());
    assert!(h.store.get_card_set(owner.id, project.id).await.unwrap().is_none());
    assert!(h.store.all_assets().iter().all(|a| a.project_id == Some(keep.id)));
    assert_eq!(h.store.asset_count(), 1);
    assert_eq!(h.store.typed_count(), 1);

    let project_id = project.id.to_string();
    assert!(h.blobs.keys().iter().all(|k| !k.contains(&project_id)));
    assert_eq!(h.blobs.keys().len(), 1);
}

#[tokio::test]
async fn test_delete_project_continues_past_blob_failures() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();
    h.state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap();

    h.blobs.fail_delete.store(true, Ordering::SeqCst);
    h.state
        .lifecycle
        .delete_project(project.id, &ctx(&owner))
        .await
        .unwrap();

    assert!(h.store.get_project(project.id).await.unwrap().is_none());
    assert_eq!(h.store.asset_count(), 0);
}

#[tokio::test]
async fn test_update_project_round_trips_scene_data() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let stranger = h.user("mallory@example.com", UserRole::User).await;
    let project = h
        .state
        .lifecycle
        .create_project(&owner, "Scene", None, None)
        .await
        .unwrap();

    let scene = json!({"objects": [{"id": 1, "position": [0.5, 1.0, -2.0]}], "camera": null});
    let update = ProjectUpdate {
        scene_data: Some(scene.clone()),
        is_public: Some(true),
        ..Default::default()
    };

    let err = h
        .state
        .lifecycle
        .update_project(project.id, &ctx(&stranger), update.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    let updated = h
        .state
        .lifecycle
        .update_project(project.id, &ctx(&owner), update)
        .await
        .unwrap();
    assert_eq!(updated.scene_data, scene);
    assert!(updated.is_public);
    assert_eq!(updated.owner_user_id, owner.id);
    assert_eq!(updated.created_at, project.created_at);

    let reloaded = h.store.get_project(project.id).await.unwrap().unwrap();
    assert_eq!(reloaded.scene_data, scene);

    let err = h
        .state
        .lifecycle
        .update_project(
            project.id,
            &ctx(&owner),
            ProjectUpdate {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ValidationError");
}

#[tokio::test]
async fn test_admin_delete_user_removes_their_blobs() {
    let h = Harness::new();
    let owner = h.user("jane@example.com", UserRole::User).await;
    let admin = h.user("admin@example.com", UserRole::Admin).await;
    let project = h.state.lifecycle.start_business_card(&owner).await.unwrap();
    h.state
        .lifecycle
        .upload_asset(project.id, &ctx(&owner), png(Some(UploadRole::Logo), "logo.png"))
        .await
        .unwrap();

    let err = h
        .state
        .lifecycle
        .delete_user(owner.id, &ctx(&owner))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    h.state
        .lifecycle
        .delete_user(owner.id, &ctx(&admin))
        .await
        .unwrap();

    assert!(h.store.find_user_by_id(owner.id).await.unwrap().is_none());
    assert!(h.blobs.keys().is_empty());
    assert_eq!(h.store.asset_count(), 0);
}

#[tokio::test]
async fn test_template_owner_override_is_admin_only() {
    let h = Harness::new();
    let lifecycle = &h.state.lifecycle;
    let owner = h.user("jane@example.com", UserRole::User).await;
    let other = h.user("mallory@example.com", UserRole::User).await;
    let admin = h.user("admin@example.com", UserRole::Admin).await;

    let project = lifecycle
        .create_from_template(&admin, "template-4", Some(owner.id))
        .await
        .unwrap();
    assert_eq!(project.owner_user_id, owner.id);
    assert_eq!(project.name, "AR Business Card Design");

    let project = lifecycle
        .create_from_template(&other, "template-1", Some(owner.id))
        .await
        .unwrap();
    assert_eq!(project.owner_user_id, other.id);

    let err = lifecycle
        .create_from_template(&admin, "template-1", Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}
