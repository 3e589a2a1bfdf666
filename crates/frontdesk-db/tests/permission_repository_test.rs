//! Integration tests for the permission repository using in-memory
//! SurrealDB.

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::models::grant::{GrantSpec, LinkMode};
use frontdesk_core::models::group::CreateGroup;
use frontdesk_core::models::permission::{CreatePermission, PermissionKey, UpdatePermission};
use frontdesk_core::store::{GroupRepository, Pagination, PermissionRepository};
use frontdesk_db::repository::{SurrealGroupRepository, SurrealPermissionRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    frontdesk_db::run_migrations(&db).await.unwrap();
    db
}

fn create(module: &str, action: &str) -> CreatePermission {
    CreatePermission {
        module: module.into(),
        action: action.into(),
        description: None,
    }
}

#[tokio::test]
async fn create_and_get_permission() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let perm = repo
        .create(CreatePermission {
            module: "bookings".into(),
            action: "read".into(),
            description: Some("Read bookings".into()),
        })
        .await
        .unwrap();

    assert_eq!(perm.module, "bookings");
    assert_eq!(perm.action, "read");
    assert_eq!(perm.description.as_deref(), Some("Read bookings"));

    let fetched = repo.get_by_id(perm.id).await.unwrap();
    assert_eq!(fetched.id, perm.id);
    assert_eq!(fetched.key(), PermissionKey::new("bookings", "read"));
}

#[tokio::test]
async fn duplicate_key_rejected() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    repo.create(create("bookings", "read")).await.unwrap();

    let result = repo.create(create("bookings", "read")).await;
    assert!(
        matches!(result, Err(FrontdeskError::Conflict { .. })),
        "duplicate (module, action) should be rejected"
    );
}

#[tokio::test]
async fn same_action_different_module_is_fine() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    repo.create(create("bookings", "read")).await.unwrap();
    repo.create(create("rooms", "read")).await.unwrap();
}

#[tokio::test]
async fn get_by_key() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let created = repo.create(create("hotels", "manage")).await.unwrap();

    let found = repo
        .get_by_key(&PermissionKey::new("hotels", "manage"))
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, created.id);

    let missing = repo
        .get_by_key(&PermissionKey::new("hotels", "delete"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn find_by_ids_and_keys() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let p1 = repo.create(create("bookings", "read")).await.unwrap();
    let p2 = repo.create(create("rooms", "read")).await.unwrap();
    repo.create(create("hotels", "read")).await.unwrap();

    let by_ids = repo.find_by_ids(&[p1.id, p2.id]).await.unwrap();
    assert_eq!(by_ids.len(), 2);

    let by_keys = repo
        .find_by_keys(&[
            PermissionKey::new("bookings", "read"),
            PermissionKey::new("audit", "read"), // absent
        ])
        .await
        .unwrap();
    assert_eq!(by_keys.len(), 1);
    assert_eq!(by_keys[0].id, p1.id);
}

#[tokio::test]
async fn update_description() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let perm = repo
        .create(CreatePermission {
            module: "reports".into(),
            action: "export".into(),
            description: Some("old".into()),
        })
        .await
        .unwrap();

    let updated = repo
        .update(
            perm.id,
            UpdatePermission {
                description: Some(Some("new".into())),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("new"));
    assert_eq!(updated.module, "reports"); // unchanged

    let cleared = repo
        .update(
            perm.id,
            UpdatePermission {
                description: Some(None),
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.description, None);
}

#[tokio::test]
async fn delete_unreferenced_permission() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    let perm = repo.create(create("audit", "read")).await.unwrap();
    repo.delete(perm.id).await.unwrap();

    let result = repo.get_by_id(perm.id).await;
    assert!(result.is_err(), "deleted permission should not be found");
}

#[tokio::test]
async fn referenced_permission_cannot_be_deleted() {
    let db = setup().await;
    let perm_repo = SurrealPermissionRepository::new(db.clone());
    let group_repo = SurrealGroupRepository::new(db);

    let perm = perm_repo.create(create("bookings", "read")).await.unwrap();
    let group = group_repo
        .create(CreateGroup {
            name: "Reception".into(),
            description: None,
            is_active: true,
        })
        .await
        .unwrap();
    group_repo
        .link_permissions(group.id, &[GrantSpec::allow(perm.id)], LinkMode::Add)
        .await
        .unwrap();

    let result = perm_repo.delete(perm.id).await;
    assert!(matches!(result, Err(FrontdeskError::Conflict { .. })));

    // The guard must have removed nothing.
    let kept = perm_repo.get_by_id(perm.id).await;
    assert!(kept.is_ok());

    let usage = perm_repo.usage_count(perm.id).await.unwrap();
    assert_eq!(usage.group_links, 1);
    assert_eq!(usage.user_links, 0);
}

#[tokio::test]
async fn create_many_skips_existing_keys() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    repo.create(create("bookings", "read")).await.unwrap();

    let created = repo
        .create_many(vec![
            create("bookings", "read"), // exists
            create("bookings", "create"),
            create("bookings", "update"),
        ])
        .await
        .unwrap();

    assert_eq!(created, 2, "existing key must be skipped, not an error");

    let all = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(all.total, 3);
}

#[tokio::test]
async fn list_with_pagination() {
    let db = setup().await;
    let repo = SurrealPermissionRepository::new(db);

    for action in ["create", "read", "update", "delete", "manage"] {
        repo.create(create("hotels", action)).await.unwrap();
    }

    let page1 = repo
        .list(Pagination {
            offset: 0,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 3);
    assert_eq!(page1.total, 5);

    let page2 = repo
        .list(Pagination {
            offset: 3,
            limit: 3,
        })
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
}
