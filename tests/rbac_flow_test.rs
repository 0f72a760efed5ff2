//! # RBAC 授权与缓存失效集成测试

mod common;

use pretty_assertions::assert_eq;

use api_rbac::app::AppContext;
use api_rbac::auth::Decision;
use api_rbac::error::RbacError;
use api_rbac::store::{NewMenu, NewRole};

fn menu(name: &str, parent_id: Option<i32>, order: i32) -> NewMenu {
    NewMenu {
        parent_id,
        name: name.to_string(),
        path: Some(format!("/{name}")),
        component: None,
        menu_type: 1,
        icon: None,
        sort_order: order,
        hidden: false,
    }
}

async fn role_permission_change_cascades(ctx: &AppContext) {
    let session = common::register(ctx, "user@example.com", "user").await;
    let identity = ctx
        .sessions
        .authenticate(&session.tokens.access_token)
        .unwrap();
    let role_id = common::grant(ctx, identity.id, "editor", &["a", "b"]).await;

    let check = |key: &'static str| {
        let identity = identity.clone();
        async move { ctx.gate.check(Some(&identity), key).await.unwrap() }
    };

    assert_eq!(check("a").await, Decision::Allowed);
    assert_eq!(check("b").await, Decision::Allowed);
    assert_eq!(check("c").await, Decision::Denied);

    ctx.rbac
        .set_role_permissions(role_id, &["a".to_string()])
        .await
        .unwrap();
    assert_eq!(check("a").await, Decision::Allowed);
    assert_eq!(check("b").await, Decision::Denied);

    ctx.rbac.delete_role(role_id).await.unwrap();
    assert_eq!(check("a").await, Decision::Denied);
}

async fn user_role_change_only_touches_that_user(ctx: &AppContext) {
    let first = common::register(ctx, "one@example.com", "one").await.user.id;
    let second = common::register(ctx, "two@example.com", "two").await.user.id;
    common::grant(ctx, first, "viewer", &["menus:list"]).await;
    common::grant(ctx, second, "auditor", &["roles:list"]).await;

    ctx.cache.get(first).await.unwrap();
    ctx.cache.get(second).await.unwrap();

    ctx.rbac.set_user_roles(first, &[]).await.unwrap();
    assert!(!ctx.cache.is_cached(first));
    assert!(ctx.cache.is_cached(second));
    assert!(ctx.rbac.user_permissions(first).await.unwrap().is_empty());
    assert_eq!(
        ctx.rbac.user_permissions(second).await.unwrap(),
        vec!["roles:list".to_string()]
    );
}

async fn missing_references_keep_prior_assignment(ctx: &AppContext) {
    let user = common::register(ctx, "keep@example.com", "keep").await.user.id;
    let role_id = common::grant(ctx, user, "keeper", &["x"]).await;

    let err = ctx.rbac.set_user_roles(user, &[role_id, 9999]).await.unwrap_err();
    assert!(matches!(err, RbacError::NotFound { .. }));
    let roles = ctx.rbac.user_roles(user).await.unwrap();
    assert_eq!(roles.iter().map(|r| r.id).collect::<Vec<_>>(), vec![role_id]);

    let err = ctx.rbac.set_role_menus(role_id, &[4242]).await.unwrap_err();
    assert!(matches!(err, RbacError::NotFound { .. }));
}

async fn route_tree_follows_roles(ctx: &AppContext) {
    let user = common::register(ctx, "nav@example.com", "nav").await.user.id;
    let system = ctx.rbac.create_menu(menu("system", None, 1)).await.unwrap();
    let users = ctx
        .rbac
        .create_menu(menu("users", Some(system.id), 2))
        .await
        .unwrap();
    let roles_menu = ctx
        .rbac
        .create_menu(menu("roles", Some(system.id), 1))
        .await
        .unwrap();
    let hidden = ctx.rbac.create_menu(menu("secret", None, 0)).await.unwrap();

    let role_id = common::grant(ctx, user, "navigator", &[]).await;
    ctx.rbac
        .set_role_menus(role_id, &[system.id, users.id, roles_menu.id])
        .await
        .unwrap();

    let tree = ctx.rbac.user_route_tree(user).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].id, system.id);
    let children: Vec<i32> = tree[0].children.iter().map(|c| c.id).collect();
    assert_eq!(children, vec![roles_menu.id, users.id]);
    assert_eq!(tree[0].meta.roles, Some(vec!["navigator".to_string()]));

    let full = ctx.rbac.menu_tree().await.unwrap();
    let secret = full.iter().find(|n| n.id == hidden.id).unwrap();
    assert_eq!(secret.meta.roles, Some(Vec::new()));
}

async fn duplicate_role_code_conflicts(ctx: &AppContext) {
    let new_role = || NewRole {
        code: "dup".to_string(),
        name: "Dup".to_string(),
        status: true,
    };
    ctx.rbac.create_role(new_role()).await.unwrap();
    let err = ctx.rbac.create_role(new_role()).await.unwrap_err();
    assert!(matches!(err, RbacError::Conflict(_)));
}

#[tokio::test]
async fn memory_role_permission_change_cascades() {
    let (ctx, _) = common::memory_context();
    role_permission_change_cascades(&ctx).await;
}

#[tokio::test]
async fn database_role_permission_change_cascades() {
    let (ctx, _) = common::database_context().await;
    role_permission_change_cascades(&ctx).await;
}

#[tokio::test]
async fn memory_user_role_change_only_touches_that_user() {
    let (ctx, _) = common::memory_context();
    user_role_change_only_touches_that_user(&ctx).await;
}

#[tokio::test]
async fn database_user_role_change_only_touches_that_user() {
    let (ctx, _) = common::database_context().await;
    user_role_change_only_touches_that_user(&ctx).await;
}

#[tokio::test]
async fn memory_missing_references_keep_prior_assignment() {
    let (ctx, _) = common::memory_context();
    missing_references_keep_prior_assignment(&ctx).await;
}

#[tokio::test]
async fn database_missing_references_keep_prior_assignment() {
    let (ctx, _) = common::database_context().await;
    missing_references_keep_prior_assignment(&ctx).await;
}

#[tokio::test]
async fn memory_route_tree_follows_roles() {
    let (ctx, _) = common::memory_context();
    route_tree_follows_roles(&ctx).await;
}

#[tokio::test]
async fn database_route_tree_follows_roles() {
    let (ctx, _) = common::database_context().await;
    route_tree_follows_roles(&ctx).await;
}

#[tokio::test]
async fn memory_duplicate_role_code_conflicts() {
    let (ctx, _) = common::memory_context();
    duplicate_role_code_conflicts(&ctx).await;
}

#[tokio::test]
async fn database_duplicate_role_code_conflicts() {
    let (ctx, _) = common::database_context().await;
    duplicate_role_code_conflicts(&ctx).await;
}
