use sea_orm_migration::prelude::*;

/// 管理接口使用的权限 key
const DEFAULT_PERMISSIONS: &[(&str, &str)] = &[
    ("users:list", "List users"),
    ("users:read", "Read a user"),
    ("users:create", "Create users"),
    ("users:update", "Update users and reset passwords"),
    ("roles:list", "List roles"),
    ("roles:read", "Read a role and its assignments"),
    ("roles:create", "Create roles"),
    ("roles:update", "Update roles and role assignments"),
    ("roles:delete", "Delete roles"),
    ("permissions:list", "List permissions"),
    ("permissions:read", "Read a permission"),
    ("permissions:create", "Create permissions"),
    ("permissions:update", "Update permission keys and descriptions"),
    ("permissions:delete", "Delete permissions"),
    ("menus:list", "List menus and the menu tree"),
    ("menus:read", "Read a menu and role menus"),
    ("menus:create", "Create menus"),
    ("menus:update", "Update menus and role menus"),
    ("menus:delete", "Delete menus"),
];

const ADMIN_ROLE_CODE: &str = "admin";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert_permissions = Query::insert()
            .into_table(Permissions::Table)
            .columns([Permissions::Key, Permissions::Description])
            .to_owned();
        for (key, description) in DEFAULT_PERMISSIONS {
            insert_permissions.values_panic([(*key).into(), (*description).into()]);
        }
        manager.exec_stmt(insert_permissions).await?;

        manager
            .exec_stmt(
                Query::insert()
                    .into_table(Roles::Table)
                    .columns([Roles::Code, Roles::Name, Roles::Status])
                    .values_panic([ADMIN_ROLE_CODE.into(), "Administrator".into(), true.into()])
                    .to_owned(),
            )
            .await?;

        // 管理员角色授予全部默认权限
        let grant_all = Query::select()
            .column((Roles::Table, Roles::Id))
            .column((Permissions::Table, Permissions::Id))
            .from(Roles::Table)
            .from(Permissions::Table)
            .and_where(Expr::col((Roles::Table, Roles::Code)).eq(ADMIN_ROLE_CODE))
            .to_owned();

        let mut insert_grants = Query::insert()
            .into_table(RolePermissions::Table)
            .columns([RolePermissions::RoleId, RolePermissions::PermissionId])
            .to_owned();
        insert_grants
            .select_from(grant_all)
            .map_err(|e| DbErr::Custom(format!("构建默认授权语句失败: {e}")))?;
        manager.exec_stmt(insert_grants).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 级联删除会清理 role_permissions
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Roles::Table)
                    .and_where(Expr::col(Roles::Code).eq(ADMIN_ROLE_CODE))
                    .to_owned(),
            )
            .await?;

        let keys: Vec<&str> = DEFAULT_PERMISSIONS.iter().map(|(key, _)| *key).collect();
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Permissions::Table)
                    .and_where(Expr::col(Permissions::Key).is_in(keys))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    Code,
    Name,
    Status,
}

#[derive(DeriveIden)]
enum Permissions {
    Table,
    Id,
    Key,
    Description,
}

#[derive(DeriveIden)]
enum RolePermissions {
    Table,
    RoleId,
    PermissionId,
}
