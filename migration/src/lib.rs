pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_create_refresh_tokens_table;
mod m20240101_000003_create_roles_permissions_tables;
mod m20240101_000004_create_menus_tables;
mod m20240101_000005_insert_default_rbac_data;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_refresh_tokens_table::Migration),
            Box::new(m20240101_000003_create_roles_permissions_tables::Migration),
            Box::new(m20240101_000004_create_menus_tables::Migration),
            Box::new(m20240101_000005_insert_default_rbac_data::Migration),
        ]
    }
}
