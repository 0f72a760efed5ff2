//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod menus;
pub mod permissions;
pub mod refresh_tokens;
pub mod role_menus;
pub mod role_permissions;
pub mod roles;
pub mod user_roles;
pub mod users;

pub use menus::Entity as Menus;
pub use permissions::Entity as Permissions;
pub use refresh_tokens::Entity as RefreshTokens;
pub use role_menus::Entity as RoleMenus;
pub use role_permissions::Entity as RolePermissions;
pub use roles::Entity as Roles;
pub use user_roles::Entity as UserRoles;
pub use users::Entity as Users;

#[cfg(test)]
mod tests;
