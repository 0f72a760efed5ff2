pub mod auth;
pub mod health;
pub mod menus;
pub mod permissions;
pub mod roles;
pub mod users;
