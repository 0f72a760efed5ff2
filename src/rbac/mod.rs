//! # RBAC 模块
//!
//! 角色/权限/菜单的分配管理与菜单树构建

pub mod menu_tree;
pub mod service;

pub use menu_tree::{MenuNode, RouteMeta, RouteNode, build_route_tree, build_tree};
pub use service::RbacService;
