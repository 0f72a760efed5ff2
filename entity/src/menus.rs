//! # 菜单实体定义
//!
//! `parent_id` 自引用构成菜单树；存储层不保证无环，也不保证父节点存在。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 菜单实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "menus")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub parent_id: Option<i32>,
    pub name: String,
    pub path: Option<String>,
    pub component: Option<String>,
    #[serde(rename = "type")]
    pub menu_type: i32,
    pub icon: Option<String>,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub hidden: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::role_menus::Entity")]
    RoleMenus,
}

impl Related<super::role_menus::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RoleMenus.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
