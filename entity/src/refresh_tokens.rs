//! # 刷新令牌实体定义
//!
//! 持久化的 refresh token 记录，一个用户可同时持有多个（多设备登录）

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 刷新令牌实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "refresh_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique, column_type = "Text")]
    pub token: String,
    pub user_id: i32,
    pub expires_at: DateTime,
    pub created_at: DateTime,
}

impl Model {
    /// 记录在给定时间点是否仍然有效（存在且未过期）
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime) -> bool {
        self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
