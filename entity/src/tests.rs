//! # 实体定义测试

#[cfg(test)]
mod tests {
    use crate::{menus, refresh_tokens, roles, users};
    use chrono::{NaiveDate, NaiveDateTime};
    use sea_orm::Set;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_active_model() {
        let user = users::ActiveModel {
            email: Set("test@example.com".to_string()),
            username: Set("test_user".to_string()),
            password_hash: Set("hash123".to_string()),
            name: Set(None),
            ..Default::default()
        };

        assert_eq!(user.username.as_ref(), "test_user");
        assert_eq!(user.email.as_ref(), "test@example.com");
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = users::Model {
            id: 1,
            email: "a@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            name: Some("Alice".to_string()),
            created_at: at(0),
            updated_at: at(0),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_refresh_token_validity_window() {
        let record = refresh_tokens::Model {
            id: 1,
            token: "token".to_string(),
            user_id: 1,
            expires_at: at(12),
            created_at: at(0),
        };

        assert!(record.is_valid_at(at(11)));
        assert!(!record.is_valid_at(at(12)));
        assert!(!record.is_valid_at(at(13)));
    }

    #[test]
    fn test_menu_wire_field_names() {
        let menu = menus::Model {
            id: 2,
            parent_id: Some(1),
            name: "Users".to_string(),
            path: Some("/system/users".to_string()),
            component: None,
            menu_type: 1,
            icon: None,
            sort_order: 3,
            hidden: false,
            created_at: at(0),
            updated_at: at(0),
        };

        let json = serde_json::to_value(&menu).unwrap();
        assert_eq!(json["parentId"], 1);
        assert_eq!(json["order"], 3);
        assert_eq!(json["type"], 1);
    }

    #[tokio::test]
    async fn test_role_active_model() {
        let role = roles::ActiveModel {
            code: Set("admin".to_string()),
            name: Set("Administrator".to_string()),
            status: Set(true),
            ..Default::default()
        };

        assert_eq!(role.code.as_ref(), "admin");
        assert_eq!(role.status.as_ref(), &true);
    }
}
