use crate::schema::{Column, Datatype, InMemoryIntrospector, IntrospectedColumn, Table};

/// `users` as the writers see it: integer key, required username, optional bio.
pub fn users_table() -> Table {
    Table::new(
        "users",
        vec![
            Column::new("id", Datatype::Integer).primary_key(),
            Column::new("username", Datatype::Text).not_null(),
            Column::new("bio", Datatype::Text).max_length(160),
        ],
        Vec::new(),
        vec!["id".to_string()],
    )
}

/// A small forum database: users, posts, a composite-key join table and a log table.
pub fn forum_introspector() -> InMemoryIntrospector {
    InMemoryIntrospector::new()
        .table(
            "users",
            vec![
                IntrospectedColumn::new("id", "integer").not_null(),
                IntrospectedColumn::new("username", "string").not_null(),
                IntrospectedColumn::new("bio", "text").limit(160),
                IntrospectedColumn::new("created_at", "datetime").not_null(),
                IntrospectedColumn::new("trust_level", "integer")
                    .not_null()
                    .with_default(),
                IntrospectedColumn::new("ip_address", "inet"),
                IntrospectedColumn::new("password_hash", "string").limit(64),
            ],
            &["id"],
        )
        .table(
            "posts",
            vec![
                IntrospectedColumn::new("id", "integer").not_null(),
                IntrospectedColumn::new("user_id", "integer"),
                IntrospectedColumn::new("raw", "text").not_null(),
                IntrospectedColumn::new("custom_fields", "jsonb"),
                IntrospectedColumn::new("external_id", "uuid"),
            ],
            &["id"],
        )
        .table(
            "post_tags",
            vec![
                IntrospectedColumn::new("post_id", "integer").not_null(),
                IntrospectedColumn::new("tag_id", "integer").not_null(),
                IntrospectedColumn::new("created_at", "datetime").not_null(),
            ],
            &["post_id", "tag_id"],
        )
        .table(
            "schema_migrations",
            vec![IntrospectedColumn::new("version", "string").not_null()],
            &["version"],
        )
}
