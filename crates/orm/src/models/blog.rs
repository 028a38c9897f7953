use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::{business_id, unix_now};
use crate::field::Field;
use crate::model::Model;
use crate::schema::Schema;

/// A registered user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<String>,
    pub email: Option<String>,
    pub passwd: Option<String>,
    pub admin: Option<bool>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub create_at: Option<i64>,
}

impl Model for User {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("User")
                .table("t_users")
                .field("id", Field::string().primary_key().default_with(business_id))
                .field("email", Field::string().ddl("varchar(50)"))
                .field("passwd", Field::string().ddl("varchar(50)"))
                .field("admin", Field::boolean())
                .field("name", Field::string().ddl("varchar(50)"))
                .field("image", Field::string().ddl("varchar(255)"))
                .field("create_at", Field::integer().default_with(unix_now))
                .build()
                .expect("User schema declares exactly one primary key")
        })
    }
}

/// A blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub create_at: Option<i64>,
}

impl Model for Blog {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("Blog")
                .table("t_blogs")
                .field("id", Field::string().primary_key().default_with(business_id))
                .field("user_id", Field::string())
                .field("name", Field::string().ddl("varchar(50)"))
                .field("summary", Field::string().ddl("varchar(200)"))
                .field("content", Field::text())
                .field("image", Field::string().ddl("varchar(255)"))
                .field("create_at", Field::integer().default_with(unix_now))
                .build()
                .expect("Blog schema declares exactly one primary key")
        })
    }
}

/// A comment on a blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<String>,
    pub blog_id: Option<String>,
    pub user_id: Option<String>,
    pub content: Option<String>,
    pub create_at: Option<i64>,
}

impl Model for Comment {
    fn schema() -> &'static Schema {
        static SCHEMA: OnceLock<Schema> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            Schema::builder("Comment")
                .table("t_comments")
                .field("id", Field::string().primary_key().default_with(business_id))
                .field("blog_id", Field::string())
                .field("user_id", Field::string())
                .field("content", Field::text())
                .field("create_at", Field::integer().default_with(unix_now))
                .build()
                .expect("Comment schema declares exactly one primary key")
        })
    }
}
