use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movie_file")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Path inside the library, unique across the library.
    #[sea_orm(unique)]
    pub relative_path: String,
    /// Where the file was first observed, before any library move.
    pub original_file_path: Option<String>,
    pub size_bytes: i64,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
