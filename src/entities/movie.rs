use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "movie")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tmdb_id: Option<i32>,
    #[sea_orm(unique)]
    pub path: Option<String>,
    pub movie_metadata_id: Option<i32>,
    pub movie_file_id: Option<i32>,
    pub quality_profile_id: i32,
    pub monitored: bool,
    /// Denormalized copy of the most-recent transition's `to_state`.
    pub state: String,
    pub download_id: Option<String>,
    pub download_client_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::movie_metadata::Entity",
        from = "Column::MovieMetadataId",
        to = "super::movie_metadata::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    MovieMetadata,
    #[sea_orm(
        belongs_to = "super::movie_file::Entity",
        from = "Column::MovieFileId",
        to = "super::movie_file::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    MovieFile,
}

impl Related<super::movie_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieMetadata.def()
    }
}

impl Related<super::movie_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MovieFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
