use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "series")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tmdb_id: Option<i32>,
    #[sea_orm(unique)]
    pub path: Option<String>,
    pub series_metadata_id: Option<i32>,
    pub quality_profile_id: i32,
    pub monitored: bool,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::season::Entity")]
    Season,
    #[sea_orm(
        belongs_to = "super::series_metadata::Entity",
        from = "Column::SeriesMetadataId",
        to = "super::series_metadata::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    SeriesMetadata,
}

impl Related<super::season::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Season.def()
    }
}

impl Related<super::series_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SeriesMetadata.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
