use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "season_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub series_metadata_id: i32,
    pub season_number: i32,
    pub title: Option<String>,
    pub fetched_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::series_metadata::Entity",
        from = "Column::SeriesMetadataId",
        to = "super::series_metadata::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SeriesMetadata,
    #[sea_orm(has_many = "super::episode_metadata::Entity")]
    EpisodeMetadata,
}

impl Related<super::series_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SeriesMetadata.def()
    }
}

impl Related<super::episode_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EpisodeMetadata.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
