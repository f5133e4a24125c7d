use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "episode")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub season_id: i32,
    pub episode_number: i32,
    /// Each episode-metadata row may back at most one episode.
    #[sea_orm(unique)]
    pub episode_metadata_id: Option<i32>,
    #[sea_orm(unique)]
    pub episode_file_id: Option<i32>,
    /// Set when this episode's in-flight download is a season pack shared
    /// with its siblings.
    pub is_entire_season_download: bool,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::season::Entity",
        from = "Column::SeasonId",
        to = "super::season::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Season,
    #[sea_orm(
        belongs_to = "super::episode_file::Entity",
        from = "Column::EpisodeFileId",
        to = "super::episode_file::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    EpisodeFile,
}

impl Related<super::season::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Season.def()
    }
}

impl Related<super::episode_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EpisodeFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
