use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "episode_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub season_metadata_id: i32,
    pub episode_number: i32,
    pub title: Option<String>,
    /// Provider date, `YYYY-MM-DD`.
    pub air_date: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub fetched_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::season_metadata::Entity",
        from = "Column::SeasonMetadataId",
        to = "super::season_metadata::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    SeasonMetadata,
}

impl Related<super::season_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SeasonMetadata.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
