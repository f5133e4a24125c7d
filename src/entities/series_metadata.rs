use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "series_metadata")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tmdb_id: i32,
    pub title: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    /// JSON blob of provider external ids (imdb, tvdb, ...).
    pub external_ids: Option<String>,
    /// JSON blob of watch-provider listings.
    pub watch_providers: Option<String>,
    pub fetched_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::season_metadata::Entity")]
    SeasonMetadata,
}

impl Related<super::season_metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SeasonMetadata.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
