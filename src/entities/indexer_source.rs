use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Connection descriptor for an indexer aggregator instance.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "indexer_source")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub scheme: String,
    pub host: String,
    pub port: i32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub enabled: bool,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::indexer::Entity")]
    Indexer,
}

impl Related<super::indexer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Indexer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
