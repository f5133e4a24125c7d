use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Connection descriptor for a download client. `implementation` selects the
/// concrete client, `protocol` is what it speaks (torrent or usenet).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "download_client")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub implementation: String,
    pub protocol: String,
    pub scheme: String,
    pub host: String,
    pub port: i32,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub enabled: bool,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
