use sea_orm::entity::prelude::*;

/// An indexer as reported by its aggregator source. Refreshed out-of-band;
/// `enabled` follows the aggregator's own flag.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "indexer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub indexer_source_id: i32,
    /// The aggregator's own id for this indexer, used in search requests.
    pub remote_id: i32,
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::indexer_source::Entity",
        from = "Column::IndexerSourceId",
        to = "super::indexer_source::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    IndexerSource,
}

impl Related<super::indexer_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IndexerSource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
