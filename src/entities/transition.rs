use sea_orm::entity::prelude::*;

/// Append-only state-change log shared by every entity class. The row id
/// doubles as the sort key. Exactly one row per (entity_type, entity_id)
/// carries `most_recent = true`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transition")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub entity_type: String,
    pub entity_id: i32,
    pub from_state: Option<String>,
    pub to_state: String,
    pub most_recent: bool,
    /// JSON `TransitionMetadata` blob; carries in-flight download references.
    pub metadata: Option<String>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
