use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "quality_definitions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub quality_profile_id: i32,
    /// Position inside the profile; lower is evaluated first.
    pub sort_index: i32,
    pub name: String,
    pub media_type: String,
    pub min_mb_per_min: f64,
    pub preferred_mb_per_min: f64,
    pub max_mb_per_min: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quality_profiles::Entity",
        from = "Column::QualityProfileId",
        to = "super::quality_profiles::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    QualityProfiles,
}

impl Related<super::quality_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QualityProfiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
