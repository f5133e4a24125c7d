use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::{prelude::*, quality_definitions, quality_profiles};
use crate::quality::{MediaType, QualityDefinition, QualityProfile};

pub struct QualityRepository {
    conn: DatabaseConnection,
}

impl QualityRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Seed the default profile on first start so freshly-added media always
    /// has a usable profile id.
    pub async fn ensure_defaults(&self) -> Result<()> {
        let count = QualityProfiles::find().count(&self.conn).await?;
        if count > 0 {
            return Ok(());
        }

        let profile = quality_profiles::ActiveModel {
            name: Set("Default".to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        let defaults = [
            ("HD Movie", MediaType::Movie, 0.0, 8.33, 16.67),
            ("HD Episode", MediaType::Tv, 0.0, 5.0, 12.0),
        ];
        for (index, (name, media_type, min, preferred, max)) in defaults.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let sort_index = index as i32;
            quality_definitions::ActiveModel {
                quality_profile_id: Set(profile.id),
                sort_index: Set(sort_index),
                name: Set(name.to_string()),
                media_type: Set(media_type.as_str().to_string()),
                min_mb_per_min: Set(min),
                preferred_mb_per_min: Set(preferred),
                max_mb_per_min: Set(max),
                ..Default::default()
            }
            .insert(&self.conn)
            .await?;
        }
        Ok(())
    }

    pub async fn get_profile(&self, id: i32) -> Result<Option<QualityProfile>> {
        let Some(profile) = QualityProfiles::find_by_id(id).one(&self.conn).await? else {
            return Ok(None);
        };

        let definitions = QualityDefinitions::find()
            .filter(quality_definitions::Column::QualityProfileId.eq(id))
            .order_by_asc(quality_definitions::Column::SortIndex)
            .all(&self.conn)
            .await?;

        let qualities = definitions
            .into_iter()
            .map(|d| {
                Ok(QualityDefinition {
                    id: d.id,
                    name: d.name,
                    media_type: d.media_type.parse()?,
                    min_mb_per_min: d.min_mb_per_min,
                    preferred_mb_per_min: d.preferred_mb_per_min,
                    max_mb_per_min: d.max_mb_per_min,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(QualityProfile {
            id: profile.id,
            name: profile.name,
            qualities,
        }))
    }

    pub async fn list_profiles(&self) -> Result<Vec<QualityProfile>> {
        let profiles = QualityProfiles::find()
            .order_by_asc(quality_profiles::Column::Id)
            .all(&self.conn)
            .await?;

        let mut out = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if let Some(loaded) = self.get_profile(profile.id).await? {
                out.push(loaded);
            }
        }
        Ok(out)
    }

    pub async fn create_profile(
        &self,
        name: &str,
        definitions: Vec<QualityDefinition>,
    ) -> Result<QualityProfile> {
        let profile = quality_profiles::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        for (index, def) in definitions.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let sort_index = index as i32;
            quality_definitions::ActiveModel {
                quality_profile_id: Set(profile.id),
                sort_index: Set(sort_index),
                name: Set(def.name.clone()),
                media_type: Set(def.media_type.as_str().to_string()),
                min_mb_per_min: Set(def.min_mb_per_min),
                preferred_mb_per_min: Set(def.preferred_mb_per_min),
                max_mb_per_min: Set(def.max_mb_per_min),
                ..Default::default()
            }
            .insert(&self.conn)
            .await?;
        }

        self.get_profile(profile.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("profile {} vanished after create", profile.id))
    }
}
