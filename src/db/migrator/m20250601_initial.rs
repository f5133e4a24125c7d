use crate::entities::prelude::*;
use crate::entities::{episode, episode_metadata, season, season_metadata, transition};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(QualityProfiles)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(QualityDefinitions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(MovieMetadata)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SeriesMetadata)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SeasonMetadata)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(EpisodeMetadata)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(MovieFile)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(EpisodeFile)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Movie)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Series)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Season)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Episode)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Transition)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Job)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(IndexerSource)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Indexer)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(DownloadClient)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // One season per (series, number) and one metadata row per
        // (parent, number); the compound lookups rely on these.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_season_series_number")
                    .table(Season)
                    .col(season::Column::SeriesId)
                    .col(season::Column::SeasonNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_season_metadata_parent_number")
                    .table(SeasonMetadata)
                    .col(season_metadata::Column::SeriesMetadataId)
                    .col(season_metadata::Column::SeasonNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_episode_metadata_parent_number")
                    .table(EpisodeMetadata)
                    .col(episode_metadata::Column::SeasonMetadataId)
                    .col(episode_metadata::Column::EpisodeNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Every metadata row backs at most one episode. Nullable-unique:
        // sqlite permits any number of NULLs here.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_episode_metadata_link")
                    .table(Episode)
                    .col(episode::Column::EpisodeMetadataId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transition_entity")
                    .table(Transition)
                    .col(transition::Column::EntityType)
                    .col(transition::Column::EntityId)
                    .col(transition::Column::MostRecent)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transition_created_at")
                    .table(Transition)
                    .col(transition::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DownloadClient).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Indexer).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IndexerSource).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Job).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transition).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Episode).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Season).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Series).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Movie).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EpisodeFile).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MovieFile).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EpisodeMetadata).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SeasonMetadata).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SeriesMetadata).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MovieMetadata).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QualityDefinitions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QualityProfiles).to_owned())
            .await?;

        Ok(())
    }
}
