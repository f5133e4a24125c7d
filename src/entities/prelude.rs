pub use super::download_client::Entity as DownloadClient;
pub use super::episode::Entity as Episode;
pub use super::episode_file::Entity as EpisodeFile;
pub use super::episode_metadata::Entity as EpisodeMetadata;
pub use super::indexer::Entity as Indexer;
pub use super::indexer_source::Entity as IndexerSource;
pub use super::job::Entity as Job;
pub use super::movie::Entity as Movie;
pub use super::movie_file::Entity as MovieFile;
pub use super::movie_metadata::Entity as MovieMetadata;
pub use super::quality_definitions::Entity as QualityDefinitions;
pub use super::quality_profiles::Entity as QualityProfiles;
pub use super::season::Entity as Season;
pub use super::season_metadata::Entity as SeasonMetadata;
pub use super::series::Entity as Series;
pub use super::series_metadata::Entity as SeriesMetadata;
pub use super::transition::Entity as Transition;
