pub mod prelude;

pub mod download_client;
pub mod episode;
pub mod episode_file;
pub mod episode_metadata;
pub mod indexer;
pub mod indexer_source;
pub mod job;
pub mod movie;
pub mod movie_file;
pub mod movie_metadata;
pub mod quality_definitions;
pub mod quality_profiles;
pub mod season;
pub mod season_metadata;
pub mod series;
pub mod series_metadata;
pub mod transition;
