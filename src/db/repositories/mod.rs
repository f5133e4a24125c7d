pub mod job;
pub mod media_file;
pub mod metadata;
pub mod movie;
pub mod quality;
pub mod remote;
pub mod series;
pub mod transition;
