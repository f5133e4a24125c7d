//! The on-disk library: scanning the movie and TV trees for media files and
//! importing completed downloads into the library layout.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::parser::filename::{parse_episode, parse_movie, strip_extension};

pub const VIDEO_EXTENSIONS: [&str; 6] = ["mkv", "mp4", "avi", "m4v", "webm", "ts"];

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// The destination already holds this file. Callers treat this as
    /// success and re-link the existing file.
    #[error("file already exists in library: {}", existing.relative_path)]
    FileExists { existing: ImportedFile },

    #[error("cannot derive an episode from path: {0}")]
    Unparsable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A file placed (or found) inside the library layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundMovieFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub title: String,
    pub year: Option<i32>,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEpisodeFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub series_name: String,
    pub season_number: i32,
    pub episode_number: i32,
    pub size_bytes: i64,
}

/// What a path alone says about an episode. Pure; no filesystem access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpisodePath {
    pub series_name: String,
    pub season_number: i32,
    pub episode_number: i32,
}

#[async_trait]
pub trait Library: Send + Sync {
    async fn find_movies(&self) -> Result<Vec<FoundMovieFile>>;

    async fn find_episodes(&self) -> Result<Vec<FoundEpisodeFile>>;

    async fn add_movie(&self, title: &str, source: &Path)
    -> Result<ImportedFile, LibraryError>;

    async fn add_episode(
        &self,
        series_title: &str,
        season_number: i32,
        source: &Path,
    ) -> Result<ImportedFile, LibraryError>;

    fn episode_file_from_path(&self, path: &str) -> Option<ParsedEpisodePath>;
}

/// Filesystem-backed library over the configured movie and TV directories.
pub struct FsLibrary {
    movie_dir: PathBuf,
    tv_dir: PathBuf,
}

impl FsLibrary {
    #[must_use]
    pub fn new(movie_dir: impl Into<PathBuf>, tv_dir: impl Into<PathBuf>) -> Self {
        Self {
            movie_dir: movie_dir.into(),
            tv_dir: tv_dir.into(),
        }
    }

    fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }

    fn walk_videos(root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| Self::is_video(p))
            .collect();
        files.sort();
        files
    }

    fn relative_to(root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    async fn place_file(
        &self,
        source: &Path,
        destination: &Path,
        root: &Path,
    ) -> Result<ImportedFile, LibraryError> {
        let relative_path = Self::relative_to(root, destination);

        if destination.exists() {
            let size_bytes = file_size(destination).await;
            return Err(LibraryError::FileExists {
                existing: ImportedFile {
                    relative_path,
                    absolute_path: destination.to_path_buf(),
                    size_bytes,
                },
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("placing {:?} into the library as {:?}", source, destination);

        if let Err(e) = tokio::fs::hard_link(source, destination).await {
            warn!("could not hardlink ({}), copying instead", e);
            tokio::fs::copy(source, destination).await?;
        }

        let size_bytes = file_size(destination).await;
        Ok(ImportedFile {
            relative_path,
            absolute_path: destination.to_path_buf(),
            size_bytes,
        })
    }
}

async fn file_size(path: &Path) -> i64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| i64::try_from(m.len()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            ' '
        } else {
            c
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Library for FsLibrary {
    async fn find_movies(&self) -> Result<Vec<FoundMovieFile>> {
        let root = self.movie_dir.clone();
        let mut found = Vec::new();
        for path in Self::walk_videos(&root) {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(parsed) = parse_movie(name) else {
                warn!("Skipping unparsable movie file: {:?}", path);
                continue;
            };
            found.push(FoundMovieFile {
                relative_path: Self::relative_to(&root, &path),
                size_bytes: file_size(&path).await,
                absolute_path: path,
                title: parsed.title,
                year: parsed.year,
            });
        }
        Ok(found)
    }

    async fn find_episodes(&self) -> Result<Vec<FoundEpisodeFile>> {
        let root = self.tv_dir.clone();
        let mut found = Vec::new();
        for path in Self::walk_videos(&root) {
            let relative = Self::relative_to(&root, &path);
            let Some(parsed) = self.episode_file_from_path(&relative) else {
                warn!("Skipping unparsable episode file: {:?}", path);
                continue;
            };
            found.push(FoundEpisodeFile {
                relative_path: relative,
                size_bytes: file_size(&path).await,
                absolute_path: path,
                series_name: parsed.series_name,
                season_number: parsed.season_number,
                episode_number: parsed.episode_number,
            });
        }
        Ok(found)
    }

    async fn add_movie(
        &self,
        title: &str,
        source: &Path,
    ) -> Result<ImportedFile, LibraryError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LibraryError::Unparsable(source.display().to_string()))?;

        let destination = self.movie_dir.join(sanitize(title)).join(file_name);
        self.place_file(source, &destination, &self.movie_dir).await
    }

    async fn add_episode(
        &self,
        series_title: &str,
        season_number: i32,
        source: &Path,
    ) -> Result<ImportedFile, LibraryError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LibraryError::Unparsable(source.display().to_string()))?;

        let destination = self
            .tv_dir
            .join(sanitize(series_title))
            .join(format!("Season {season_number:02}"))
            .join(file_name);
        self.place_file(source, &destination, &self.tv_dir).await
    }

    fn episode_file_from_path(&self, path: &str) -> Option<ParsedEpisodePath> {
        let name = Path::new(path).file_name()?.to_str()?;
        let parsed = parse_episode(strip_extension(name))?;

        // Prefer the directory layout's series name when present; the file
        // name's own title is a fallback for flat trees.
        let series_name = Path::new(path)
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .filter(|_| Path::new(path).components().count() > 1)
            .map_or(parsed.series_name.clone(), ToString::to_string);

        Some(ParsedEpisodePath {
            series_name,
            season_number: parsed.season,
            episode_number: parsed.episode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> FsLibrary {
        FsLibrary::new("/tmp/movies", "/tmp/tv")
    }

    #[test]
    fn parses_episode_path_with_directory_layout() {
        let parsed = library()
            .episode_file_from_path("Fargo/Season 02/Fargo.S02E04.1080p.mkv")
            .unwrap();
        assert_eq!(parsed.series_name, "Fargo");
        assert_eq!(parsed.season_number, 2);
        assert_eq!(parsed.episode_number, 4);
    }

    #[test]
    fn parses_flat_episode_path() {
        let parsed = library()
            .episode_file_from_path("The.Expanse.S01E10.mkv")
            .unwrap();
        assert_eq!(parsed.series_name, "The Expanse");
        assert_eq!(parsed.season_number, 1);
        assert_eq!(parsed.episode_number, 10);
    }

    #[test]
    fn rejects_non_episode_path() {
        assert!(library().episode_file_from_path("notes.txt").is_none());
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize("Fargo: Year One/Two"), "Fargo Year One Two");
    }
}
