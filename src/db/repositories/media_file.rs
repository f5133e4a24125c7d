use anyhow::Result;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashSet;

use crate::entities::{episode, episode_file, movie, movie_file, prelude::*};
use crate::models::now_rfc3339;

pub struct NewMediaFile {
    pub relative_path: String,
    pub original_file_path: Option<String>,
    pub size_bytes: i64,
}

pub struct MediaFileRepository {
    conn: DatabaseConnection,
}

impl MediaFileRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ------------------------------------------------------------------
    // Episode files
    // ------------------------------------------------------------------

    pub async fn create_episode_file(&self, input: NewMediaFile) -> Result<episode_file::Model> {
        let row = episode_file::ActiveModel {
            relative_path: Set(input.relative_path),
            original_file_path: Set(input.original_file_path),
            size_bytes: Set(input.size_bytes),
            created_at: Set(now_rfc3339()),
            ..Default::default()
        };
        Ok(row.insert(&self.conn).await?)
    }

    pub async fn get_episode_file(&self, id: i32) -> Result<Option<episode_file::Model>> {
        Ok(EpisodeFile::find_by_id(id).one(&self.conn).await?)
    }

    /// Case-insensitive lookup on either the library path or the path the
    /// file was first observed at.
    pub async fn find_episode_file_by_path(&self, path: &str) -> Result<Option<episode_file::Model>> {
        let needle = path.to_lowercase();
        Ok(EpisodeFile::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(episode_file::Column::RelativePath)))
                            .eq(needle.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(episode_file::Column::OriginalFilePath)))
                            .eq(needle),
                    ),
            )
            .one(&self.conn)
            .await?)
    }

    pub async fn update_episode_file_original_path(&self, id: i32, path: &str) -> Result<()> {
        let model = EpisodeFile::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("episode file {id}")))?;
        let mut active: episode_file::ActiveModel = model.into();
        active.original_file_path = Set(Some(path.to_string()));
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn list_episode_files(&self) -> Result<Vec<episode_file::Model>> {
        Ok(EpisodeFile::find()
            .order_by_asc(episode_file::Column::Id)
            .all(&self.conn)
            .await?)
    }

    /// Episode files no episode row points at yet; indexing turns these
    /// into Discovered episodes.
    pub async fn list_orphan_episode_files(&self) -> Result<Vec<episode_file::Model>> {
        let linked: HashSet<i32> = Episode::find()
            .filter(episode::Column::EpisodeFileId.is_not_null())
            .all(&self.conn)
            .await?
            .into_iter()
            .filter_map(|e| e.episode_file_id)
            .collect();

        let files = self.list_episode_files().await?;
        Ok(files.into_iter().filter(|f| !linked.contains(&f.id)).collect())
    }

    // ------------------------------------------------------------------
    // Movie files
    // ------------------------------------------------------------------

    pub async fn create_movie_file(&self, input: NewMediaFile) -> Result<movie_file::Model> {
        let row = movie_file::ActiveModel {
            relative_path: Set(input.relative_path),
            original_file_path: Set(input.original_file_path),
            size_bytes: Set(input.size_bytes),
            created_at: Set(now_rfc3339()),
            ..Default::default()
        };
        Ok(row.insert(&self.conn).await?)
    }

    pub async fn get_movie_file(&self, id: i32) -> Result<Option<movie_file::Model>> {
        Ok(MovieFile::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn find_movie_file_by_path(&self, path: &str) -> Result<Option<movie_file::Model>> {
        let needle = path.to_lowercase();
        Ok(MovieFile::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(movie_file::Column::RelativePath)))
                            .eq(needle.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(movie_file::Column::OriginalFilePath)))
                            .eq(needle),
                    ),
            )
            .one(&self.conn)
            .await?)
    }

    pub async fn update_movie_file_original_path(&self, id: i32, path: &str) -> Result<()> {
        let model = MovieFile::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie file {id}")))?;
        let mut active: movie_file::ActiveModel = model.into();
        active.original_file_path = Set(Some(path.to_string()));
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn list_movie_files(&self) -> Result<Vec<movie_file::Model>> {
        Ok(MovieFile::find()
            .order_by_asc(movie_file::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_orphan_movie_files(&self) -> Result<Vec<movie_file::Model>> {
        let linked: HashSet<i32> = Movie::find()
            .filter(movie::Column::MovieFileId.is_not_null())
            .all(&self.conn)
            .await?
            .into_iter()
            .filter_map(|m| m.movie_file_id)
            .collect();

        let files = self.list_movie_files().await?;
        Ok(files.into_iter().filter(|f| !linked.contains(&f.id)).collect())
    }
}
