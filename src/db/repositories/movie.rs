use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::db::repositories::transition::record_initial;
use crate::entities::{movie, prelude::*};
use crate::models::now_rfc3339;
use crate::models::state::{EntityKind, MovieState};

pub struct NewMovie {
    pub tmdb_id: Option<i32>,
    pub path: Option<String>,
    pub movie_metadata_id: Option<i32>,
    pub quality_profile_id: i32,
    pub monitored: bool,
}

pub struct MovieRepository {
    conn: DatabaseConnection,
}

impl MovieRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Insert a movie together with its initial transition row.
    pub async fn create(&self, input: NewMovie, initial: MovieState) -> Result<movie::Model> {
        let created = self
            .conn
            .transaction::<_, movie::Model, DbErr>(move |txn| {
                Box::pin(async move {
                    let now = now_rfc3339();
                    let row = movie::ActiveModel {
                        tmdb_id: Set(input.tmdb_id),
                        path: Set(input.path),
                        movie_metadata_id: Set(input.movie_metadata_id),
                        movie_file_id: Set(None),
                        quality_profile_id: Set(input.quality_profile_id),
                        monitored: Set(input.monitored),
                        state: Set(initial.as_str().to_string()),
                        download_id: Set(None),
                        download_client_id: Set(None),
                        created_at: Set(now.clone()),
                        updated_at: Set(now),
                        ..Default::default()
                    };
                    let model = row.insert(txn).await?;
                    record_initial(txn, EntityKind::Movie, model.id, initial.as_str()).await?;
                    Ok(model)
                })
            })
            .await?;
        Ok(created)
    }

    pub async fn get(&self, id: i32) -> Result<Option<movie::Model>> {
        Ok(Movie::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_by_tmdb_id(&self, tmdb_id: i32) -> Result<Option<movie::Model>> {
        Ok(Movie::find()
            .filter(movie::Column::TmdbId.eq(tmdb_id))
            .one(&self.conn)
            .await?)
    }

    pub async fn get_by_path(&self, path: &str) -> Result<Option<movie::Model>> {
        Ok(Movie::find()
            .filter(movie::Column::Path.eq(path))
            .one(&self.conn)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<movie::Model>> {
        Ok(Movie::find()
            .order_by_asc(movie::Column::Id)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_in_state(
        &self,
        state: MovieState,
        monitored_only: bool,
    ) -> Result<Vec<movie::Model>> {
        let mut query = Movie::find().filter(movie::Column::State.eq(state.as_str()));
        if monitored_only {
            query = query.filter(movie::Column::Monitored.eq(true));
        }
        Ok(query.order_by_asc(movie::Column::Id).all(&self.conn).await?)
    }

    pub async fn link_metadata(&self, id: i32, metadata_id: i32) -> Result<()> {
        let movie = Movie::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie {id}")))?;
        let mut active: movie::ActiveModel = movie.into();
        active.movie_metadata_id = Set(Some(metadata_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_file(&self, id: i32, file_id: i32) -> Result<()> {
        let movie = Movie::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie {id}")))?;
        let mut active: movie::ActiveModel = movie.into();
        active.movie_file_id = Set(Some(file_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_tmdb_id(&self, id: i32, tmdb_id: i32) -> Result<()> {
        let movie = Movie::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie {id}")))?;
        let mut active: movie::ActiveModel = movie.into();
        active.tmdb_id = Set(Some(tmdb_id));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_path(&self, id: i32, path: &str) -> Result<()> {
        let movie = Movie::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("movie {id}")))?;
        let mut active: movie::ActiveModel = movie.into();
        active.path = Set(Some(path.to_string()));
        active.updated_at = Set(now_rfc3339());
        active.update(&self.conn).await?;
        Ok(())
    }
}
