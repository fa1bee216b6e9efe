//! Team lookups. Teams are managed elsewhere; this only reads them.

use crate::{error::AppError, models::principal::Team};
use sqlx::PgPool;
use uuid::Uuid;

pub struct TeamRepository {
    db: PgPool,
}

impl TeamRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Team>, AppError> {
        let team = sqlx::query_as::<_, Team>("SELECT id, name FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(team)
    }
}
