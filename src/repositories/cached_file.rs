//! # Cached File Repository
//!
//! Content-addressable file cache storage. Writes are gated on the
//! provider content hash: an unchanged hash never rewrites the blob, it
//! only refreshes the sync timestamp.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::cached_file::{ActiveModel, Column, Entity as CachedFile, Model};

/// Result of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWriteOutcome {
    /// New path, blob stored
    Inserted,
    /// Hash changed, blob replaced
    Updated,
    /// Hash matched, only the sync timestamp was refreshed
    Unchanged,
}

/// Repository for cached file database operations
pub struct CachedFileRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CachedFileRepository<'a> {
    /// Create a new CachedFileRepository with the given database connection
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find(
        &self,
        repo_id: Uuid,
        path: &str,
    ) -> Result<Option<Model>, sea_orm::DbErr> {
        CachedFile::find()
            .filter(Column::RepoId.eq(repo_id))
            .filter(Column::Path.eq(path))
            .one(self.db)
            .await
    }

    /// Count cached files for a repository.
    pub async fn count_for_repo(&self, repo_id: Uuid) -> Result<u64, sea_orm::DbErr> {
        use sea_orm::PaginatorTrait;
        CachedFile::find()
            .filter(Column::RepoId.eq(repo_id))
            .count(self.db)
            .await
    }

    /// Store a file under (repo_id, path), gated on the content hash.
    pub async fn upsert(
        &self,
        repo_id: Uuid,
        path: &str,
        content_hash: &str,
        content: Vec<u8>,
    ) -> Result<CacheWriteOutcome, sea_orm::DbErr> {
        let now = Utc::now();

        match self.find(repo_id, path).await? {
            Some(existing) if existing.content_hash == content_hash => {
                let mut active: ActiveModel = existing.into();
                active.last_synced_at = Set(now.into());
                active.update(self.db).await?;
                Ok(CacheWriteOutcome::Unchanged)
            }
            Some(existing) => {
                let size = content.len() as i64;
                let mut active: ActiveModel = existing.into();
                active.content_hash = Set(content_hash.to_string());
                active.content = Set(content);
                active.size = Set(size);
                active.last_synced_at = Set(now.into());
                active.update(self.db).await?;
                Ok(CacheWriteOutcome::Updated)
            }
            None => {
                let active = ActiveModel {
                    id: Set(Uuid::new_v4()),
                    repo_id: Set(repo_id),
                    path: Set(path.to_string()),
                    content_hash: Set(content_hash.to_string()),
                    size: Set(content.len() as i64),
                    content: Set(content),
                    last_synced_at: Set(now.into()),
                    created_at: Set(now.into()),
                };
                active.insert(self.db).await?;
                Ok(CacheWriteOutcome::Inserted)
            }
        }
    }

    /// Refresh the sync timestamp without touching the blob.
    pub async fn touch(&self, repo_id: Uuid, path: &str) -> Result<(), sea_orm::DbErr> {
        if let Some(existing) = self.find(repo_id, path).await? {
            let mut active: ActiveModel = existing.into();
            active.last_synced_at = Set(Utc::now().into());
            active.update(self.db).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{insert_repo, setup_db};

    #[tokio::test]
    async fn test_upsert_outcomes_follow_the_hash() {
        let db = setup_db().await;
        let repo = insert_repo(&db, 1).await;
        let cache = CachedFileRepository::new(&db);

        let first = cache
            .upsert(repo.id, "README.md", "sha-a", b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(first, CacheWriteOutcome::Inserted);

        // Same hash, content untouched even if the caller passes bytes.
        let second = cache
            .upsert(repo.id, "README.md", "sha-a", b"hello".to_vec())
            .await
            .unwrap();
        assert_eq!(second, CacheWriteOutcome::Unchanged);

        let third = cache
            .upsert(repo.id, "README.md", "sha-b", b"hello world".to_vec())
            .await
            .unwrap();
        assert_eq!(third, CacheWriteOutcome::Updated);

        let stored = cache.find(repo.id, "README.md").await.unwrap().unwrap();
        assert_eq!(stored.content_hash, "sha-b");
        assert_eq!(stored.content, b"hello world");
        assert_eq!(stored.size, 11);
        assert_eq!(cache.count_for_repo(repo.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_paths_are_scoped_per_repo() {
        let db = setup_db().await;
        let repo_a = insert_repo(&db, 1).await;
        let repo_b = insert_repo(&db, 2).await;
        let cache = CachedFileRepository::new(&db);

        cache
            .upsert(repo_a.id, "src/lib.rs", "sha-a", b"a".to_vec())
            .await
            .unwrap();
        cache
            .upsert(repo_b.id, "src/lib.rs", "sha-b", b"b".to_vec())
            .await
            .unwrap();

        let a = cache.find(repo_a.id, "src/lib.rs").await.unwrap().unwrap();
        let b = cache.find(repo_b.id, "src/lib.rs").await.unwrap().unwrap();
        assert_eq!(a.content, b"a");
        assert_eq!(b.content, b"b");
    }
}
