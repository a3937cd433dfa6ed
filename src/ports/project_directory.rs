//! ProjectDirectory port - read access to projects owned by the external CRUD.

use async_trait::async_trait;

use crate::domain::donation::Project;
use crate::domain::foundation::{DomainError, ProjectId, UserId};

/// Lookup of projects for donation and quota checks.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    /// Returns the project unless it does not exist or was deleted.
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, DomainError>;

    /// Number of non-deleted projects owned by `owner` right now.
    async fn count_active_projects(&self, owner: &UserId) -> Result<u64, DomainError>;
}
