//! Request identity resolution: CSRF check,
//! then bearer-token verification, producing a workspace-scoped `Identity`
//! every mutating route handler receives.

pub mod csrf;
pub mod jwt;
pub mod magic_link;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ids::{UserId, WorkspaceId};
use crate::workspace::{Workspace, WorkspaceRepository};
use jwt::JwtIssuer;

/// The resolved caller for a request: which user, in which workspace.
/// Handlers trust this and never re-derive it from request state.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: UserId,
    pub workspace_id: WorkspaceId,
}

pub struct IdentityResolver {
    jwt: Arc<JwtIssuer>,
    workspaces: WorkspaceRepository,
}

impl IdentityResolver {
    pub fn new(jwt: Arc<JwtIssuer>, workspaces: WorkspaceRepository) -> Self {
        Self { jwt, workspaces }
    }

    /// Verifies the bearer token and loads the workspace, rejecting callers
    /// whose workspace is no longer `active`.
    pub async fn resolve(&self, bearer_token: &str) -> Result<(Identity, Workspace)> {
        let (user_id, workspace_id) = self.jwt.verify(bearer_token).await?;
        let workspace = self.workspaces.find(workspace_id).await?;
        if !workspace.status.is_active() {
            return Err(Error::Unauthenticated);
        }
        Ok((Identity { user_id, workspace_id }, workspace))
    }
}
