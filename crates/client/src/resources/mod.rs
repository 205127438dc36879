//! Typed accessors over the HTTP request core, one per backend resource.
//!
//! Accessors borrow the client they were created from, so they always use
//! that client's context (root, tenant or sandbox) and its current token.

mod admin;
mod ai;
mod auth;
mod collection;
mod files;
mod scripts;

pub use admin::Admins;
pub use ai::Ai;
pub use auth::Auth;
pub use collection::CollectionHandle;
pub use files::Files;
pub use scripts::{Logs, Scripts, Templates};

use std::fmt::Display;

use crate::api_client::ApiClient;

impl ApiClient {
    pub fn auth(&self) -> Auth<'_> {
        Auth { client: self }
    }

    pub fn admins(&self) -> Admins<'_> {
        Admins { client: self }
    }

    pub fn ai(&self) -> Ai<'_> {
        Ai { client: self }
    }

    pub fn scripts(&self) -> Scripts<'_> {
        Scripts { client: self }
    }

    pub fn templates(&self) -> Templates<'_> {
        Templates { client: self }
    }

    /// Records of one collection, addressed by id or name.
    pub fn collection(&self, collection_id: impl Display) -> CollectionHandle<'_> {
        CollectionHandle {
            client: self,
            path: format!("/collections/{collection_id}"),
        }
    }

    pub fn files(&self) -> Files<'_> {
        Files { client: self }
    }

    pub fn logs(&self) -> Logs<'_> {
        Logs { client: self }
    }
}
