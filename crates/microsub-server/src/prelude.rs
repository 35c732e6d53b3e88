use super::*;

pub use cli::*;
pub use config::*;
pub use db::*;
pub use error::*;
pub use processor::*;
pub use scheduler::*;
pub use webmention::*;
pub use websub::*;

pub(crate) mod internal {
    pub use std::sync::Arc;

    pub use anyhow::Result;
    pub use clap::{Parser, Subcommand};
    pub use resolve_path::PathResolveExt;
    pub use serde::{Deserialize, Serialize};
    pub use tokio::task::JoinSet;
    pub use tokio_util::sync::CancellationToken;

    pub use microsub_core::prelude as core;
}
