//! Command handlers, called from `main` once config and logging are set up.

mod authors;
mod db;
mod import;
mod parse;
mod search;
mod status;

pub(crate) use authors::run_authors;
pub(crate) use db::{run_db_migrate, run_db_ping, DbCommands};
pub(crate) use import::run_import;
pub(crate) use parse::run_parse;
pub(crate) use search::run_search;
pub(crate) use status::run_status;

use std::path::Path;

use anyhow::Context;

async fn read_upload(file: &Path) -> anyhow::Result<Vec<u8>> {
    tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))
}
