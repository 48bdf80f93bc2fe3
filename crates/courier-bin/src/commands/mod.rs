//! Command implementations.

mod catalog;
mod handle;
mod init;
mod sender;
mod usage;

pub use catalog::{catalog_add_link, catalog_create, catalog_list, catalog_show};
pub use handle::handle;
pub use init::init;
pub use sender::{sender_block, sender_reset, sender_show, sender_unblock};
pub use usage::{usage_recent, usage_summary};

use anyhow::{anyhow, Context, Result};
use courier_config_and_utils::{ChannelKind, Paths};
use courier_database::AsyncDatabase;

pub(crate) fn parse_channel(name: &str) -> Result<ChannelKind> {
    ChannelKind::parse(name).ok_or_else(|| anyhow!("Unknown channel '{name}'"))
}

pub(crate) async fn open_database(paths: &Paths) -> Result<AsyncDatabase> {
    let path = paths.database_file();
    AsyncDatabase::open(&path)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}
