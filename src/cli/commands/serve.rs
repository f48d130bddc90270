//! Serve Command
//!
//! Run the HTTP API until interrupted.

use crate::config::ConfigLoader;
use crate::server;
use crate::types::Result;

pub async fn run(bind: Option<String>) -> Result<()> {
    let config = ConfigLoader::load()?;
    server::serve(config, bind).await
}
