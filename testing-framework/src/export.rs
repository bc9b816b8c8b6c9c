//! Dump the chain as seen by each node once a run is over.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::fs;

use multinode_common::block::{Block, GENESIS_HEIGHT};

use crate::client::NodeClient;

/// Default output directory of a suite.
pub fn default_blocks_dir(suite: &str) -> PathBuf {
    PathBuf::from(format!("{}_logs", suite))
}

/// Every block `node` knows of, from genesis up to its tip.
pub async fn fetch_all_blocks(node: &dyn NodeClient) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut height = GENESIS_HEIGHT;
    while let Some(block) = node
        .get_block(height)
        .await
        .with_context(|| format!("Failed to fetch block {} from {}", height, node.endpoint()))?
    {
        blocks.push(block);
        height += 1;
    }
    Ok(blocks)
}

/// Write the blocks of `node` to `dir/filename`, one JSON document per
/// block.
pub async fn log_all_blocks(node: &dyn NodeClient, filename: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let blocks = fetch_all_blocks(node).await?;
    let mut content = String::new();
    for block in &blocks {
        content.push_str(&serde_json::to_string_pretty(block)?);
        content.push('\n');
    }

    let path = dir.join(filename);
    fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {} blocks to {}", blocks.len(), path.display());
    Ok(path)
}

/// Save the chain of every node as `node<i>.log` under `dir`.
pub async fn export_blocks(nodes: &[std::sync::Arc<dyn NodeClient>], dir: &Path) -> Result<Vec<PathBuf>> {
    info!("Saving blockchain logs to {}", dir.display());
    let mut paths = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        info!("Saving logs of node{}", i + 1);
        paths.push(log_all_blocks(node.as_ref(), &format!("node{}.log", i + 1), dir).await?);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dir() {
        assert_eq!(
            default_blocks_dir("network_testing"),
            PathBuf::from("network_testing_logs")
        );
    }
}
