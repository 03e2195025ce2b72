// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracesession_server::{config::ServerConfig, run_server};
use tracesession_storage::RegistryLayout;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "TRACESESSION_HTTP_ADDR")]
    http_addr: Option<String>,

    /// Snapshot directory; sessions stay in memory without it
    #[arg(long, env = "TRACESESSION_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Registry layout: centralized or per_cluster
    #[arg(long, env = "TRACESESSION_STORAGE_LAYOUT", value_parser = parse_layout)]
    storage_layout: Option<RegistryLayout>,

    /// Cluster used when a request names none
    #[arg(long, env = "TRACESESSION_DEFAULT_CLUSTER")]
    default_cluster: Option<String>,
}

fn parse_layout(s: &str) -> Result<RegistryLayout, String> {
    RegistryLayout::parse(s).ok_or_else(|| format!("unknown storage layout: {}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.http_addr {
        config.server.listen_addr = addr;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = Some(data_dir);
    }
    if let Some(layout) = args.storage_layout {
        config.storage.layout = layout;
    }
    if let Some(cluster) = args.default_cluster {
        config.clusters.default_cluster = cluster;
    }

    run_server(config).await
}
