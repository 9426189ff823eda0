// Copyright (c) 2025 the replypilot authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "replypilot")]
#[command(about = "Unattended LLM-powered reply agent for the X feed")]
#[command(version)]
pub struct Cli {
    /// Path to config file (defaults to replypilot.toml in current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the autopilot loop until interrupted or the comment limit is hit
    Run {
        /// Stop after this many sent comments (overrides the config value)
        #[arg(long)]
        max_comments: Option<u32>,
    },

    /// Reply to exactly one post, then exit
    Once,

    /// Validate the configuration and list the models the backend offers
    Check,
}
