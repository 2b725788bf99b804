// Copyright 2025 Fernando Borretti
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

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::cmd::check::check_installation;
use crate::cmd::leaderboard::print_leaderboard;
use crate::cmd::logs::print_logs;
use crate::cmd::serve::serve;
use crate::error::Fallible;
use crate::settings::ManagerSettings;
use crate::stats::SortKey;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the settings file. Defaults to `acc-manager.toml` if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to the server installation. Overrides `ACC_SERVER_PATH`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Validate the installation and summarise the data in it.
    Check,
    /// Print the leaderboard bundle as JSON.
    Leaderboard {
        /// Sort key for the leaderboard.
        #[arg(long, value_enum)]
        sort_by: Option<SortKey>,
        /// Only drivers who raced in this car category.
        #[arg(long)]
        category: Option<String>,
    },
    /// Print the last lines of the server's logs.
    Logs {
        /// Number of lines.
        #[arg(long, short = 'n')]
        lines: Option<usize>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    let mut settings = ManagerSettings::load(cli.config.as_deref())?.with_env();
    if let Some(root) = cli.root {
        settings.root = Some(root);
    }
    match cli.command {
        Command::Serve { bind } => serve(settings, bind).await,
        Command::Check => check_installation(settings).await,
        Command::Leaderboard { sort_by, category } => {
            print_leaderboard(settings, sort_by, category).await
        }
        Command::Logs { lines } => print_logs(settings, lines).await,
    }
}
