// SPDX-FileCopyrightText: © 2025 Weave Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

mod cli;
mod logging;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let log_config = logging::LogConfig { console_level: &cli.log_level, file_path: cli.log_file.as_deref() };
    let _log_guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            std::process::exit(2);
        },
    };

    cli::handle_command(&cli).await;
}
