//! Fukurow CLI
//!
//! スナップショットを読み込み、実現化の結果を表示するコマンドラインツール

pub mod commands;
pub mod snapshot;

pub use commands::{Cli, CommandExecutor, CommandResult, Commands, OutputFormat};
pub use snapshot::Snapshot;
