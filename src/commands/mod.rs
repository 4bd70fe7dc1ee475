//! Subcommands shared by the CLI and the library API

pub mod check;
pub mod clean;
pub mod generate;
pub mod init;
pub mod list;
pub mod new;
pub mod publish;
