//! Command line interface for EZK Gateway
//!
//! - `serve`: run the HTTP gateway
//! - `check-key`: offline format check of an API key

pub mod check_key;
pub mod serve;

use clap::{Parser, Subcommand};

/// EZK Gateway - credential, quota and metering front door for the OTP service
#[derive(Parser)]
#[command(name = "ezk-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway
    Serve,

    /// Check an API key's shape and checksum without touching any backend
    CheckKey(check_key::CheckKeyArgs),
}
