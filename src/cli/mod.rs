//! Command line interface for the AI aggregator gateway

pub mod serve;

use clap::{Parser, Subcommand};

/// AI Aggregator Gateway - one OpenAI-compatible front for several providers
#[derive(Parser, Debug)]
#[command(name = "ai-aggregator-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway HTTP server
    Serve(serve::ServeArgs),
}
