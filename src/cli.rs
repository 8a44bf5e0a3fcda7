use clap::{Parser, Subcommand};

/// Leadhub: credential gateway for the Lark Base lead tracker
#[derive(Parser)]
#[command(name = "leadhub-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compute JSAPI sign parameters for a ticket without calling the platform
    Sign {
        #[arg(long)]
        ticket: String,
        #[arg(long, env = "LARK_APP_ID")]
        app_id: String,
        /// Pre-shared nonce
        #[arg(long, env = "LARK_NONCESTR")]
        nonce: String,
        /// Page URL exactly as the client SDK sees it
        #[arg(long)]
        url: String,
        /// Milliseconds since the Unix epoch (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Exchange both credential pairs for tenant tokens and report the result
    Check,
}
