use authproxy_core::UnknownSessionPolicy;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;

#[derive(Parser)]
#[command(
    name = "authproxy",
    about = "authproxy - long-poll broker for browser login flows",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub serve: ServeArgs,

    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the broker and HTTP server (default if no command specified)")]
    Serve,

    #[command(about = "Print the effective configuration and exit")]
    Config {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[arg(short, long, env = "AUTHPROXY_PORT", default_value = "8426", global = true)]
    pub port: u16,

    #[arg(long, env = "AUTHPROXY_BIND", default_value = "0.0.0.0", global = true)]
    pub bind: IpAddr,

    #[arg(
        long,
        env = "AUTHPROXY_PREFIX",
        default_value = "/authproxy",
        global = true,
        help = "Path prefix for the auth, poll and complete routes"
    )]
    pub prefix: String,

    #[arg(
        long,
        env = "AUTHPROXY_PUBLIC_URL",
        global = true,
        help = "Externally visible base URL used in completion callbacks (default: http://<Host header>)"
    )]
    pub public_url: Option<String>,

    #[arg(long, env = "AUTHPROXY_LONG_POLL_TIMEOUT", default_value = "60", global = true, help = "Seconds a poll may wait")]
    pub long_poll_timeout: u64,

    #[arg(long, env = "AUTHPROXY_SESSION_TTL", default_value = "600", global = true, help = "Seconds a session lives after start or finish")]
    pub session_ttl: u64,

    #[arg(long, env = "AUTHPROXY_SWEEP_INTERVAL", default_value = "60", global = true, help = "Seconds between timeout sweeps")]
    pub sweep_interval: u64,

    #[arg(
        long,
        env = "AUTHPROXY_UNKNOWN_SESSION",
        default_value = "strict",
        global = true,
        help = "Poll for an unknown id: 'strict' answers not-found, 'lenient' creates the session"
    )]
    pub unknown_session: UnknownSessionPolicy,
}
