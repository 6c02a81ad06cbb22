use anyhow::Result;

use crate::config::ServerConfig;

#[allow(clippy::print_stdout, reason = "CLI command outputs to stdout")]
pub fn show_config(config: &ServerConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("authproxy configuration");
    println!("  Listen:             {}", config.socket_addr());
    println!("  Auth route:         {}", config.route("/auth"));
    println!("  Poll route:         {}", config.route("/poll"));
    println!("  Complete route:     {}", config.route("/complete"));
    println!(
        "  Callback base:      {}",
        config.public_url.as_deref().unwrap_or("http://<Host header>")
    );
    println!("  Long-poll timeout:  {}s", config.broker.long_poll_timeout_secs);
    println!("  Session TTL:        {}s", config.broker.session_ttl_secs);
    println!("  Sweep interval:     {}s", config.broker.sweep_interval_secs);
    println!("  Unknown session:    {}", config.broker.unknown_session_policy);
    Ok(())
}
