//! `webagent serve`: start the HTTP API server.

pub async fn run(
    host_override: Option<String>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(host) = host_override {
        config.gateway.host = host;
    }
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("webagent gateway");
    println!("   Listening:     {}:{}", config.gateway.host, config.gateway.port);
    println!("   Default model: {}", config.default_model);
    println!("   CORS origins:  {}", config.gateway.cors_origins.join(", "));

    webagent_gateway::start(config).await?;

    Ok(())
}
