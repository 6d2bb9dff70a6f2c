//! `webagent config`: configuration management.

use webagent_config::AppConfig;

pub async fn run(print_default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if print_default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed and validated");

    let mut warnings = Vec::new();
    for (id, provider) in &config.providers {
        if provider.resolved_api_key().is_none() {
            warnings.push(format!(
                "Provider '{id}' has no API key (set one of: {})",
                provider.api_key_envs.join(", ")
            ));
        }
    }
    if config.tools.search_api_key.is_none() {
        warnings.push("No search API key; web_search and fetch_url_content will fail (set EXA_API_KEY)".into());
    }

    if !warnings.is_empty() {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Config file:   {}", AppConfig::config_dir().join("config.toml").display());
    println!("   Default model: {}", config.default_model);
    println!("   Models:        {}", config.models.len());
    println!("   Gateway:       {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Tool rounds:   {} (reflection rounds: {})",
        config.agent.max_tool_rounds, config.agent.max_reflection_rounds
    );

    Ok(())
}
