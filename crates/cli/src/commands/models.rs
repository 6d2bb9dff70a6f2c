//! `webagent models`: list configured models.

use webagent_providers::ModelRegistry;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = ModelRegistry::from_config(&config);
    let payload = registry.models_payload();

    println!("Configured models");
    println!("=================");
    println!();
    for model in payload["data"].as_array().into_iter().flatten() {
        let marker = if model["default"].as_bool().unwrap_or(false) {
            "*"
        } else {
            " "
        };
        let available = if model["available"].as_bool().unwrap_or(false) {
            "ready"
        } else {
            "no API key"
        };
        let streaming = if model["supports_streaming"].as_bool().unwrap_or(false) {
            "streaming"
        } else {
            "complete-only"
        };
        println!(
            " {marker} {:<34} {:<26} {:<14} {available}",
            model["id"].as_str().unwrap_or_default(),
            model["model_name"].as_str().unwrap_or_default(),
            streaming,
        );
    }
    println!();
    println!("  * default model");

    Ok(())
}
