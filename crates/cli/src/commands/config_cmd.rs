//! `ctxpack config` — Configuration management commands.

use std::path::Path;

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file = super::config_file(config_path);
    println!("Validating configuration at {}", file.display());

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   OK  Config parsed and validated");

            let mut warnings = Vec::new();
            if !config.context.required_aspects.is_empty() && config.context.reserved_budget_ratio == 0.0 {
                warnings.push("required_aspects are set but reserved_budget_ratio is 0");
            }
            if config.engine.quality_retry && config.engine.min_quality_relevance <= config.context.min_relevance_threshold {
                warnings.push("min_quality_relevance is at or below min_relevance_threshold, relevance alone will only trigger a retry on empty packages");
            }
            for w in &warnings {
                println!("   WARN  {w}");
            }

            println!();
            println!("   Min relevance:   {}", config.context.min_relevance_threshold);
            println!("   Max age (secs):  {}", config.context.context_max_age_secs);
            println!("   Reserved ratio:  {}", config.context.reserved_budget_ratio);
            println!("   Timeout (ms):    {}", config.engine.collector_timeout_ms);
            println!("   Default budget:  {}", config.engine.default_token_budget);
            println!("   Quality retry:   {}", config.engine.quality_retry);
            println!("   Record history:  {}", config.privacy.record_experience);
        }
        Err(e) => {
            println!("   ERROR  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_file(config_path).display());
    Ok(())
}
