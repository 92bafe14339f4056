//! `ctxpack onboard` — write a starter configuration.

use std::path::Path;

use ctxpack_config::AppConfig;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_file(config_path);

    println!("ctxpack — First-Time Setup");
    println!("==========================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created config.toml at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. List required_aspects under [context] if some context is mandatory");
    println!("   2. Run: ctxpack gather --task \"...\" --kind bug-fixing --param error_log=\"...\"\n");

    Ok(())
}
