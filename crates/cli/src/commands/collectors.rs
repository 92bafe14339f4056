//! `ctxpack collectors` — list the built-in collectors.

use ctxpack_collectors::builtin_collectors;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Built-in collectors (registration order):\n");
    println!("  {:<18} {:<9} {:<8} {:>8}  DESCRIPTION", "NAME", "KIND", "VERSION", "PRIORITY");
    for collector in builtin_collectors() {
        let meta = collector.metadata();
        println!(
            "  {:<18} {:<9} {:<8} {:>8}  {}",
            meta.name,
            meta.kind.to_string(),
            meta.version,
            collector.priority(),
            meta.description
        );
    }
    Ok(())
}
