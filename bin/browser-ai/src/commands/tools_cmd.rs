use browser_ai_tools::Backend;

use super::{connect_backend, load_config, Overrides};

/// List the capabilities advertised by the automation backend.
pub async fn list(overrides: &Overrides) -> anyhow::Result<()> {
    let (_, config) = load_config(overrides)?;
    let backend = connect_backend(&config).await?;
    let capabilities = backend.list_capabilities().await;
    backend.shutdown().await;
    let capabilities = capabilities?;

    println!();
    println!("🔧 Backend tools ({} total)", capabilities.len());
    println!();
    for cap in &capabilities {
        let first_line = cap.description.lines().next().unwrap_or("");
        let short: String = first_line.chars().take(70).collect();
        let ellipsis = if first_line.chars().count() > 70 { "..." } else { "" };
        println!("  {:<28} {}{}", cap.name, short, ellipsis);
    }
    println!();
    Ok(())
}
