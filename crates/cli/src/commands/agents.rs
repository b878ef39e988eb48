//! Catalog commands.
//!
//! # Usage
//!
//! ```bash
//! amk agents list --category sales --min-price 10 --max-price 50
//! amk agents show 12
//! amk agents download 12 --output ./downloads/
//! ```

#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;

use agent_market_client::catalog::{CatalogQuery, LoadState};
use agent_market_client::models::Agent;
use agent_market_client::{Error, Marketplace, ValidationError};
use agent_market_core::{AgentId, Category, Price, PriceRange, SortKey};

use super::CliError;

/// List agents matching the given selection.
///
/// # Errors
///
/// Returns `CliError::Catalog` when the listing fails and a validation error
/// for inverted or negative price bounds.
pub async fn list(
    market: &Marketplace,
    category: Option<Category>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    sort: Option<SortKey>,
) -> Result<(), CliError> {
    let defaults = PriceRange::default();
    let price_range = PriceRange::new(
        min_price.map_or(defaults.min(), Price::new),
        max_price.map_or(defaults.max(), Price::new),
    )
    .map_err(|e| Error::from(ValidationError::from(e)))?;

    let query = CatalogQuery {
        category: category.unwrap_or_default(),
        price_range,
        sort: sort.unwrap_or_default(),
    };

    match market.catalog().set_query(query).await {
        LoadState::Ready(agents) if agents.is_empty() => {
            println!(
                "No agents match {} between {} and {}.",
                query.category,
                price_range.min(),
                price_range.max()
            );
        }
        LoadState::Ready(agents) => {
            for agent in &agents {
                print_row(agent);
            }
            println!("{} agent(s)", agents.len());
        }
        LoadState::Failed(message) => return Err(CliError::Catalog(message)),
        LoadState::Loading => {}
    }
    Ok(())
}

fn print_row(agent: &Agent) {
    println!(
        "{:>6}  {:<32}  {:>10}  {:<18}  {:.1} ({})",
        agent.id,
        truncate(&agent.name, 32),
        agent.price.to_string(),
        agent.category,
        agent.rating,
        agent.reviews_count,
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

/// Print one agent's details.
///
/// # Errors
///
/// Returns the client error; an unknown id reads "could not be found".
pub async fn show(market: &Marketplace, id: i64) -> Result<(), CliError> {
    let agent = market.catalog().agent_detail(AgentId::new(id)).await?;

    println!("{} (#{})", agent.name, agent.id);
    println!("  Price:     {}", agent.price);
    println!("  Category:  {}", agent.category);
    println!(
        "  Rating:    {:.1} from {} reviews, {} sales",
        agent.rating, agent.reviews_count, agent.sales_count
    );
    if let Some(seller) = &agent.seller {
        let badge = if seller.verified { " (verified)" } else { "" };
        println!("  Seller:    {}{badge}", seller.name);
    }
    if let Some(model) = &agent.model {
        println!("  Model:     {model}");
    }
    if !agent.capabilities.is_empty() {
        println!("  Abilities: {}", agent.capabilities.join(", "));
    }
    let thumbnail = agent.thumbnail_url(market.media_origin());
    if !thumbnail.is_empty() {
        println!("  Thumbnail: {thumbnail}");
    }
    println!();
    println!("{}", agent.long_description.as_deref().unwrap_or(&agent.description));
    Ok(())
}

/// Download a purchased agent to `output` (a file or directory).
///
/// # Errors
///
/// Returns a login-required error without a session, a rejection when the
/// agent has not been purchased, and `CliError::Write` on I/O failure.
pub async fn download(
    market: &Marketplace,
    id: i64,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let download = market.download_agent(AgentId::new(id)).await?;

    let target = resolve_target(output.as_deref(), &download.filename).await;
    tokio::fs::write(&target, &download.bytes)
        .await
        .map_err(|source| CliError::Write {
            path: target.display().to_string(),
            source,
        })?;

    println!("Saved {} ({} bytes)", target.display(), download.bytes.len());
    Ok(())
}

/// Directories (existing, or spelled with a trailing separator) receive the
/// server-suggested filename.
async fn resolve_target(output: Option<&Path>, filename: &str) -> PathBuf {
    match output {
        None => PathBuf::from(filename),
        Some(path) => {
            let is_dir = path
                .as_os_str()
                .to_string_lossy()
                .ends_with(std::path::MAIN_SEPARATOR)
                || tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir());
            if is_dir {
                path.join(filename)
            } else {
                path.to_path_buf()
            }
        }
    }
}
