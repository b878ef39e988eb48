//! Cart pricing.
//!
//! The cart lives in memory for the duration of the command, so this is a
//! quote rather than a persisted basket.

#![allow(clippy::print_stdout)]

use agent_market_client::{Error, Marketplace};
use agent_market_core::AgentId;

use super::CliError;

/// Add each agent (repeats increase quantity) and print the cart.
///
/// # Errors
///
/// Returns a login-required error when signed out, or the lookup error for
/// an unknown agent.
pub async fn build(market: &Marketplace, ids: &[i64]) -> Result<(), CliError> {
    if !market.session().is_authenticated() {
        return Err(Error::Unauthenticated {
            login_required: true,
        }
        .into());
    }

    for &id in ids {
        let agent = market.catalog().agent_detail(AgentId::new(id)).await?;
        market.store().add_to_cart(agent)?;
    }

    let cart = market.store().snapshot().cart;
    for line in cart.lines() {
        println!(
            "{:>3} x {:<32} {:>10}",
            line.quantity,
            line.agent.name,
            line.line_total().to_string()
        );
    }
    println!("{} item(s), subtotal {}", cart.item_count(), cart.subtotal());
    Ok(())
}
