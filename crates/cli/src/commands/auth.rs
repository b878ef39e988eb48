//! Session commands.
//!
//! # Usage
//!
//! ```bash
//! amk register -n "Ada Lovelace" -e ada@example.com -p hunter22 -r vendor
//! amk login -e ada@example.com -p hunter22
//! amk whoami
//! amk logout
//! ```

#![allow(clippy::print_stdout)]

use agent_market_client::Marketplace;
use agent_market_client::models::User;
use agent_market_client::session::forms::RegisterRequest;
use agent_market_core::Role;

use super::CliError;

/// Create an account and sign in.
///
/// # Errors
///
/// Returns the validation or backend error.
pub async fn register(
    market: &Marketplace,
    name: String,
    email: String,
    password: String,
    role: Option<Role>,
) -> Result<(), CliError> {
    let form = RegisterRequest {
        name,
        email,
        password: password.into(),
        role,
    };
    let user = market.session().register(form).await?;
    println!("Welcome, {}! You are signed in.", user.name);
    Ok(())
}

/// Sign in.
///
/// # Errors
///
/// Returns the validation or backend error; bad credentials carry the
/// backend's reason.
pub async fn login(market: &Marketplace, email: &str, password: &str) -> Result<(), CliError> {
    let user = market.session().login(email, password).await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

/// Sign out. Always succeeds locally.
pub async fn logout(market: &Marketplace) {
    market.session().logout().await;
    println!("Signed out.");
}

/// Revalidate the stored session and print the account.
pub async fn whoami(market: &Marketplace) {
    match market.session().check_session().await {
        Some(user) => print_user(market, &user),
        None => println!("Not signed in."),
    }
}

fn print_user(market: &Marketplace, user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("  ID:       {}", user.id);
    if let Some(role) = user.role {
        println!("  Role:     {role}");
    }
    println!("  Verified: {}", if user.is_verified { "yes" } else { "no" });
    let avatar = user.avatar_url(market.media_origin());
    if !avatar.is_empty() {
        println!("  Avatar:   {avatar}");
    }
}
