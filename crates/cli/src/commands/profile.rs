//! Profile commands.
//!
//! # Usage
//!
//! ```bash
//! amk profile update --name "Ada King"
//! amk profile avatar ./me.png
//! amk profile password --current old --new s3cret --confirm s3cret
//! ```

#![allow(clippy::print_stdout)]

use std::path::Path;

use agent_market_client::Marketplace;
use agent_market_client::session::forms::{AvatarUpload, PasswordChange, ProfileUpdate};

use super::CliError;

/// Update name and/or email.
///
/// # Errors
///
/// Returns a validation error when neither field is given.
pub async fn update(
    market: &Marketplace,
    name: Option<String>,
    email: Option<String>,
) -> Result<(), CliError> {
    let user = market
        .session()
        .update_profile(ProfileUpdate { name, email })
        .await?;
    println!("Profile updated: {} <{}>", user.name, user.email);
    Ok(())
}

/// Upload a new avatar.
///
/// # Errors
///
/// Returns a validation error for non-images or files over 5 MiB.
pub async fn avatar(market: &Marketplace, path: &Path) -> Result<(), CliError> {
    let upload = AvatarUpload::from_path(path).await?;
    let reference = market.session().upload_avatar(upload).await?;
    println!("Avatar updated: {}", market.media_url(&reference));
    Ok(())
}

/// Change password.
///
/// # Errors
///
/// Returns a mismatch error, without contacting the server, when `new` and
/// `confirm` differ.
pub async fn password(
    market: &Marketplace,
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<(), CliError> {
    let message = market
        .session()
        .change_password(PasswordChange::new(current, new, confirm))
        .await?;
    println!("{message}");
    Ok(())
}
