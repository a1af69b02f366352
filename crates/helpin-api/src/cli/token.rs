//! Credential signing for local testing.

use anyhow::{Context, Result};

use helpin_infra::auth::JwtVerifier;
use helpin_infra::secret::EnvSecrets;
use helpin_types::principal::PrincipalId;

/// Sign a token for `user_id` with `JWT_SECRET` and print it.
pub fn issue_token(user_id: &str, ttl_hours: u32) -> Result<()> {
    let secret = EnvSecrets::from_env()
        .jwt_secret
        .context("JWT_SECRET is not set")?;
    let verifier = JwtVerifier::new(&secret)?;
    let token = verifier.issue(
        &PrincipalId::new(user_id),
        chrono::Duration::hours(i64::from(ttl_hours)),
    )?;
    println!("{token}");
    Ok(())
}
