pub mod grant;
pub mod show;

use menugrant_core::{LoadOutcome, RoleSession};

pub(crate) async fn load_role(
    session: &RoleSession,
    role: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    session.start().await?;
    match session.select_role(role).await? {
        LoadOutcome::Applied => Ok(()),
        LoadOutcome::Stale => Err(format!("menu tree for role {} was superseded", role).into()),
    }
}
