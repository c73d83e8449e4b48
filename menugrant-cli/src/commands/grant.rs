use menugrant_core::{NodeId, RoleSession};

use super::load_role;
use super::show::print_tree;

pub async fn handle_grant(
    session: &RoleSession,
    role: &str,
    toggles: &[i64],
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_role(session, role).await?;
    for &id in toggles {
        let state = session.toggle(NodeId(id))?;
        println!(
            "Toggled {} -> {}",
            id,
            if state.is_granted(NodeId(id)) {
                "granted"
            } else {
                "revoked"
            }
        );
    }

    session.expand_all();
    if let Some(snapshot) = session.snapshot() {
        print_tree(&snapshot);
    }

    let payload = session.payload()?;
    println!("Payload: {}", format_ids(&payload));

    if save {
        session.save().await?;
        println!("Saved {} menu ids for role {}", payload.len(), role);
    } else {
        println!("Not saved (pass --save to persist)");
    }
    Ok(())
}

pub async fn handle_payload(
    session: &RoleSession,
    role: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    load_role(session, role).await?;
    let payload = session.payload()?;
    let ids: Vec<i64> = payload.iter().map(|id| id.0).collect();
    println!("{}", serde_json::to_string(&ids)?);
    Ok(())
}

fn format_ids(ids: &[NodeId]) -> String {
    if ids.is_empty() {
        return "(empty)".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
