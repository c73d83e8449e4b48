use menugrant_core::{RoleSession, SessionSnapshot};

use super::load_role;

pub async fn handle_roles(session: &RoleSession) -> Result<(), Box<dyn std::error::Error>> {
    let roles = session.start().await?;
    if roles.is_empty() {
        println!("No roles found");
    } else {
        for role in roles {
            println!("{}  {}", role.role_code, role.display_name);
        }
    }
    Ok(())
}

pub async fn handle_show(
    session: &RoleSession,
    role: &str,
    expand_all: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    load_role(session, role).await?;
    if expand_all {
        session.expand_all();
    }
    let snapshot = session.snapshot().ok_or("no menu tree loaded")?;

    if json {
        let forest = snapshot.tree.to_data(Some(&snapshot.selection));
        println!("{}", serde_json::to_string_pretty(&forest)?);
        return Ok(());
    }

    println!(
        "Role: {} ({} of {} granted)",
        snapshot.role_code,
        snapshot.selection.granted_count(),
        snapshot.tree.len()
    );
    print_tree(&snapshot);
    Ok(())
}

pub(crate) fn print_tree(snapshot: &SessionSnapshot) {
    for (id, depth) in snapshot.expansion.visible(&snapshot.tree) {
        let Some(node) = snapshot.tree.node(id) else {
            continue;
        };
        let marker = if snapshot.tree.is_leaf(id) {
            " "
        } else if snapshot.expansion.is_expanded(id) {
            "-"
        } else {
            "+"
        };
        let check = if snapshot.selection.is_granted(id) {
            "x"
        } else {
            " "
        };
        let href = node.href().map(|h| format!("  {}", h)).unwrap_or_default();
        println!(
            "{}{} [{}] {} {}{}",
            "  ".repeat(depth),
            marker,
            check,
            id,
            node.title(),
            href
        );
    }
}
