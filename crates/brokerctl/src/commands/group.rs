//! Consumer group commands

use super::{CommandContext, run_in_session, with_spinner};
use crate::cli::{GroupCommands, OutputFormat};
use crate::connection::Session;
use crate::error::{BrokerCtlError, Result as CliResult};
use crate::output;
use brokerctl_core::{GroupDeletion, GroupDescription, ListGroupsResult};
use colored::Colorize;
use serde::Serialize;

pub async fn handle_group_command(cmd: &GroupCommands, ctx: &CommandContext<'_>) -> CliResult<()> {
    match cmd {
        GroupCommands::List { states, timeout } => {
            let match_states = (!states.is_empty()).then(|| states.clone());
            let listed = run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    "Listing consumer groups".to_string(),
                    session.client.list_groups(match_states, Some(timeout)),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;
            print_listing(listed, ctx)
        }
        GroupCommands::Describe {
            groups,
            include_authorized_operations,
            timeout,
        } => {
            let described = run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    format!("Describing {} group(s)", groups.len()),
                    session.client.describe_groups(
                        groups.clone(),
                        *include_authorized_operations,
                        Some(timeout),
                    ),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;
            print_descriptions(&described, ctx)
        }
        GroupCommands::Delete { groups, timeout } => {
            let deleted = run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    format!("Deleting {} group(s)", groups.len()),
                    session.client.delete_groups(groups.clone(), Some(timeout)),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;
            print_deletions(&deleted, ctx)
        }
    }
}

fn is_table(ctx: &CommandContext<'_>) -> bool {
    output::resolve_format(ctx.output, ctx.query) == OutputFormat::Table
}

fn print_listing(listed: ListGroupsResult, ctx: &CommandContext<'_>) -> CliResult<()> {
    if !is_table(ctx) {
        return output::print_output(&listed, ctx.output, ctx.query);
    }

    output::print_output(&listed.groups, OutputFormat::Table, None)?;
    for err in &listed.errors {
        eprintln!("{}: {} ({})", "warning".yellow().bold(), err.message, err.name);
    }
    Ok(())
}

/// One table row per member; groups without members get a single row
#[derive(Serialize)]
struct MemberRow<'a> {
    group_id: &'a str,
    state: String,
    coordinator: Option<i32>,
    member_id: Option<&'a str>,
    client_id: Option<&'a str>,
    host: Option<&'a str>,
    assignment: Option<String>,
}

fn print_descriptions(described: &[GroupDescription], ctx: &CommandContext<'_>) -> CliResult<()> {
    if !is_table(ctx) {
        return output::print_output(described, ctx.output, ctx.query);
    }

    let mut rows = Vec::new();
    for group in described {
        if let Some(err) = &group.error {
            eprintln!(
                "{}: group '{}': {} ({})",
                "warning".yellow().bold(),
                group.group_id,
                err.message,
                err.name
            );
            continue;
        }
        let base = MemberRow {
            group_id: &group.group_id,
            state: group.state.to_string(),
            coordinator: group.coordinator.as_ref().map(|n| n.id),
            member_id: None,
            client_id: None,
            host: None,
            assignment: None,
        };
        if group.members.is_empty() {
            rows.push(base);
            continue;
        }
        for member in &group.members {
            let assignment = member
                .assignment
                .iter()
                .map(|(topic, partitions)| {
                    let parts: Vec<String> = partitions.iter().map(i32::to_string).collect();
                    format!("{}[{}]", topic, parts.join(","))
                })
                .collect::<Vec<_>>()
                .join(" ");
            rows.push(MemberRow {
                member_id: Some(&member.member_id),
                client_id: Some(&member.client_id),
                host: Some(&member.host),
                assignment: Some(assignment),
                state: base.state.clone(),
                ..base
            });
        }
    }
    output::print_output(&rows, OutputFormat::Table, None)
}

fn print_deletions(deleted: &[GroupDeletion], ctx: &CommandContext<'_>) -> CliResult<()> {
    output::print_output(deleted, ctx.output, ctx.query)?;

    let failed = deleted.iter().filter(|d| !d.is_ok()).count();
    if failed > 0 {
        return Err(BrokerCtlError::OperationError {
            message: format!("{} of {} group deletion(s) failed", failed, deleted.len()),
        });
    }
    Ok(())
}
