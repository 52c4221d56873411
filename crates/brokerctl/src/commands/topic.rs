//! Topic commands

use super::{CommandContext, run_in_session, with_spinner};
use crate::cli::TopicCommands;
use crate::connection::Session;
use crate::error::{BrokerCtlError, Result as CliResult};
use crate::output;
use brokerctl_core::NewTopic;
use serde::Serialize;
use tracing::debug;

/// Printed after a topic command succeeds
#[derive(Debug, Serialize)]
struct TopicChange<'a> {
    topic: &'a str,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    partitions: Option<i32>,
}

pub async fn handle_topic_command(cmd: &TopicCommands, ctx: &CommandContext<'_>) -> CliResult<()> {
    let change = match cmd {
        TopicCommands::Create {
            name,
            partitions,
            replication_factor,
            configs,
            timeout,
        } => {
            let topic = configs.iter().fold(
                NewTopic::new(name.as_str(), *partitions, *replication_factor),
                |topic, (k, v)| topic.set(k.as_str(), v.as_str()),
            );
            debug!(?topic, "creating topic");

            run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    format!("Creating topic {}", name),
                    session.client.create_topic(topic, timeout),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;

            TopicChange {
                topic: name,
                action: "created",
                partitions: (*partitions > 0).then_some(*partitions),
            }
        }
        TopicCommands::Delete { name, timeout } => {
            run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    format!("Deleting topic {}", name),
                    session.client.delete_topic(name, timeout),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;

            TopicChange {
                topic: name,
                action: "deleted",
                partitions: None,
            }
        }
        TopicCommands::AddPartitions {
            name,
            total,
            timeout,
        } => {
            run_in_session(ctx, async |session: &Session| {
                let timeout = session.timeout(timeout.timeout_ms);
                with_spinner(
                    format!("Growing {} to {} partitions", name, total),
                    session.client.create_partitions(name, *total, timeout),
                )
                .await
                .map_err(BrokerCtlError::from)
            })
            .await?;

            TopicChange {
                topic: name,
                action: "partitions added",
                partitions: Some(*total),
            }
        }
    };

    output::print_output(&change, ctx.output, ctx.query)
}
