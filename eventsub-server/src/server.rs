use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{anyhow, Context};
use axum_server::Handle;
use tracing::{error, info, warn};

use eventsub_common::models::{Condition, ConditionKind, SubscriptionType};
use eventsub_core::eventbus::WILDCARD;
use eventsub_core::{ClientConfig, ClientEvent, EventSubClient};

use crate::Args;

/// Splits a `--subscribe` value of the form `type:broadcaster_id`.
///
/// Only types whose condition is a single user or broadcaster id can be
/// expressed this way.
fn parse_subscription(raw: &str) -> anyhow::Result<(SubscriptionType, Condition)> {
    let (kind, id) = raw
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("expected TYPE:BROADCASTER_ID, got '{raw}'"))?;
    let sub_type: SubscriptionType = kind.parse().map_err(|e: String| anyhow!(e))?;
    let condition = match sub_type.condition_kind() {
        ConditionKind::BroadcasterUserId | ConditionKind::CustomReward => Condition::broadcaster(id),
        ConditionKind::ChannelRaid => Condition::raid_to(id),
        ConditionKind::UserId => Condition::user(id),
        kind @ (ConditionKind::ExtensionClientId
        | ConditionKind::ClientId
        | ConditionKind::DropEntitlementGrant) => {
            return Err(anyhow!(
                "{sub_type} needs a {kind} condition and cannot be given as --subscribe {raw}; \
                 subscribe to it through the library instead"
            ));
        }
    };
    Ok((sub_type, condition))
}

fn refresh_interval(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ClientConfig::new(args.host.as_str())
        .path(args.path.as_str())
        .refresh_interval(refresh_interval(args.refresh_hours))
        .from_env();
    if let Some(port) = args.port {
        config = config.port(port);
    }
    let client = EventSubClient::new(config)?;

    client.on(WILDCARD, |event| match event {
        ClientEvent::Notification(n) => info!("[EventSub] {} => {}", n.event_type, n.event),
        ClientEvent::Error(e) => warn!("[EventSub] webhook error: {}", e),
        ClientEvent::TokenRefreshed { .. } => info!("[EventSub] access token refreshed"),
        ClientEvent::TokenRefreshFailed { attempts, error } => {
            error!("[EventSub] token refresh failed after {} attempt(s): {}", attempts, error)
        }
        ClientEvent::SubscriptionFailed { request, error } => {
            error!("[EventSub] could not subscribe to {}: {}", request.sub_type, error)
        }
        other => info!("[EventSub] {}", other.name()),
    });

    for raw in &args.subscribe {
        let (sub_type, condition) = parse_subscription(raw)?;
        client.subscribe(sub_type, condition).await?;
    }

    let addr: SocketAddr = args
        .bind
        .parse()
        .with_context(|| format!("invalid --bind address '{}'", args.bind))?;
    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; shutting down.");
        }
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    let app = client.router();
    let server = tokio::spawn(
        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service()),
    );
    info!("Webhook listener on http://{} (public callback {})", addr, client.callback_url());

    // the listener must be up before Twitch sends the verification challenge
    client.start().await?;

    match server.await {
        Ok(Ok(())) => info!("Webhook server shut down."),
        Ok(Err(e)) => error!("Webhook server error: {}", e),
        Err(e) => error!("Webhook server task failed: {}", e),
    }
    client.shutdown().await;
    Ok(())
}
