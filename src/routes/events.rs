// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live workout view over Server-Sent Events.
//!
//! Each connection owns a [`WorkoutContext`]. Change-feed callbacks push the
//! changed table into a channel; the stream drains it, refetches the
//! affected slices and emits a fresh `snapshot` event. If the viewed alias
//! is renamed or deleted the stream sends `alias_gone` and ends; the client
//! reconnects with the new name. Dropping the stream drops the
//! subscriptions and shuts the context down.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use futures_util::stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::db::{Subscription, Table};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::routes::api::parse_day;
use crate::services::{WorkoutContext, WorkoutService, WorkoutSnapshot};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/events", get(events))
}

#[derive(Deserialize)]
pub struct EventParams {
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    day: Option<String>,
}

struct LiveView {
    context: WorkoutContext,
    changes: mpsc::UnboundedReceiver<Table>,
    _subscriptions: Vec<Subscription>,
    sent_initial: bool,
}

impl Drop for LiveView {
    fn drop(&mut self) {
        self.context.shut_down();
    }
}

fn snapshot_event(snapshot: &WorkoutSnapshot) -> Event {
    Event::default()
        .event("snapshot")
        .json_data(snapshot)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

async fn events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<EventParams>,
) -> Result<Sse<impl tokio_stream::Stream<Item = std::result::Result<Event, Infallible>>>> {
    let day = params.day.as_deref().map(parse_day).transpose()?;
    let alias = match params.alias {
        Some(alias) => {
            WorkoutService::new(state.db.as_ref(), &user.auth_id)
                .owned_alias(&alias)
                .await?
        }
        None => state.db.get_primary_alias(&user.auth_id).await?,
    };

    let mut context = WorkoutContext::new(state.db.clone(), &user.auth_id, &alias.username, day);
    context.load().await?;

    let (tx, changes) = mpsc::unbounded_channel();
    let subscriptions = context.subscribe(tx);
    tracing::debug!(auth_id = %user.auth_id, alias = %alias.username, "Live view opened");

    let view = LiveView {
        context,
        changes,
        _subscriptions: subscriptions,
        sent_initial: false,
    };

    Ok(Sse::new(live_stream(view)).keep_alive(KeepAlive::default()))
}

fn live_stream(
    view: LiveView,
) -> impl tokio_stream::Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold(view, |mut view| async move {
        if !view.sent_initial {
            view.sent_initial = true;
            let event = snapshot_event(view.context.snapshot());
            return Some((Ok::<_, Infallible>(event), view));
        }
        if !view.context.is_live() {
            return None;
        }

        loop {
            let Some(first) = view.changes.recv().await else {
                return None;
            };

            // Coalesce a burst of writes into one refetch per table.
            let mut pending = vec![first];
            while let Ok(table) = view.changes.try_recv() {
                if !pending.contains(&table) {
                    pending.push(table);
                }
            }

            let mut changed = false;
            for table in pending {
                match view.context.refresh(table).await {
                    Ok(applied) => changed |= applied,
                    Err(e) => {
                        tracing::warn!(?table, error = %e, "Live view refresh failed");
                        let event = Event::default().event("error").data(e.to_string());
                        return Some((Ok(event), view));
                    }
                }
            }

            if !view.context.is_live() {
                return None;
            }
            if view.context.alias_gone() {
                let alias = view.context.snapshot().alias.clone();
                tracing::info!(%alias, "Viewed alias is gone, closing live view");
                view.context.shut_down();
                let event = Event::default().event("alias_gone").data(alias);
                return Some((Ok(event), view));
            }
            if changed {
                let event = snapshot_event(view.context.snapshot());
                return Some((Ok(event), view));
            }
        }
    })
}
