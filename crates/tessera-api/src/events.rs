//! `GET /applications/{id}/events`: live status updates as server-sent
//! events.
//!
//! The connection joins the application's topic when it opens and leaves it
//! when the client goes away. Each committed status change arrives as one
//! `status_updated` event whose data is the JSON [`StatusUpdated`] payload.
//! Events published before the connection opened are not replayed.

use axum::{
  extract::{Path, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use tessera_core::{lifecycle::StatusUpdated, store::ApplicationStore};
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, actor::StaffActor, error::ApiError};

fn sse_event(update: &StatusUpdated) -> Result<Event, axum::Error> {
  Event::default().event(StatusUpdated::EVENT).json_data(update)
}

pub async fn subscribe<S>(
  State(state): State<AppState<S>>,
  StaffActor(actor): StaffActor,
  Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError>
where
  S: ApplicationStore + 'static,
{
  // 404 for unknown applications rather than an idle stream.
  state.engine.get(id).await?;

  let listener = state.fanout.listen(id);
  debug!(application_id = %id, staff_id = %actor.staff_id, "event stream opened");

  let events = stream::unfold(listener, |mut listener| async move {
    let update = listener.recv().await?;
    Some((sse_event(&update), listener))
  });
  Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
