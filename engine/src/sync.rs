//! The long-poll sync loop.
//!
//! A single task owns the [`SyncState`]. It keeps exactly one pull in flight
//! and serves commands from [`SyncHandle`]s between pull completions, so
//! merges and local edits never interleave. Pushes are queued to a single
//! upload task: each uploads a copy of the state taken when the edit was
//! applied, in the order the edits were applied, and reports its outcome
//! through a [`PushTicket`].
//!
//! A failed or timed-out pull is retried after a backoff with the *same*
//! version, so a failure never skips a version.

use crate::{
    config::SyncOptions,
    entity::{Entity, LatLng, PolylineType},
    error::Result,
    reconcile::MergeReport,
    session::Edit,
    state::SyncState,
    store::SearchHit,
    transport::Transport,
    wire::SnapshotDoc,
    EntityId, Error, LayerName, SyncVersion,
};
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 64;

/// Outcome of one push, resolved once the server answered.
#[derive(Debug)]
pub struct PushTicket {
    outcome: oneshot::Receiver<Result<()>>,
}

impl PushTicket {
    /// Wait for the push to finish.
    pub async fn outcome(self) -> Result<()> {
        self.outcome.await.map_err(|_| Error::LoopStopped)?
    }
}

/// What an edit did, plus the push it triggered, if any.
#[derive(Debug)]
pub struct EditReceipt {
    pub id: Option<EntityId>,
    pub push: Option<PushTicket>,
}

struct Upload {
    doc: SnapshotDoc,
    reply: oneshot::Sender<Result<()>>,
}

enum Command {
    Edit {
        edit: Edit,
        reply: oneshot::Sender<Result<EditReceipt>>,
    },
    Document {
        reply: oneshot::Sender<SnapshotDoc>,
    },
    Entity {
        id: EntityId,
        reply: oneshot::Sender<Option<Entity>>,
    },
    Search {
        prefix: String,
        reply: oneshot::Sender<Vec<SearchHit>>,
    },
}

/// Drives a [`SyncState`] against a server.
pub struct SyncLoop<T: Transport> {
    state: SyncState,
    transport: T,
    options: SyncOptions,
    commands: mpsc::Receiver<Command>,
    /// Started on the first push.
    uploads: Option<mpsc::UnboundedSender<Upload>>,
}

impl<T: Transport> SyncLoop<T> {
    /// Create a loop and the handle used to talk to it.
    pub fn new(state: SyncState, transport: T, options: SyncOptions) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let sync = Self {
            state,
            transport,
            options,
            commands: rx,
            uploads: None,
        };
        (sync, SyncHandle { commands: tx })
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SyncState {
        &mut self.state
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Fetch and merge the current document.
    ///
    /// Failure here is not retried; call again to retry.
    pub async fn bootstrap(&mut self) -> Result<MergeReport> {
        let doc = self.transport.fetch().await?;
        let report = self.state.merge_document(doc)?;
        tracing::info!(
            version = %report.version,
            entities = self.state.store().len(),
            "loaded initial state"
        );
        Ok(report)
    }

    /// Run one pull against the current version and merge the result.
    ///
    /// On failure the version cursor is unchanged.
    pub async fn pull_once(&mut self) -> Result<MergeReport> {
        let doc = pull(
            self.transport.clone(),
            self.state.version().cloned(),
            self.options.poll_timeout,
            Duration::ZERO,
        )
        .await?;
        self.absorb(doc)
    }

    fn absorb(&mut self, doc: SnapshotDoc) -> Result<MergeReport> {
        let report = self.state.merge_document(doc)?;
        if report.changed() {
            tracing::info!(
                version = %report.version,
                added = report.added.len(),
                updated = report.updated.len(),
                removed = report.removed.len(),
                "merged snapshot"
            );
        } else {
            tracing::debug!(version = %report.version, "snapshot had no changes");
        }
        Ok(report)
    }

    /// Queue an upload of the whole local state.
    ///
    /// Uploads go out one at a time, in the order queued.
    pub(crate) fn push(&mut self) -> PushTicket {
        let doc = self.state.to_document();
        let (reply, outcome) = oneshot::channel();
        tracing::debug!(entities = doc.markers.len(), "queueing push");

        let transport = self.transport.clone();
        let uploads = self.uploads.get_or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(upload(transport, rx));
            tx
        });
        if uploads.send(Upload { doc, reply }).is_err() {
            tracing::error!("upload task is gone, push dropped");
        }

        PushTicket { outcome }
    }

    /// Bootstrap, then run the loop on a new task.
    pub async fn start(mut self) -> Result<tokio::task::JoinHandle<()>> {
        self.bootstrap().await?;
        Ok(tokio::spawn(self.run()))
    }

    /// Keep one pull in flight and serve commands until every handle is
    /// dropped. The outstanding pull is allowed to finish before returning.
    pub async fn run(mut self) {
        let mut in_flight = self.next_pull(Duration::ZERO);
        let mut accepting = true;

        loop {
            tokio::select! {
                fetched = &mut in_flight => {
                    let delay = match fetched.and_then(|doc| self.absorb(doc)) {
                        Ok(_) => Duration::ZERO,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                version = ?self.state.version(),
                                backoff = ?self.options.retry_backoff,
                                "pull failed, retrying"
                            );
                            self.options.retry_backoff
                        }
                    };
                    if !accepting {
                        break;
                    }
                    in_flight = self.next_pull(delay);
                }
                command = self.commands.recv(), if accepting => match command {
                    Some(command) => self.handle(command),
                    None => {
                        tracing::debug!("all handles dropped, finishing outstanding pull");
                        accepting = false;
                    }
                },
            }
        }

        tracing::info!("sync loop stopped");
    }

    fn next_pull(&self, delay: Duration) -> BoxFuture<'static, Result<SnapshotDoc>> {
        pull(
            self.transport.clone(),
            self.state.version().cloned(),
            self.options.poll_timeout,
            delay,
        )
        .boxed()
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Edit { edit, reply } => {
                let result = match self.state.apply(edit) {
                    Ok(applied) => Ok(EditReceipt {
                        push: applied.push.then(|| self.push()),
                        id: applied.id,
                    }),
                    Err(e) => {
                        tracing::debug!(error = %e, "edit rejected");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Command::Document { reply } => {
                let _ = reply.send(self.state.to_document());
            }
            Command::Entity { id, reply } => {
                let _ = reply.send(self.state.store().get(&id).cloned());
            }
            Command::Search { prefix, reply } => {
                let _ = reply.send(self.state.search(&prefix));
            }
        }
    }
}

/// Drain queued uploads in order until the loop drops its sender.
async fn upload<T: Transport>(transport: T, mut uploads: mpsc::UnboundedReceiver<Upload>) {
    while let Some(Upload { doc, reply }) = uploads.recv().await {
        let outcome = transport.push(&doc).await;
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "couldn't send update, it is not saved on the server");
        }
        let _ = reply.send(outcome);
    }
}

/// One pull: wait out `delay`, then fetch (no version yet) or poll.
async fn pull<T: Transport>(
    transport: T,
    version: Option<SyncVersion>,
    timeout: Duration,
    delay: Duration,
) -> Result<SnapshotDoc> {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let request = async {
        match &version {
            Some(version) => transport.poll(version).await,
            None => transport.fetch().await,
        }
    };
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| Error::PollTimeout)?
}

/// Cloneable handle for issuing edits and queries to a running [`SyncLoop`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
}

impl SyncHandle {
    async fn request<R>(&self, command: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| Error::LoopStopped)?;
        rx.await.map_err(|_| Error::LoopStopped)
    }

    /// Apply an arbitrary edit.
    pub async fn apply(&self, edit: Edit) -> Result<EditReceipt> {
        self.request(|reply| Command::Edit { edit, reply }).await?
    }

    pub async fn create_point(
        &self,
        name: impl Into<String>,
        layer: impl Into<LayerName>,
        position: LatLng,
    ) -> Result<EditReceipt> {
        self.apply(Edit::CreatePoint {
            name: name.into(),
            layer: layer.into(),
            position,
        })
        .await
    }

    pub async fn create_polyline(
        &self,
        layer: impl Into<LayerName>,
        points: Vec<LatLng>,
    ) -> Result<EditReceipt> {
        self.apply(Edit::CreatePolyline {
            layer: layer.into(),
            points,
        })
        .await
    }

    pub async fn move_point(&self, id: impl Into<EntityId>, position: LatLng) -> Result<EditReceipt> {
        self.apply(Edit::Move {
            id: id.into(),
            position,
        })
        .await
    }

    pub async fn begin_move(&self, id: impl Into<EntityId>) -> Result<EditReceipt> {
        self.apply(Edit::BeginMove { id: id.into() }).await
    }

    pub async fn move_to(&self, position: LatLng) -> Result<EditReceipt> {
        self.apply(Edit::MoveTo { position }).await
    }

    pub async fn commit_move(&self) -> Result<EditReceipt> {
        self.apply(Edit::CommitMove).await
    }

    pub async fn cancel_move(&self) -> Result<EditReceipt> {
        self.apply(Edit::CancelMove).await
    }

    pub async fn rename(&self, id: impl Into<EntityId>, name: impl Into<String>) -> Result<EditReceipt> {
        self.apply(Edit::Rename {
            id: id.into(),
            name: name.into(),
        })
        .await
    }

    pub async fn retype(&self, id: impl Into<EntityId>, line_type: PolylineType) -> Result<EditReceipt> {
        self.apply(Edit::Retype {
            id: id.into(),
            line_type,
        })
        .await
    }

    pub async fn delete(&self, id: impl Into<EntityId>) -> Result<EditReceipt> {
        self.apply(Edit::Delete { id: id.into() }).await
    }

    pub async fn change_layer(
        &self,
        id: impl Into<EntityId>,
        layer: impl Into<LayerName>,
    ) -> Result<EditReceipt> {
        self.apply(Edit::ChangeLayer {
            id: id.into(),
            layer: layer.into(),
        })
        .await
    }

    /// Snapshot of the local state.
    pub async fn document(&self) -> Result<SnapshotDoc> {
        self.request(|reply| Command::Document { reply }).await
    }

    pub async fn entity(&self, id: impl Into<EntityId>) -> Result<Option<Entity>> {
        let id = id.into();
        self.request(|reply| Command::Entity { id, reply }).await
    }

    /// Point entities whose name starts with `prefix`.
    pub async fn search(&self, prefix: impl Into<String>) -> Result<Vec<SearchHit>> {
        let prefix = prefix.into();
        self.request(|reply| Command::Search { prefix, reply }).await
    }
}
