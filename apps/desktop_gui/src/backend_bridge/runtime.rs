//! Backend worker: a dedicated thread running a tokio runtime that drives
//! the session coordinator.
//!
//! Commands are handled strictly one at a time off a bounded channel; this
//! loop is the serialization point that keeps transcript order equal to
//! submission order no matter how request latencies interleave.

use std::{sync::Arc, thread};

use client_core::{ActivityFlag, HttpRagBackend, QueryOutcome, SessionCoordinator, SessionError};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;

pub fn launch(
    server_url: String,
    activity: ActivityFlag,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Notice(format!(
                    "Backend worker startup failure: could not build runtime: {err}"
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let backend = Arc::new(HttpRagBackend::new(server_url));
            let mut session = SessionCoordinator::with_activity_flag(backend, activity);

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::UploadDocument { kind, path } => {
                        let filename = path
                            .file_name()
                            .and_then(|name| name.to_str())
                            .unwrap_or("document")
                            .to_string();
                        let bytes = match tokio::fs::read(&path).await {
                            Ok(bytes) => bytes,
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Notice(format!(
                                    "Could not read {}: {err}",
                                    path.display()
                                )));
                                continue;
                            }
                        };
                        match session.upload_document(kind, &filename, bytes).await {
                            Ok(ack) => {
                                let _ = ui_tx.try_send(UiEvent::DocumentRegistered {
                                    record: ack.record,
                                    message: ack.message,
                                });
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Notice(format!(
                                    "Upload failed: {err}"
                                )));
                            }
                        }
                    }
                    BackendCommand::RemoveDocument { id } => {
                        session.remove_document(id);
                        let _ = ui_tx.try_send(UiEvent::DocumentRemoved { id });
                    }
                    BackendCommand::SubmitQuery { text } => {
                        match session.submit_query(&text).await {
                            Ok(QueryOutcome::Ignored) => {}
                            Ok(QueryOutcome::Answered { user, assistant }) => {
                                let _ = ui_tx.try_send(UiEvent::QueryAnswered { user, assistant });
                            }
                            Ok(QueryOutcome::Failed { user, error }) => {
                                let _ = ui_tx.try_send(UiEvent::QueryFailed {
                                    user,
                                    notice: error.to_string(),
                                });
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Notice(format!(
                                    "Request rejected: {err}"
                                )));
                            }
                        }
                    }
                    BackendCommand::ResetConversation => match session.reset_conversation().await {
                        Ok(()) => {
                            let _ = ui_tx.try_send(UiEvent::SessionReset { notice: None });
                        }
                        Err(SessionError::Busy) => {
                            let _ = ui_tx.try_send(UiEvent::Notice(
                                "Request rejected: another request is still in flight".to_string(),
                            ));
                        }
                        Err(err) => {
                            // Local transcript and registry are already
                            // cleared at this point.
                            let _ = ui_tx.try_send(UiEvent::SessionReset {
                                notice: Some(format!("Backend reset failed: {err}")),
                            });
                        }
                    },
                }
            }
        });
    });
}
