//! The egui application shell.
//!
//! All session state lives with the coordinator on the backend worker; this
//! struct keeps a display mirror (documents, transcript) fed exclusively by
//! [`UiEvent`]s, plus purely presentational state (composer text, pending
//! query echo, transient status notice).

use std::time::Duration;

use client_core::ActivityFlag;
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{ConversationTurn, DocumentKind, DocumentRecord, Role};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::controller::orchestration::dispatch_backend_command;

/// Renders a backend confidence value in [0,1] as a percentage with one
/// decimal place.
fn format_confidence(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

/// Boundary-trims composer input; `None` means nothing should be dispatched.
fn queued_submission(input: &str) -> Option<String> {
    let text = input.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn kind_label(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "PDF",
        DocumentKind::Image => "Image",
    }
}

pub struct DesktopGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    activity: ActivityFlag,

    composer: String,
    /// Echo of the query currently in flight, shown as a user bubble until
    /// the authoritative turn arrives with the settle event.
    pending_query: Option<String>,
    documents: Vec<DocumentRecord>,
    transcript: Vec<ConversationTurn>,
    status: String,
}

impl DesktopGuiApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        activity: ActivityFlag,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            activity,
            composer: String::new(),
            pending_query: None,
            documents: Vec::new(),
            transcript: Vec::new(),
            status: String::new(),
        }
    }

    fn drain_backend_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::DocumentRegistered { record, message } => {
                    self.documents.insert(0, record);
                    self.status = message;
                }
                UiEvent::DocumentRemoved { id } => {
                    self.documents.retain(|record| record.id != id);
                }
                UiEvent::QueryAnswered { user, assistant } => {
                    self.pending_query = None;
                    self.transcript.push(user);
                    self.transcript.push(assistant);
                    self.status.clear();
                }
                UiEvent::QueryFailed { user, notice } => {
                    self.pending_query = None;
                    self.transcript.push(user);
                    self.status = notice;
                }
                UiEvent::SessionReset { notice } => {
                    self.pending_query = None;
                    self.transcript.clear();
                    self.documents.clear();
                    self.status = notice.unwrap_or_default();
                }
                UiEvent::Notice(notice) => {
                    self.pending_query = None;
                    self.status = notice;
                }
            }
        }
    }

    fn submit_composer(&mut self) {
        let Some(text) = queued_submission(&self.composer) else {
            return;
        };
        self.composer.clear();
        self.pending_query = Some(text.clone());
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::SubmitQuery { text },
            &mut self.status,
        );
    }

    fn pick_and_upload(&mut self, kind: DocumentKind) {
        // Picker cancellation is a complete no-op.
        if let Some(path) = rfd::FileDialog::new().pick_file() {
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::UploadDocument { kind, path },
                &mut self.status,
            );
        }
    }

    fn documents_panel(&mut self, ui: &mut egui::Ui, busy: bool) {
        ui.heading("Indexed files");
        ui.add_space(6.0);

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!busy, egui::Button::new("Upload PDF"))
                .clicked()
            {
                self.pick_and_upload(DocumentKind::Pdf);
            }
            if ui
                .add_enabled(!busy, egui::Button::new("Upload image"))
                .clicked()
            {
                self.pick_and_upload(DocumentKind::Image);
            }
        });
        ui.separator();

        if self.documents.is_empty() {
            ui.weak("No files yet");
            return;
        }

        let mut removal = None;
        for record in &self.documents {
            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(&record.name).strong());
                    ui.weak(format!(
                        "{} · {}",
                        kind_label(record.kind),
                        record
                            .registered_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M")
                    ));
                });
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("✕").clicked() {
                        removal = Some(record.id);
                    }
                });
            });
            ui.add_space(4.0);
        }
        if let Some(id) = removal {
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::RemoveDocument { id },
                &mut self.status,
            );
        }
    }

    fn turn_bubble(ui: &mut egui::Ui, turn: &ConversationTurn) {
        match turn.role {
            Role::User => {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.set_max_width(ui.available_width() * 0.75);
                        ui.label(&turn.text);
                    });
                });
            }
            Role::Assistant => {
                egui::Frame::group(ui.style()).show(ui, |ui| {
                    ui.set_max_width(ui.available_width() * 0.75);
                    ui.vertical(|ui| {
                        ui.label(&turn.text);
                        if let Some(confidence) = turn.confidence {
                            ui.weak(format!(
                                "Confidence: {}",
                                format_confidence(confidence)
                            ));
                        }
                    });
                });
            }
        }
        ui.add_space(8.0);
    }

    fn transcript_panel(&self, ui: &mut egui::Ui, busy: bool) {
        egui::ScrollArea::vertical()
            .auto_shrink(false)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for turn in &self.transcript {
                    Self::turn_bubble(ui, turn);
                }
                if let Some(pending) = &self.pending_query {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                        egui::Frame::group(ui.style()).show(ui, |ui| {
                            ui.set_max_width(ui.available_width() * 0.75);
                            ui.label(pending);
                        });
                    });
                    ui.add_space(8.0);
                }
                if busy {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.weak("Generating response…");
                    });
                }
            });
    }
}

impl eframe::App for DesktopGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_backend_events();
        let busy = self.activity.is_busy();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Medical RAG");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !self.status.is_empty() {
                        ui.colored_label(ui.visuals().warn_fg_color, &self.status);
                    }
                });
            });
        });

        egui::SidePanel::left("documents")
            .default_width(260.0)
            .show(ctx, |ui| {
                self.documents_panel(ui, busy);
            });

        egui::TopBottomPanel::bottom("composer").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                let input = ui.add_sized(
                    [ui.available_width() - 150.0, 28.0],
                    egui::TextEdit::singleline(&mut self.composer)
                        .hint_text("Ask about your uploaded reports..."),
                );
                let submitted =
                    input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let clicked = ui.add_enabled(!busy, egui::Button::new("Send")).clicked();
                if clicked || (submitted && !busy) {
                    self.submit_composer();
                }
                if ui.add_enabled(!busy, egui::Button::new("Reset")).clicked() {
                    dispatch_backend_command(
                        &self.cmd_tx,
                        BackendCommand::ResetConversation,
                        &mut self.status,
                    );
                }
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.transcript_panel(ui, busy);
        });

        // Backend events arrive off-thread; keep polling at a low rate.
        ctx.request_repaint_after(Duration::from_millis(120));
    }
}
