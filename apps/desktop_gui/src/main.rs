mod backend_bridge;
mod controller;
mod ui;

use backend_bridge::{commands::BackendCommand, runtime};
use clap::Parser;
use client_core::ActivityFlag;
use controller::events::UiEvent;
use crossbeam_channel::bounded;
use eframe::egui;
use ui::DesktopGuiApp;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the RAG backend.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(256);
    let activity = ActivityFlag::default();
    runtime::launch(args.server_url, activity.clone(), cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Medical RAG Desktop")
            .with_inner_size([1080.0, 720.0])
            .with_min_inner_size([800.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Medical RAG Desktop",
        options,
        Box::new(|_cc| Ok(Box::new(DesktopGuiApp::new(cmd_tx, ui_rx, activity)))),
    )
}
