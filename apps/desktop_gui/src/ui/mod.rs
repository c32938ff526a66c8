//! UI layer: the egui app shell rendering documents, transcript, and the
//! busy affordance.

pub mod app;

pub use app::DesktopGuiApp;
