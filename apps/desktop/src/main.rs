//! Headless one-shot client: upload the given files, ask one question,
//! print the answer with its confidence. Useful for smoke-testing a local
//! backend without the GUI.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpRagBackend, QueryOutcome, SessionCoordinator};
use shared::domain::DocumentKind;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the RAG backend.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server_url: String,
    /// PDF reports to upload before asking.
    #[arg(long)]
    pdf: Vec<PathBuf>,
    /// Scanned images to upload before asking.
    #[arg(long)]
    image: Vec<PathBuf>,
    /// Ask the backend to discard its corpus after answering.
    #[arg(long)]
    reset: bool,
    /// The question to ask about the uploaded material.
    question: String,
}

async fn upload(
    session: &mut SessionCoordinator,
    kind: DocumentKind,
    path: &PathBuf,
) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document");
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let ack = session.upload_document(kind, filename, bytes).await?;
    println!("Uploaded {filename}: {}", ack.message);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let backend = Arc::new(HttpRagBackend::new(args.server_url));
    let mut session = SessionCoordinator::new(backend);

    for path in &args.pdf {
        upload(&mut session, DocumentKind::Pdf, path).await?;
    }
    for path in &args.image {
        upload(&mut session, DocumentKind::Image, path).await?;
    }

    match session.submit_query(&args.question).await? {
        QueryOutcome::Ignored => println!("Empty question; nothing asked."),
        QueryOutcome::Answered { assistant, .. } => {
            println!("{}", assistant.text);
            if let Some(confidence) = assistant.confidence {
                println!("Confidence: {:.1}%", confidence * 100.0);
            }
        }
        QueryOutcome::Failed { error, .. } => return Err(error.into()),
    }

    if args.reset {
        session.reset_conversation().await?;
        println!("Backend corpus reset.");
    }

    Ok(())
}
