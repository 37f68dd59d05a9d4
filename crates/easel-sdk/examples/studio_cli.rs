//! Headless session against the configured store and inference service.
//!
//! ```text
//! cargo run -p easel-sdk --example studio_cli -- photo.png clip.mp4 --prompt "a lighthouse at dusk"
//! ```

use anyhow::Result;
use easel_core::StudioConfig;
use easel_core::events::StudioEvent;
use easel_core::ingest::IncomingFile;
use easel_sdk::{Action, GenerationSettings, Studio};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut files = Vec::new();
    let mut prompt = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--prompt" {
            prompt = args.next();
        } else {
            files.push(arg);
        }
    }

    let config = StudioConfig::from_env()?;
    let mut studio = Studio::open(config).await?;
    let mut events = studio.subscribe();
    println!("Loaded canvas with {} elements", studio.scene().len());

    for path in files {
        let bytes = tokio::fs::read(&path).await?;
        match studio.ingest_file(IncomingFile::new(&path, bytes)).await {
            Ok(Some(id)) => println!("  + {path} -> {id}"),
            Ok(None) => println!("  - {path}: unsupported type, skipped"),
            Err(e) => eprintln!("  ! {path}: {e:#}"),
        }
    }

    if let Some(prompt) = prompt {
        studio.dispatch(Action::SetSettings(GenerationSettings {
            prompt,
            ..Default::default()
        }))?;
        studio.dispatch(Action::Generate)?;
        studio.run_until_idle().await;
    }

    while let Ok(event) = events.try_recv() {
        if let StudioEvent::Notification {
            title, description, ..
        } = event
        {
            println!("[{title}] {description}");
        }
    }

    println!("Canvas now has {} elements", studio.scene().len());
    studio.shutdown().await;
    Ok(())
}
