use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::{FileStore, KvStore, Settings, Snapshot, StreamConsumer, TranscriptState};
use crate::core::AppConfig;
use crate::openai::Role;

/// Print whatever part of the latest assistant message hasn't been
/// printed yet. If the content stopped being an extension of what was
/// printed (an error replaced the draft) it is printed on a new line.
fn render(snapshot: &Snapshot, printed: &mut String) {
    let Some(msg) = snapshot.messages.last() else {
        return;
    };
    if msg.role != Role::Assistant {
        return;
    }

    let mut out = io::stdout();
    match msg.content.strip_prefix(printed.as_str()) {
        Some(rest) => {
            let _ = write!(out, "{}", rest);
        }
        None => {
            let _ = write!(out, "\n{}", msg.content);
        }
    }
    let _ = out.flush();
    *printed = msg.content.clone();
}

pub async fn run(relay_url: &str, config: &AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let store: Arc<dyn KvStore> =
        Arc::new(FileStore::new(format!("{}/client", config.storage_path)));
    let settings = Settings::load(store.as_ref(), config);
    // Write back so the settings file exists to be edited
    settings.save(store.as_ref());
    let transcript = Arc::new(TranscriptState::restore(store));
    let consumer = StreamConsumer::new(relay_url, settings, Arc::clone(&transcript));

    for msg in transcript.messages() {
        println!("{:?}: {}", msg.role, msg.content);
    }

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim() == "/clear" {
                    transcript.clear()?;
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let mut updates = transcript.subscribe();
                let send = consumer.send(&line);
                tokio::pin!(send);
                let mut printed = String::new();

                loop {
                    tokio::select! {
                        result = &mut send => {
                            // Render anything published right before the turn ended
                            while let Ok(snapshot) = updates.try_recv() {
                                render(&snapshot, &mut printed);
                            }
                            if let Err(e) = result {
                                println!("{}", e);
                            } else {
                                println!();
                            }
                            break;
                        }
                        Some(snapshot) = updates.recv() => {
                            render(&snapshot, &mut printed);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
