//! Binder CLI - edit a card collection from the terminal.
//!
//! Reads one command per line from stdin. The collection lives in
//! `BINDER_STORAGE_DIR`; when `BINDER_SERVER_URL` is set it syncs with a
//! `binder-server`, otherwise it runs against an in-process remote.

use std::error::Error;
use std::sync::Arc;

use binder_client::{
    AuthHandle, ClientConfig, CollectionEngine, EngineDeps, FileStorage, HttpRemote, MemoryRemote,
    RemoteStore, Session,
};
use binder_engine::{CollectionExport, SyncResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  add <card> [count] [foil]      add copies
  remove <card> [count] [foil]   remove copies
  show                           list the collection
  stats                          totals
  sync                           sync now
  status                         sync status
  export <file>                  write the collection to a file
  import <file>                  replace the collection from a file
  online | offline               toggle connectivity
  signout                        sign out and clear local data
  quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binder_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env()?;

    let storage = FileStorage::open(&config.storage_dir).await?;
    let remote: Arc<dyn RemoteStore> = match &config.server_url {
        Some(url) => {
            tracing::info!(server = %url, "Using remote server");
            Arc::new(HttpRemote::new(url.as_str())?)
        }
        None => {
            tracing::info!("No BINDER_SERVER_URL set; running local-only");
            Arc::new(MemoryRemote::new())
        }
    };

    let auth = AuthHandle::new();
    if let Some(user_id) = &config.user_id {
        let token = config.token.clone().unwrap_or_else(|| user_id.clone());
        auth.sign_in(Session::new(user_id.as_str(), token));
    }

    let deps = EngineDeps::new(Arc::new(storage), remote, auth);
    let engine = CollectionEngine::start(deps, config.sync).await;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["add", card, rest @ ..] => match parse_count(rest) {
                Some((count, foil)) => {
                    engine.add(card, count, foil);
                    print_card(&engine, card);
                }
                None => println!("usage: add <card> [count] [foil]"),
            },
            ["remove", card, rest @ ..] => match parse_count(rest) {
                Some((count, foil)) => {
                    engine.remove(card, count, foil);
                    print_card(&engine, card);
                }
                None => println!("usage: remove <card> [count] [foil]"),
            },
            ["show"] => {
                let snapshot = engine.snapshot();
                if snapshot.is_empty() {
                    println!("(empty)");
                }
                for (card_id, quantity) in snapshot.iter() {
                    println!("{card_id}: {} normal, {} foil", quantity.normal, quantity.foil);
                }
            }
            ["stats"] => {
                let stats = engine.stats();
                println!(
                    "{} unique, {} normal, {} foil, {} total",
                    stats.unique_cards, stats.normal_cards, stats.foil_cards, stats.total_cards
                );
            }
            ["sync"] => print_result(&engine.sync_now().await),
            ["status"] => {
                let last_sync = engine
                    .last_sync_timestamp()
                    .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms as i64))
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
                println!("online:   {}", engine.is_online());
                println!("syncing:  {}", engine.is_syncing());
                println!("pending:  {}", engine.pending_changes());
                println!("last sync: {last_sync}");
            }
            ["export", path] => match write_export(&engine.export_collection(), path).await {
                Ok(()) => println!("exported to {path}"),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Export failed");
                    eprintln!("export failed: {e}");
                }
            },
            ["import", path] => match read_export(path).await {
                Ok(export) => {
                    let stats = export.stats();
                    engine.import_collection(export);
                    println!("imported {} cards", stats.unique_cards);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Import failed");
                    eprintln!("import failed: {e}");
                }
            },
            ["online"] => engine.set_online(true),
            ["offline"] => engine.set_online(false),
            ["signout"] => engine.sign_out(),
            ["help"] => println!("{HELP}"),
            _ => println!("unknown command, try `help`"),
        }
    }

    engine.shutdown().await;
    Ok(())
}

async fn write_export(export: &CollectionExport, path: &str) -> Result<(), Box<dyn Error>> {
    let json = export.to_json_pretty()?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

async fn read_export(path: &str) -> Result<CollectionExport, Box<dyn Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(CollectionExport::from_json(&raw)?)
}

/// `[count] [foil]`, count defaulting to 1.
fn parse_count(words: &[&str]) -> Option<(u32, bool)> {
    match words {
        [] => Some((1, false)),
        ["foil"] => Some((1, true)),
        [count] => count.parse().ok().map(|n| (n, false)),
        [count, "foil"] => count.parse().ok().map(|n| (n, true)),
        _ => None,
    }
}

fn print_card(engine: &CollectionEngine, card: &str) {
    println!(
        "{card}: {} normal, {} foil",
        engine.quantity_of(card),
        engine.foil_quantity_of(card)
    );
}

fn print_result(result: &SyncResult) {
    if result.success {
        println!("synced {} cards", result.card_count.unwrap_or_default());
    } else if result.silent {
        println!("not synced: sign in first (BINDER_USER_ID)");
    } else {
        let reason = result.reason.map_or("unknown", |r| r.as_str());
        match &result.error {
            Some(error) => println!("sync failed ({reason}): {error}"),
            None => println!("sync failed ({reason})"),
        }
    }
}
