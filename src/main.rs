use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use acts_overlay::api;
use acts_overlay::config::Config;
use acts_overlay::metrics;
use acts_overlay::notes::NoteBook;
use acts_overlay::registry::ProfileRegistry;
use acts_overlay::watch;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load();
    metrics::register_metrics();

    let notes = match &config.notes_file {
        Some(path) => NoteBook::from_file(path),
        None => NoteBook::builtin(),
    }
    .expect("Failed to load notes");
    tracing::info!("Loaded {} note rules", notes.len());

    for profile in &config.profiles {
        tracing::info!("Profile '{}' reads {}", profile.id, profile.log_path.display());
    }
    let registry = Arc::new(ProfileRegistry::new(config.profiles.clone(), notes));

    // Held for the lifetime of the server; dropping it stops notifications.
    let _watcher = if config.watch_logs {
        match watch::spawn_log_watcher(registry.clone()) {
            Ok(watcher) => {
                tracing::info!("Watching logs of {} profiles", watcher.watched_profiles());
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!("File watching unavailable, relying on polling: {e}");
                None
            }
        }
    } else {
        None
    };

    let app = api::app(registry, &config.notes_dir, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {}: {e}", config.port));

    tracing::info!("Overlay listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
