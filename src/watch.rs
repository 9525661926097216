// Filesystem change notifications that trigger a tail pass for the affected profile.
//
// Notifications only decide *when* to update; the update itself goes through
// `ProfileRegistry::update`, the same path the HTTP handlers use.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::registry::ProfileRegistry;

/// Keeps the OS watcher alive; dropping it stops notifications.
pub struct LogWatcher {
    _watcher: RecommendedWatcher,
    watched: usize,
}

impl LogWatcher {
    /// Number of profiles whose log directory is being watched.
    pub fn watched_profiles(&self) -> usize {
        self.watched
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchTarget {
    id: String,
    dir: PathBuf,
    file: PathBuf,
}

/// Resolve each profile's log directory. Profiles whose directory does not exist
/// yet are skipped; polling still reaches them.
fn watch_targets(log_paths: &[(String, PathBuf)]) -> Vec<WatchTarget> {
    log_paths
        .iter()
        .filter_map(|(id, path)| {
            let file_name = path.file_name()?;
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            match parent.canonicalize() {
                Ok(dir) => Some(WatchTarget {
                    id: id.clone(),
                    file: dir.join(file_name),
                    dir,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Not watching '{id}': {} is unavailable ({e})",
                        parent.display()
                    );
                    None
                }
            }
        })
        .collect()
}

fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

fn profiles_for_paths(targets: &[WatchTarget], paths: &[PathBuf]) -> Vec<String> {
    targets
        .iter()
        .filter(|t| paths.iter().any(|p| p == &t.file))
        .map(|t| t.id.clone())
        .collect()
}

/// Watch every profile's log directory and run an update whenever its log changes.
pub fn spawn_log_watcher(registry: Arc<ProfileRegistry>) -> Result<LogWatcher, notify::Error> {
    let targets = watch_targets(&registry.log_paths());

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let routes = targets.clone();
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) if is_relevant(&event) => {
                for id in profiles_for_paths(&routes, &event.paths) {
                    if tx.send(id).is_err() {
                        tracing::debug!("Log watcher receiver dropped");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Log watcher error: {e}"),
        }
    })?;

    let mut dirs = BTreeSet::new();
    let mut watched = 0;
    for target in &targets {
        if dirs.insert(target.dir.clone()) {
            if let Err(e) = watcher.watch(&target.dir, RecursiveMode::NonRecursive) {
                tracing::warn!("Failed to watch {}: {e}", target.dir.display());
                continue;
            }
        }
        tracing::info!("Watching {} for '{}'", target.file.display(), target.id);
        watched += 1;
    }

    tokio::spawn(async move {
        while let Some(first) = rx.recv().await {
            // Collapse a burst of notifications into one pass per profile.
            let mut pending = BTreeSet::from([first]);
            while let Ok(id) = rx.try_recv() {
                pending.insert(id);
            }

            for id in pending {
                let registry = registry.clone();
                let task_id = id.clone();
                match tokio::task::spawn_blocking(move || registry.update(&task_id)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::debug!("Update of '{id}' after change failed: {e}"),
                    Err(e) => tracing::error!("Update task for '{id}' panicked: {e}"),
                }
            }
        }
    });

    Ok(LogWatcher {
        _watcher: watcher,
        watched,
    })
}
