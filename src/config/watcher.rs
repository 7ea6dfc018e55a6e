//! Hot reload of the config file.
//!
//! The parent directory is watched rather than the file itself: editors and
//! config managers usually replace the file by rename, which drops a watch
//! placed on the old inode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ControlConfig;

/// Delivers a freshly validated `ControlConfig` whenever the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ControlConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ControlConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = self.path.clone();
        let updates = self.updates;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &path) => reload(&path, &updates),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

/// A file that fails to load or validate keeps the running config.
fn reload(path: &Path, updates: &mpsc::UnboundedSender<ControlConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = ?path, "Config file changed, reloading");
            if updates.send(config).is_err() {
                tracing::debug!("Config reload receiver gone");
            }
        }
        Err(e) => tracing::error!(path = ?path, error = %e, "Rejected config reload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    #[test]
    fn test_only_events_on_the_config_file_count() {
        let path = Path::new("/etc/edge/control.toml");

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/etc/edge/control.toml"));
        assert!(touches(&modify, path));

        let sibling = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/etc/edge/seed.json"));
        assert!(!touches(&sibling, path));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/etc/edge/control.toml"));
        assert!(!touches(&access, path));
    }
}
