//! Source tree change detection backed by `notify`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::errors::PipelineError;

/// Directory names that never trigger a rebuild.
const IGNORED_DIRS: &[&str] = &["node_modules", "target"];

/// Watches a directory tree and signals source changes on a channel.
///
/// Dropping the watcher stops OS-level monitoring.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl SourceWatcher {
    /// Start watching `root` recursively. Every relevant change sends `()`
    /// on `changes`.
    pub fn new(root: &Path, changes: mpsc::UnboundedSender<()>) -> Result<Self, PipelineError> {
        let watch_err = |source| PipelineError::Watch {
            path: root.display().to_string(),
            source,
        };
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let filter_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_source_change(&event, &filter_root) => {
                let _ = changes.send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "file watcher error"),
        })
        .map_err(watch_err)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(watch_err)?;
        debug!(root = %root.display(), "watching for source changes");

        Ok(Self {
            _watcher: watcher,
            root,
        })
    }

    /// Watched directory, canonicalized when possible.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Directory to watch for an entry point file.
pub fn watch_root(filename: &str) -> PathBuf {
    match Path::new(filename).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether an event should trigger a rebuild.
///
/// Only creations, modifications and removals count, and paths inside
/// hidden or dependency directories below `root` (build output,
/// `node_modules`) are skipped.
pub fn is_source_change(event: &Event, root: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| !is_ignored_path(p.strip_prefix(root).unwrap_or(p)))
}

fn is_ignored_path(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            (name.starts_with('.') && name.len() > 1) || IGNORED_DIRS.contains(&name.as_ref())
        }
        _ => false,
    })
}

/// Wait for a burst of changes to settle.
///
/// Returns after `window` passes with no further change, or `false` if the
/// channel closed.
pub async fn settle(changes: &mut mpsc::UnboundedReceiver<()>, window: Duration) -> bool {
    loop {
        match tokio::time::timeout(window, changes.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => return false,
            Err(_) => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn root_of_nested_file() {
        assert_eq!(watch_root("src/main.ts"), PathBuf::from("src"));
        assert_eq!(watch_root("/work/app/main.ts"), PathBuf::from("/work/app"));
    }

    #[test]
    fn root_of_bare_file() {
        assert_eq!(watch_root("main.ts"), PathBuf::from("."));
    }

    fn changed(kind: EventKind, path: &str) -> bool {
        is_source_change(&event(kind, path), Path::new("/work"))
    }

    #[test]
    fn modifications_count() {
        assert!(changed(EventKind::Modify(ModifyKind::Any), "/work/src/main.ts"));
        assert!(changed(EventKind::Create(CreateKind::File), "/work/src/led.ts"));
    }

    #[test]
    fn access_does_not_count() {
        assert!(!changed(EventKind::Access(AccessKind::Any), "/work/src/main.ts"));
    }

    #[test]
    fn build_output_is_ignored() {
        assert!(!changed(
            EventKind::Modify(ModifyKind::Any),
            "/work/.devicescript/bin/main.devs"
        ));
        assert!(!changed(
            EventKind::Create(CreateKind::File),
            "/work/node_modules/pkg/index.ts"
        ));
    }

    #[test]
    fn hidden_root_is_not_ignored() {
        let event = event(EventKind::Modify(ModifyKind::Any), "/home/dev/.projects/app/main.ts");
        assert!(is_source_change(&event, Path::new("/home/dev/.projects/app")));
    }

    #[test]
    fn relative_dot_is_not_hidden() {
        assert!(!is_ignored_path(Path::new("./src/main.ts")));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_waits_for_quiet() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        assert!(settle(&mut rx, Duration::from_millis(100)).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn settle_reports_closed_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        drop(tx);
        assert!(!settle(&mut rx, Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn watcher_sees_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = SourceWatcher::new(dir.path(), tx).unwrap();
        assert_eq!(watcher.root(), dir.path().canonicalize().unwrap());

        std::fs::write(dir.path().join("main.ts"), "console.log(1)").unwrap();
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));
    }

    #[test]
    fn watch_missing_directory_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = SourceWatcher::new(Path::new("/nonexistent/devs/src"), tx);
        assert!(matches!(result, Err(PipelineError::Watch { .. })));
    }
}
