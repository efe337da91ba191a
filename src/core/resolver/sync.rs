// ─── Sync Executor ───
// Work that touches host-owned state is posted here and runs on the thread
// driving the resolution, while everything else stays on the runtime.

use std::future::Future;
use std::path::PathBuf;

use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::error::{IoResultExt, WorkspaceError, WorkspaceResult};

type Task = Box<dyn FnOnce() + Send>;

/// Posting half; cheap to clone and usable from any task.
#[derive(Clone)]
pub struct SyncExecutor {
    sender: mpsc::UnboundedSender<Task>,
}

/// Draining half, owned by the driving thread.
pub struct SyncDriver {
    receiver: mpsc::UnboundedReceiver<Task>,
}

impl SyncExecutor {
    pub fn new() -> (SyncExecutor, SyncDriver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (SyncExecutor { sender }, SyncDriver { receiver })
    }

    /// Queue `task` for the driving thread. The returned future resolves with
    /// its result once the driver has run it.
    pub fn post<T, F>(&self, task: F) -> impl Future<Output = WorkspaceResult<T>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> WorkspaceResult<T> + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let queued = self.sender.send(Box::new(move || {
            let _ = reply.send(task());
        }))
        .is_ok();
        async move {
            if !queued {
                return Err(WorkspaceError::Other("sync executor has shut down".into()));
            }
            result
                .await
                .map_err(|_| WorkspaceError::Other("sync task was dropped before it ran".into()))?
        }
    }
}

impl SyncDriver {
    /// Run `future` on `runtime`, executing posted tasks on the calling thread
    /// until the future completes.
    pub fn process_sync_tasks_until_complete<F: Future>(&mut self, runtime: &Runtime, future: F) -> F::Output {
        let receiver = &mut self.receiver;
        runtime.block_on(async move {
            tokio::pin!(future);
            loop {
                tokio::select! {
                    biased;
                    output = &mut future => return output,
                    Some(task) = receiver.recv() => {
                        debug!("Running posted sync task");
                        task();
                    }
                }
            }
        })
    }
}

/// Dependency resolution owned by the host. Only ever called from tasks
/// posted to the [`SyncExecutor`].
pub trait HostModel: Send + Sync {
    /// Files a dependency notation resolves to.
    fn resolve_files(&self, notation: &str) -> WorkspaceResult<Vec<PathBuf>>;
}

/// Treats a notation as a path: a file resolves to itself, a directory to
/// the regular files directly inside it.
#[derive(Debug, Default, Clone)]
pub struct FileSystemModel;

impl HostModel for FileSystemModel {
    fn resolve_files(&self, notation: &str) -> WorkspaceResult<Vec<PathBuf>> {
        let path = PathBuf::from(notation);
        if path.is_file() {
            return Ok(vec![path]);
        }
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&path).at(&path)? {
            let entry = entry.at(&path)?;
            if entry.file_type().at(&entry.path())?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread::{self, ThreadId};

    #[test]
    fn posted_tasks_run_on_the_driving_thread() {
        let runtime = Runtime::new().unwrap();
        let (executor, mut driver) = SyncExecutor::new();
        let seen: Arc<Mutex<Option<ThreadId>>> = Arc::default();

        let recorder = seen.clone();
        let work = runtime.spawn(async move {
            executor
                .post(move || {
                    *recorder.lock().unwrap() = Some(thread::current().id());
                    Ok(21)
                })
                .await
        });
        let answer = driver
            .process_sync_tasks_until_complete(&runtime, async { work.await.unwrap() })
            .unwrap();

        assert_eq!(answer, 21);
        assert_eq!(*seen.lock().unwrap(), Some(thread::current().id()));
    }

    #[test]
    fn directories_resolve_to_their_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let model = FileSystemModel;
        let files = model.resolve_files(&dir.path().display().to_string()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.txt"));
        let single = model.resolve_files(&files[1].display().to_string()).unwrap();
        assert_eq!(single, vec![files[1].clone()]);
        assert!(model.resolve_files("/definitely/missing").unwrap().is_empty());
    }
}
