//! Bounded work queue for the concurrent walker.
//!
//! Directories waiting to be scanned are tasks on a bounded
//! crossbeam channel. A full queue is not an error: the discovering
//! worker scans the subdirectory inline instead, which bounds memory on
//! very wide trees without stalling the pool.

use crate::fs::FileInfo;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A directory awaiting its scan, with the metadata its parent already
/// gathered for it.
#[derive(Debug, Clone)]
pub(crate) struct DirTask {
    pub path: String,
    pub info: FileInfo,
}

/// Counters describing queue behavior over one walk.
#[derive(Debug, Default)]
pub(crate) struct QueueStats {
    pub enqueued: AtomicU64,
    pub dequeued: AtomicU64,
    pub inline_scans: AtomicU64,
}

pub(crate) struct WorkQueue {
    sender: Sender<DirTask>,
    receiver: Receiver<DirTask>,
    active_workers: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            active_workers: Arc::new(AtomicUsize::new(0)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    pub fn sender(&self) -> WorkSender {
        WorkSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn receiver(&self) -> WorkReceiver {
        WorkReceiver {
            receiver: self.receiver.clone(),
            active_workers: Arc::clone(&self.active_workers),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    /// All work is done once nothing is queued and no worker is mid-scan.
    pub fn is_complete(&self) -> bool {
        self.receiver.is_empty() && self.active_workers.load(Ordering::SeqCst) == 0
    }
}

#[derive(Clone)]
pub(crate) struct WorkSender {
    sender: Sender<DirTask>,
    stats: Arc<QueueStats>,
}

impl WorkSender {
    /// Try to enqueue; a full queue hands the task back so the caller can
    /// process it inline.
    pub fn try_send(&self, task: DirTask) -> Result<Option<DirTask>, ()> {
        match self.sender.try_send(task) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(TrySendError::Full(task)) => Ok(Some(task)),
            Err(TrySendError::Disconnected(_)) => Err(()),
        }
    }

    pub fn record_inline(&self) {
        self.stats.inline_scans.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub(crate) struct WorkReceiver {
    receiver: Receiver<DirTask>,
    active_workers: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkReceiver {
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DirTask> {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(task)
            }
            Err(_) => None,
        }
    }

    fn begin_work(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    fn end_work(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII marker keeping a worker counted as active while it holds a task.
pub(crate) struct WorkGuard<'a> {
    receiver: &'a WorkReceiver,
}

impl<'a> WorkGuard<'a> {
    pub fn new(receiver: &'a WorkReceiver) -> Self {
        receiver.begin_work();
        Self { receiver }
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.receiver.end_work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileType, XAttr};
    use std::time::SystemTime;

    fn task(path: &str) -> DirTask {
        DirTask {
            path: path.to_string(),
            info: FileInfo::new(
                path.rsplit('/').next().unwrap_or(path),
                FileType::Dir,
                0o040_755,
                0,
                SystemTime::UNIX_EPOCH,
                XAttr::default(),
            ),
        }
    }

    #[test]
    fn test_send_recv() {
        let queue = WorkQueue::new(10);
        let tx = queue.sender();
        let rx = queue.receiver();
        assert!(tx.try_send(task("/a")).unwrap().is_none());
        let got = rx.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(got.path, "/a");
        assert_eq!(queue.stats().dequeued.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_full_queue_hands_task_back() {
        let queue = WorkQueue::new(1);
        let tx = queue.sender();
        assert!(tx.try_send(task("/a")).unwrap().is_none());
        let bounced = tx.try_send(task("/b")).unwrap();
        assert_eq!(bounced.unwrap().path, "/b");
    }

    #[test]
    fn test_completion_tracks_active_workers() {
        let queue = WorkQueue::new(10);
        let tx = queue.sender();
        let rx = queue.receiver();
        assert!(queue.is_complete());

        tx.try_send(task("/a")).unwrap();
        assert!(!queue.is_complete());

        let guard = WorkGuard::new(&rx);
        let _task = rx.recv_timeout(Duration::from_millis(10)).unwrap();
        // Queue drained but a worker is still busy.
        assert!(!queue.is_complete());
        drop(guard);
        assert!(queue.is_complete());
    }
}
