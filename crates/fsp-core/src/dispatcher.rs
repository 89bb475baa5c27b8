// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Worker-pool dispatcher
//!
//! Requests are queued and executed by a fixed set of worker threads. Each
//! execution goes through [`FileSystem::dispatch`], so the volume's gate
//! wraps every operation no matter how many workers run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_queue::SegQueue;
use tracing::{debug, error, info};

use crate::error::{FsError, FsResult};
use crate::file_system::FileSystem;
use crate::interface::FileSystemInterface;
use crate::request::{OperationRequest, OperationResponse};

type Reply<C> = FsResult<OperationResponse<C>>;

struct Job<C> {
    request: OperationRequest<C>,
    reply: SyncSender<Reply<C>>,
}

/// Result of a submitted request, available once a worker has run it.
pub struct PendingOperation<C> {
    reply: Receiver<Reply<C>>,
}

impl<C> PendingOperation<C> {
    /// An operation that has already completed inline.
    pub fn ready(result: Reply<C>) -> Self {
        let (reply, pending) = mpsc::sync_channel(1);
        // Capacity one with the receiver alive: the send cannot fail.
        let _ = reply.send(result);
        Self { reply: pending }
    }

    /// Block until the request completes.
    pub fn wait(self) -> Reply<C> {
        self.reply.recv().unwrap_or(Err(FsError::Cancelled))
    }
}

pub struct PoolDispatcher<T: FileSystemInterface> {
    queue: Arc<SegQueue<Job<T::FileContext>>>,
    signal: Arc<(Mutex<bool>, Condvar)>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl<T: FileSystemInterface + 'static> PoolDispatcher<T> {
    pub fn new(file_system: Arc<FileSystem<T>>, thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let queue = Arc::new(SegQueue::<Job<T::FileContext>>::new());
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(thread_count);

        for worker in 0..thread_count {
            let queue = Arc::clone(&queue);
            let signal = Arc::clone(&signal);
            let shutdown = Arc::clone(&shutdown);
            let file_system = Arc::clone(&file_system);
            handles.push(thread::spawn(move || {
                worker_loop(worker, &file_system, &queue, &signal, &shutdown)
            }));
        }

        info!(threads = thread_count, "pool dispatcher started");
        Self {
            queue,
            signal,
            shutdown,
            handles,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    /// Queue a request for execution by the pool.
    pub fn submit(
        &self,
        request: OperationRequest<T::FileContext>,
    ) -> FsResult<PendingOperation<T::FileContext>> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(FsError::Cancelled);
        }
        let (reply, pending) = mpsc::sync_channel(1);
        self.queue.push(Job { request, reply });
        let (lock, cvar) = &*self.signal;
        if let Ok(mut queued) = lock.lock() {
            *queued = true;
            cvar.notify_one();
        }
        Ok(PendingOperation { reply: pending })
    }

    /// Stop accepting requests, finish the queued ones and join the workers.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &*self.signal;
        if let Ok(mut queued) = lock.lock() {
            *queued = true;
            cvar.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        info!("pool dispatcher stopped");
    }
}

impl<T: FileSystemInterface> Drop for PoolDispatcher<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &*self.signal;
        if let Ok(mut queued) = lock.lock() {
            *queued = true;
            cvar.notify_all();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop<T: FileSystemInterface>(
    worker: usize,
    file_system: &FileSystem<T>,
    queue: &SegQueue<Job<T::FileContext>>,
    signal: &(Mutex<bool>, Condvar),
    shutdown: &AtomicBool,
) {
    loop {
        match queue.pop() {
            Some(job) => {
                let kind = job.request.kind();
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| file_system.dispatch(job.request)));
                let result = result.unwrap_or_else(|_| {
                    error!(worker, op = %kind, "operation panicked");
                    Err(FsError::Cancelled)
                });
                // The submitter may have stopped waiting; nothing to do then.
                let _ = job.reply.send(result);
            }
            None => {
                if shutdown.load(Ordering::Acquire) {
                    debug!(worker, "worker exiting");
                    break;
                }
                let (lock, cvar) = signal;
                let Ok(mut queued) = lock.lock() else {
                    break;
                };
                if !*queued {
                    queued = match cvar.wait_timeout(queued, Duration::from_millis(5)) {
                        Ok((guard, _)) => guard,
                        Err(_) => break,
                    };
                }
                *queued = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_system::{DevicePath, VolumeParams};
    use crate::interface::{FileInfo, FileSizeInfo, OpenedFile, SecurityInfo};
    use std::collections::HashSet;

    /// Minimal volume that only tracks created names.
    #[derive(Default)]
    struct Names {
        names: HashSet<String>,
    }

    impl FileSystemInterface for Names {
        type FileContext = usize;

        fn get_security(&mut self, _: &str, _: Option<&mut [u8]>) -> FsResult<SecurityInfo> {
            Err(FsError::InvalidDeviceRequest)
        }

        fn create(
            &mut self,
            file_name: &str,
            _: u32,
            file_attributes: u32,
            _: Option<&[u8]>,
            _: u64,
        ) -> FsResult<OpenedFile<usize>> {
            if file_name == "\\panic" {
                panic!("handler bug");
            }
            if !self.names.insert(file_name.to_string()) {
                return Err(FsError::NameCollision);
            }
            Ok(OpenedFile {
                file_context: self.names.len(),
                info: FileInfo {
                    file_attributes,
                    ..FileInfo::default()
                },
            })
        }

        fn open(&mut self, _: &str, _: u32) -> FsResult<OpenedFile<usize>> {
            Err(FsError::NameNotFound)
        }

        fn overwrite(&mut self, _: usize, _: u32, _: bool) -> FsResult<FileSizeInfo> {
            Ok(FileSizeInfo::default())
        }

        fn cleanup(&mut self, _: usize, _: bool) {}

        fn close(&mut self, _: usize) {}
    }

    fn pool(threads: usize) -> (Arc<FileSystem<Names>>, PoolDispatcher<Names>) {
        let fs = Arc::new(
            FileSystem::new(DevicePath::Disk, VolumeParams::default(), Names::default()).unwrap(),
        );
        let pool = PoolDispatcher::new(Arc::clone(&fs), threads);
        (fs, pool)
    }

    #[test]
    fn pool_runs_distinct_creates_concurrently() {
        let (fs, mut pool) = pool(4);
        assert_eq!(pool.thread_count(), 4);

        let pending: Vec<_> = (0..64)
            .map(|i| pool.submit(OperationRequest::create(format!("\\f{i}"), 0, 0)).unwrap())
            .collect();
        for op in pending {
            assert!(op.wait().is_ok());
        }
        pool.shutdown();

        assert_eq!(fs.operation_count(), 64);
        assert_eq!(fs.with_context(|ctx| ctx.names.len()), 64);
    }

    #[test]
    fn pool_reports_handler_errors() {
        let (_fs, pool) = pool(2);
        pool.submit(OperationRequest::create("\\dup", 0, 0)).unwrap().wait().unwrap();
        let second = pool.submit(OperationRequest::create("\\dup", 0, 0)).unwrap().wait();
        assert_eq!(second, Err(FsError::NameCollision));
    }

    #[test]
    fn pool_survives_panicking_handler() {
        let (_fs, pool) = pool(1);
        let panicked = pool.submit(OperationRequest::create("\\panic", 0, 0)).unwrap().wait();
        assert_eq!(panicked, Err(FsError::Cancelled));
        let next = pool.submit(OperationRequest::create("\\after", 0, 0)).unwrap().wait();
        assert!(next.is_ok());
    }

    #[test]
    fn submit_after_shutdown_is_cancelled() {
        let (_fs, mut pool) = pool(1);
        pool.shutdown();
        assert!(matches!(
            pool.submit(OperationRequest::open("\\x")),
            Err(FsError::Cancelled)
        ));
    }
}
