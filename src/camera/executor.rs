// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated camera executor
//!
//! A single worker thread that runs camera jobs (still captures, rotation) in
//! submission order, away from both the UI thread and the async runtime.

use super::frame_loop::{FrameLoop, LoopAction};
use crate::errors::CameraError;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct CameraExecutor {
    // Declared before `worker` so the queue closes before the thread is joined
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<FrameLoop>>,
}

impl CameraExecutor {
    /// Spawn the executor thread
    pub fn start(name: &str) -> Result<Self, CameraError> {
        let (sender, receiver) = mpsc::channel::<Job>();

        let worker = FrameLoop::start(name, move || match receiver.recv() {
            Ok(job) => {
                job();
                LoopAction::Continue
            }
            // Every sender is gone: queue drained, shut down
            Err(_) => LoopAction::Stop,
        })
        .map_err(|e| CameraError::BindFailed(format!("camera executor: {}", e)))?;

        debug!(name = %name, "Camera executor started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a job; fails once the executor is shut down
    pub fn execute<F>(&self, job: F) -> Result<(), CameraError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender
                .send(Box::new(job))
                .map_err(|_| CameraError::Released),
            None => Err(CameraError::Released),
        }
    }

    /// Stop accepting jobs. Queued and running jobs still complete.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            info!("Camera executor shutting down");
        }
    }
}

impl Drop for CameraExecutor {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(mut worker) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_jobs_run_in_order_on_worker_thread() {
        let executor = CameraExecutor::start("camera-executor-test").unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            executor
                .execute(move || {
                    let name = std::thread::current().name().map(str::to_string);
                    tx.send((i, name)).unwrap();
                })
                .unwrap();
        }

        for expected in 0..5 {
            let (i, name) = rx.recv().unwrap();
            assert_eq!(i, expected);
            assert_eq!(name.as_deref(), Some("camera-executor-test"));
        }
    }

    #[test]
    fn test_shutdown_rejects_new_jobs_but_finishes_queued() {
        let executor = CameraExecutor::start("camera-executor-test").unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&counter);
        executor
            .execute(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        executor.shutdown();
        executor.shutdown();
        assert!(matches!(
            executor.execute(|| {}),
            Err(CameraError::Released)
        ));

        drop(executor);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
