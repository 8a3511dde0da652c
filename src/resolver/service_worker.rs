//! Fixed pool of threads that run measurement queries under a deadline
//!
//! Callers hand a workload to the pool and wait for the answer with a
//! timeout. A hung service ties up at most `workers` threads; once the
//! queue is full further queries are refused immediately as unavailable.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use super::collaborators::MeasurementService;
use super::workload::Workload;
use crate::cache::traits::CacheOperationError;

pub const DEFAULT_SERVICE_WORKERS: usize = 2;
pub const DEFAULT_SERVICE_QUEUE_DEPTH: usize = 32;

type Answer = Result<Option<u32>, CacheOperationError>;

struct Query {
    workload: Workload,
    reply: Sender<Answer>,
}

pub struct ServiceWorkerPool {
    jobs: Sender<Query>,
    timeout: Duration,
    // detached on drop; a worker stuck in the service cannot be joined safely
    workers: Vec<JoinHandle<()>>,
}

impl ServiceWorkerPool {
    pub fn new(
        service: Arc<dyn MeasurementService>,
        workers: usize,
        queue_depth: usize,
        timeout: Duration,
    ) -> Result<Self, CacheOperationError> {
        let (jobs, queue) = crossbeam_channel::bounded::<Query>(queue_depth.max(1));

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let service = Arc::clone(&service);
            let queue: Receiver<Query> = queue.clone();
            let handle = std::thread::Builder::new()
                .name(format!("cost-measurement-{}", index))
                .spawn(move || {
                    for query in queue.iter() {
                        // the caller may have timed out already
                        let _ = query.reply.send(service.measure(&query.workload));
                    }
                })
                .map_err(|e| {
                    CacheOperationError::configuration_error(format!(
                        "cannot start measurement worker: {}",
                        e
                    ))
                })?;
            handles.push(handle);
        }

        log::debug!(
            "Measurement workers started: {} threads, queue depth {}, timeout {:?}",
            handles.len(),
            queue_depth.max(1),
            timeout
        );
        Ok(Self {
            jobs,
            timeout,
            workers: handles,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Run one query, waiting at most the configured timeout
    pub fn query(&self, workload: &Workload) -> Answer {
        let (reply, answer) = crossbeam_channel::bounded(1);
        let query = Query {
            workload: workload.clone(),
            reply,
        };

        match self.jobs.try_send(query) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                return Err(CacheOperationError::unavailable("measurement queue is full"));
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(CacheOperationError::unavailable("measurement workers have stopped"));
            }
        }

        match answer.recv_timeout(self.timeout) {
            Ok(answer) => answer,
            Err(RecvTimeoutError::Timeout) => Err(CacheOperationError::unavailable(format!(
                "measurement service did not answer within {:?}",
                self.timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(CacheOperationError::unavailable(
                "measurement query ended without an answer",
            )),
        }
    }
}

impl std::fmt::Debug for ServiceWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorkerPool")
            .field("workers", &self.workers.len())
            .field("queued", &self.jobs.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::workload::{DataType, Operation, Tensor, VpuDevice};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Blocks every query until `release` is dropped
    struct GatedService {
        gate: Receiver<()>,
        calls: AtomicUsize,
    }

    impl MeasurementService for GatedService {
        fn measure(&self, _workload: &Workload) -> Result<Option<u32>, CacheOperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(Some(5))
        }
    }

    struct Echo;

    impl MeasurementService for Echo {
        fn measure(&self, workload: &Workload) -> Result<Option<u32>, CacheOperationError> {
            Ok(Some(workload.output.channels))
        }
    }

    fn workload() -> Workload {
        Workload::new(
            VpuDevice::Vpu2_7,
            Operation::Eltwise,
            Tensor::new(2, 2, 8, 1, DataType::Uint8),
            Tensor::new(2, 2, 8, 1, DataType::Uint8),
        )
    }

    #[test]
    fn test_answers_are_delivered() {
        let pool = ServiceWorkerPool::new(Arc::new(Echo), 2, 4, Duration::from_secs(5)).unwrap();
        assert_eq!(pool.workers(), 2);
        for _ in 0..10 {
            assert_eq!(pool.query(&workload()), Ok(Some(8)));
        }
    }

    #[test]
    fn test_hung_service_is_bounded() {
        let (release, gate) = crossbeam_channel::bounded::<()>(0);
        let service = Arc::new(GatedService {
            gate,
            calls: AtomicUsize::new(0),
        });
        let timeout = Duration::from_millis(200);
        let pool = ServiceWorkerPool::new(service.clone(), 1, 1, timeout).unwrap();

        // occupies the single worker
        assert!(matches!(pool.query(&workload()), Err(CacheOperationError::Unavailable(_))));
        while service.calls.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(1));
        }
        // sits in the queue behind it
        assert!(matches!(pool.query(&workload()), Err(CacheOperationError::Unavailable(_))));
        // refused without waiting: queue is full
        let started = std::time::Instant::now();
        assert_eq!(
            pool.query(&workload()),
            Err(CacheOperationError::unavailable("measurement queue is full"))
        );
        assert!(started.elapsed() < timeout);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        drop(release);
    }
}
