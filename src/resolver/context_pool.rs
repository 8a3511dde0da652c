//! Per-thread predictor scratch buffers
//!
//! Each calling thread gets exactly one [`ExecutionContext`], created on its
//! first request and kept until the pool is dropped. Handing out `Arc`s keeps
//! a context's address stable for as long as a caller holds it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use crate::cache::traits::CacheOperationError;

/// Buffers handed to the predictor
#[derive(Debug, Default)]
pub struct InferenceBuffers {
    /// Encoded feature vectors, back to back
    pub input: Vec<f32>,
    /// Raw predictor outputs
    pub results: Vec<f32>,
    /// Predictor private working memory
    pub scratch: Vec<f32>,
}

#[derive(Debug)]
pub struct ExecutionContext {
    owner: ThreadId,
    batch_size: usize,
    // only ever locked by `owner`, so the lock is uncontended
    buffers: Mutex<InferenceBuffers>,
}

impl ExecutionContext {
    fn new(owner: ThreadId, batch_size: usize, input_length: usize, results_prealloc: usize) -> Self {
        Self {
            owner,
            batch_size,
            buffers: Mutex::new(InferenceBuffers {
                input: Vec::with_capacity(input_length),
                results: Vec::with_capacity(results_prealloc),
                scratch: Vec::new(),
            }),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn buffers(&self) -> Result<MutexGuard<'_, InferenceBuffers>, CacheOperationError> {
        self.buffers
            .lock()
            .map_err(|_| CacheOperationError::consistency("execution context lock poisoned"))
    }
}

#[derive(Debug)]
pub struct ExecutionContextPool {
    batch_size: usize,
    input_length: usize,
    results_prealloc: usize,
    contexts: RwLock<HashMap<ThreadId, Arc<ExecutionContext>>>,
}

impl ExecutionContextPool {
    /// `input_length` is the float count of one full batch of descriptors
    pub fn new(batch_size: usize, input_length: usize, results_prealloc: usize) -> Self {
        Self {
            batch_size,
            input_length,
            results_prealloc,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Context of the calling thread
    pub fn get_or_create(&self) -> Result<Arc<ExecutionContext>, CacheOperationError> {
        self.get_or_create_for(thread::current().id())
    }

    pub fn get_or_create_for(&self, thread_id: ThreadId) -> Result<Arc<ExecutionContext>, CacheOperationError> {
        {
            let contexts = self
                .contexts
                .read()
                .map_err(|_| CacheOperationError::consistency("context pool lock poisoned"))?;
            if let Some(context) = contexts.get(&thread_id) {
                return Ok(Arc::clone(context));
            }
        }

        let mut contexts = self
            .contexts
            .write()
            .map_err(|_| CacheOperationError::consistency("context pool lock poisoned"))?;
        // another caller may have inserted between the two locks
        let context = contexts.entry(thread_id).or_insert_with(|| {
            log::debug!("Creating execution context for thread {:?}", thread_id);
            Arc::new(ExecutionContext::new(
                thread_id,
                self.batch_size,
                self.input_length,
                self.results_prealloc,
            ))
        });
        Ok(Arc::clone(context))
    }

    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
