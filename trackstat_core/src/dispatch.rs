//! Work dispatcher: a shared pull-queue drained by a bounded pool of
//! scoped worker threads.
//!
//! Every analyzer funnels its batch through [`run_batch`], which owns the
//! queue, the worker lifecycle, and the wall-time measurement. Consumption
//! order across workers is unspecified; analyzer results must not depend
//! on it.

use crate::error::EngineError;
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Runs `body` over every element of `elements` on `num_threads` workers
/// and returns the elapsed wall time once all workers have joined.
///
/// Workers pop from a shared queue until it is empty. On the first `Err`
/// from `body`, an abort flag stops the remaining workers from pulling
/// further elements; elements already completed keep their results. The
/// error (or a panic, reported as [`EngineError::WorkerPanic`]) is
/// surfaced only after every worker has joined, so the caller never
/// observes a batch still in flight.
///
/// The returned duration is advisory telemetry, not a correctness input.
pub fn run_batch<E, F>(
    elements: &[E],
    num_threads: usize,
    label: &str,
    body: F,
) -> Result<Duration, EngineError>
where
    E: Sync,
    F: Fn(&E) -> Result<(), EngineError> + Sync,
{
    if num_threads == 0 {
        return Err(EngineError::InvalidWorkerCount(num_threads));
    }
    if elements.is_empty() {
        return Ok(Duration::ZERO);
    }

    let queue = SegQueue::new();
    for element in elements {
        queue.push(element);
    }

    let abort = AtomicBool::new(false);
    let panicked = AtomicBool::new(false);
    let first_error: Mutex<Option<EngineError>> = Mutex::new(None);

    let start = Instant::now();
    std::thread::scope(|scope| {
        let workers = num_threads.min(elements.len());
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    while !abort.load(Ordering::Relaxed) {
                        let Some(element) = queue.pop() else { break };
                        if let Err(err) = body(element) {
                            abort.store(true, Ordering::Relaxed);
                            first_error
                                .lock()
                                .unwrap_or_else(|p| p.into_inner())
                                .get_or_insert(err);
                            break;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                panicked.store(true, Ordering::Relaxed);
            }
        }
    });
    let elapsed = start.elapsed();

    if panicked.load(Ordering::Relaxed) {
        return Err(EngineError::WorkerPanic(label.to_string()));
    }
    if let Some(err) = first_error
        .into_inner()
        .unwrap_or_else(|p| p.into_inner())
    {
        return Err(err);
    }
    Ok(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_every_element_processed_once() {
        let elements: Vec<u32> = (0..200).collect();
        let seen = Mutex::new(Vec::new());
        run_batch(&elements, 4, "test", |e| {
            seen.lock().unwrap().push(*e);
            Ok(())
        })
        .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, elements);
    }

    #[test]
    fn test_zero_worker_count_is_config_error() {
        let elements = vec![1, 2, 3];
        let result = run_batch(&elements, 0, "test", |_| Ok(()));
        assert!(matches!(result, Err(EngineError::InvalidWorkerCount(0))));
    }

    #[test]
    fn test_more_workers_than_elements() {
        let elements = vec![1, 2];
        let count = AtomicUsize::new(0);
        run_batch(&elements, 16, "test", |_| {
            count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(count.into_inner(), 2);
    }

    #[test]
    fn test_results_independent_of_batch_order() {
        let forward: Vec<u32> = (0..50).collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let run = |batch: &[u32]| -> HashMap<u32, f64> {
            let out = Mutex::new(HashMap::new());
            run_batch(batch, 3, "test", |e| {
                out.lock().unwrap().insert(*e, f64::from(*e) * 1.5);
                Ok(())
            })
            .unwrap();
            out.into_inner().unwrap()
        };

        assert_eq!(run(&forward), run(&reversed));
    }

    #[test]
    fn test_first_error_surfaces_after_join() {
        let elements: Vec<u32> = (0..100).collect();
        let result = run_batch(&elements, 4, "test", |e| {
            if *e == 42 {
                Err(EngineError::missing_element(*e))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(EngineError::MissingElement(_))));
    }

    #[test]
    fn test_worker_panic_reported() {
        let elements = vec![1, 2, 3];
        let result = run_batch(&elements, 2, "panicky", |e| {
            if *e == 2 {
                panic!("boom");
            }
            Ok(())
        });
        assert!(matches!(result, Err(EngineError::WorkerPanic(label)) if label == "panicky"));
    }

    #[test]
    fn test_empty_batch_spawns_nothing() {
        let elements: Vec<u32> = Vec::new();
        let elapsed = run_batch(&elements, 4, "test", |_| {
            panic!("must not be called");
        })
        .unwrap();
        assert_eq!(elapsed, Duration::ZERO);
    }
}
