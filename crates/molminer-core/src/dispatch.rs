//! Bounded parallel execution of per-page work units.

use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

/// Runs one work unit per page with a concurrency cap.
///
/// A failed unit is logged and skipped; the remaining pages still run.
/// Results come back sorted by page regardless of completion order.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    jobs: usize,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(jobs: usize) -> Self {
        Self { jobs: if jobs == 0 { 1 } else { jobs } }
    }

    #[must_use]
    pub fn default_jobs() -> usize {
        std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
    }

    #[must_use]
    pub const fn jobs(&self) -> usize {
        self.jobs
    }

    pub async fn run<T, F, Fut, E>(
        &self,
        units: Vec<(PathBuf, u32)>,
        work: F,
    ) -> Vec<(u32, T)>
    where
        T: Send + 'static,
        F: Fn(PathBuf, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let work = Arc::new(work);
        let mut handles = Vec::with_capacity(units.len());

        for (path, page) in units {
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            handles.push(tokio::spawn(async move {
                // Holds a permit for the duration of the unit.
                let _permit = semaphore.acquire_owned().await;
                match work(path.clone(), page).await {
                    Ok(value) => Some((page, value)),
                    Err(err) => {
                        warn!(page, path = %path.display(), error = %err, "page skipped");
                        None
                    }
                }
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(item)) => results.push(item),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "worker task panicked"),
            }
        }
        results.sort_by_key(|(page, _)| *page);
        results
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Self::default_jobs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(page: u32) -> (PathBuf, u32) {
        (PathBuf::from(format!("page-{page}.png")), page)
    }

    #[tokio::test]
    async fn results_sorted_by_page() {
        let dispatcher = Dispatcher::new(4);
        let results = dispatcher
            .run(vec![unit(3), unit(1), unit(2)], |_, page| async move {
                // Later pages finish first.
                tokio::time::sleep(std::time::Duration::from_millis(u64::from(4 - page))).await;
                Ok::<_, String>(format!("page {page}"))
            })
            .await;
        let pages: Vec<u32> = results.iter().map(|(page, _)| *page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert_eq!(results[0].1, "page 1");
    }

    #[tokio::test]
    async fn failed_unit_is_skipped() {
        let dispatcher = Dispatcher::new(2);
        let results = dispatcher
            .run(vec![unit(1), unit(2)], |_, page| async move {
                if page == 1 {
                    Err("boom".to_owned())
                } else {
                    Ok(page)
                }
            })
            .await;
        assert_eq!(results, vec![(2, 2)]);
    }

    #[test]
    fn zero_jobs_clamps_to_one() {
        assert_eq!(Dispatcher::new(0).jobs(), 1);
    }
}
