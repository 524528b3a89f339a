//! Runtime configuration carried from the builder into the compiled graph.

/// Execution settings for a compiled graph.
///
/// Currently just the worker count: the maximum number of node bodies in
/// flight at once. `0` (the default) resolves to the host's available
/// hardware concurrency at run time.
///
/// The bound applies per graph level: a sub-module group runs as a nested
/// graph with its own worker budget, so total in-flight bodies can exceed
/// `workers` while a group is executing.
///
/// # Examples
///
/// ```rust
/// use taskmesh::runtimes::RuntimeConfig;
///
/// let config = RuntimeConfig::new(8);
/// assert_eq!(config.workers(), 8);
/// assert_eq!(RuntimeConfig::default().workers(), 0); // host concurrency
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    workers: usize,
}

impl RuntimeConfig {
    /// Creates a configuration with an explicit worker bound; `0` means host
    /// concurrency.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }

    /// The configured worker bound (`0` = host concurrency).
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The effective worker bound, never zero.
    pub(crate) fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resolves_to_host_concurrency() {
        assert!(RuntimeConfig::default().resolve_workers() >= 1);
        assert_eq!(RuntimeConfig::new(3).resolve_workers(), 3);
    }
}
