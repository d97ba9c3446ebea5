/// Tunables for [`crate::ComplianceEvaluator`].
///
/// Only scheduling is configurable. The flag taxonomy and risk thresholds
/// live in [`crate::policy`] and are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    pub list_concurrency: usize,
}

impl EvaluatorConfig {
    pub const DEFAULT_LIST_CONCURRENCY: usize = 8;

    pub fn with_list_concurrency(mut self, list_concurrency: usize) -> Self {
        self.list_concurrency = list_concurrency.max(1);
        self
    }

    /// Number of sessions evaluated at once by bulk operations, never zero.
    pub fn effective_list_concurrency(&self) -> usize {
        self.list_concurrency.max(1)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            list_concurrency: Self::DEFAULT_LIST_CONCURRENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_is_clamped_to_one() {
        assert_eq!(EvaluatorConfig::default().effective_list_concurrency(), 8);
        let zero = EvaluatorConfig::default().with_list_concurrency(0);
        assert_eq!(zero.list_concurrency, 1);

        let raw = EvaluatorConfig { list_concurrency: 0 };
        assert_eq!(raw.effective_list_concurrency(), 1);
    }
}
