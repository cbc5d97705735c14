//! Evaluation context passed into every kernel factory.

use crate::kernels::ErrorMode;

/// Defaults consulted while kernels are built.
///
/// `ErrorMode::Default` requested by a caller resolves to [`EvalContext::errmode`]
/// for assignments and to [`EvalContext::comparison_errmode`] for the implicit
/// conversions performed before a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalContext {
    pub errmode: ErrorMode,
    pub comparison_errmode: ErrorMode,
    /// Number of workers used by `CompiledKernel::run_strided`.
    pub default_thread_count: usize,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self {
            errmode: ErrorMode::Fractional,
            comparison_errmode: ErrorMode::None,
            default_thread_count: 1,
        }
    }
}

impl EvalContext {
    pub fn with_errmode(mut self, errmode: ErrorMode) -> Self {
        self.errmode = errmode;
        self
    }

    pub fn with_comparison_errmode(mut self, errmode: ErrorMode) -> Self {
        self.comparison_errmode = errmode;
        self
    }

    pub fn with_default_thread_count(mut self, count: usize) -> Self {
        self.default_thread_count = count.max(1);
        self
    }

    /// Replaces `ErrorMode::Default` with the configured assignment mode.
    pub fn resolve_errmode(&self, errmode: ErrorMode) -> ErrorMode {
        match errmode {
            ErrorMode::Default => match self.errmode {
                // A context configured with `Default` still has to pick something.
                ErrorMode::Default => ErrorMode::Fractional,
                other => other,
            },
            other => other,
        }
    }

    pub fn resolve_comparison_errmode(&self, errmode: ErrorMode) -> ErrorMode {
        match errmode {
            ErrorMode::Default => match self.comparison_errmode {
                ErrorMode::Default => ErrorMode::None,
                other => other,
            },
            other => other,
        }
    }
}
