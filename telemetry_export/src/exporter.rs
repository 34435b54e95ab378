use async_trait::async_trait;

/// Outcome of one exporter call. Batches are fire-and-forget from the
/// producer's perspective; this result only feeds logging and the combined
/// verdict of flush/shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportResult {
    Success,
    Failure,
}

impl ExportResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// All-must-succeed combinator.
    pub fn and(self, other: Self) -> Self {
        if self.is_success() && other.is_success() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl<E> From<Result<(), E>> for ExportResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(_) => Self::Failure,
        }
    }
}

/// A backend that consumes finished batches. Implementations are called
/// from the single export worker only and should not block indefinitely;
/// the worker enforces its own deadline around every call.
#[async_trait]
pub trait Exporter<T>: Send + Sync {
    async fn export(&self, batch: Vec<T>) -> ExportResult;

    async fn flush(&self) -> ExportResult {
        ExportResult::Success
    }

    /// Release backend resources. Must be idempotent.
    async fn shutdown(&self) -> ExportResult {
        ExportResult::Success
    }
}

#[async_trait]
impl<T: Send + 'static, E: Exporter<T> + ?Sized> Exporter<T> for std::sync::Arc<E> {
    async fn export(&self, batch: Vec<T>) -> ExportResult {
        self.as_ref().export(batch).await
    }

    async fn flush(&self) -> ExportResult {
        self.as_ref().flush().await
    }

    async fn shutdown(&self) -> ExportResult {
        self.as_ref().shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_combinator() {
        assert_eq!(
            ExportResult::Success.and(ExportResult::Success),
            ExportResult::Success
        );
        assert_eq!(
            ExportResult::Success.and(ExportResult::Failure),
            ExportResult::Failure
        );
        assert_eq!(
            ExportResult::Failure.and(ExportResult::Success),
            ExportResult::Failure
        );
    }

    #[test]
    fn test_from_result() {
        let ok: Result<(), String> = Ok(());
        let err: Result<(), String> = Err("boom".to_string());
        assert_eq!(ExportResult::from(ok), ExportResult::Success);
        assert_eq!(ExportResult::from(err), ExportResult::Failure);
    }
}
