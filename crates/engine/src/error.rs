use thiserror::Error;

use crate::context::{Operation, PreviewState};
use crate::job::PrintJobId;

/// Failure reported by the document/rendering collaborator while painting a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderFault {
    #[error("document is detached from its frame")]
    Detached,
    #[error("document view has been destroyed")]
    ViewDestroyed,
    #[error("{0}")]
    Engine(String),
}

/// Errors raised by the preview state machine and its render pipeline.
/// 預覽狀態機與頁面渲染管線可能發生的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("{operation} is not valid while the preview is {state}")]
    InvalidState {
        operation: Operation,
        state: PreviewState,
    },
    #[error("preview target has no renderable pages")]
    EmptyDocument,
    #[error("invalid print setting `{field}`: {reason}")]
    SettingsValidation { field: &'static str, reason: String },
    #[error("failed to render page {page}: {source}")]
    PageRender {
        page: u32,
        #[source]
        source: RenderFault,
    },
    #[error("continuation for {received} does not match current job {expected:?}")]
    StaleContinuation {
        expected: Option<PrintJobId>,
        received: PrintJobId,
    },
}

impl PreviewError {
    pub(crate) fn settings(field: &'static str, reason: impl Into<String>) -> Self {
        PreviewError::SettingsValidation {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised while servicing a print request end-to-end.
/// 處理列印請求時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum PrintRequestError {
    #[error("scripted print request blocked after repeated cancellations")]
    Throttled,
    #[error("print settings request was cancelled")]
    SettingsCancelled,
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("transport failed: {0}")]
    Transport(String),
}
