use crate::context::RenderedOutput;
use crate::error::RenderFault;
use crate::job::{PreviewTarget, PrintJobId, Size};
use crate::render::PageBuffer;
use crate::settings::SettingsPayload;
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Document/frame collaborator that lays out and paints content.
/// 負責排版與繪製內容的文件／框架協作者。
///
/// The view is shared with other consumers of the document; the engine only borrows
/// it for the duration of a single page render and always restores it.
pub trait DocumentView {
    /// Page count of `target` under the view's current layout size.
    fn natural_page_count(&self, target: &PreviewTarget) -> u32;
    /// Page size the document asks for on `page_index` (CSS `@page { size }`), if any.
    fn page_size_hint(&self, target: &PreviewTarget, page_index: u32) -> Option<Size> {
        let _ = (target, page_index);
        None
    }
    fn resize_view_for_print(&mut self, width: f32, height: f32);
    /// Puts back the size and scroll offset in effect before the matching resize.
    fn restore_view(&mut self);
    fn paint_region(
        &mut self,
        target: &PreviewTarget,
        page_index: u32,
        buffer: &mut PageBuffer,
    ) -> Result<(), RenderFault>;
}

/// Outcome of asking the settings/UI collaborator for print settings.
#[derive(Debug, Clone)]
pub enum SettingsReply {
    Accepted(SettingsPayload),
    Cancelled,
}

/// Settings/UI collaborator: the print dialog, a cloud job or a local job.
/// 設定／介面協作者：列印對話框、雲端或本機列印作業。
pub trait SettingsProvider {
    fn request_settings(&mut self, target: &PreviewTarget, expected_page_count: u32)
        -> SettingsReply;
}

/// Reply received after handing a finished document to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandOffReply {
    Ack,
    Cancelled,
}

/// Carries rendered pages to the consumer in the host process.
/// 將已渲染頁面傳送給主程序中的接收端。
pub trait PreviewTransport {
    type Error;

    /// Progress notification sent after every rendered page.
    fn page_rendered(
        &mut self,
        job_id: PrintJobId,
        page_index: u32,
        rendered: u32,
        total: u32,
    ) -> Result<(), Self::Error> {
        let _ = (job_id, page_index, rendered, total);
        Ok(())
    }

    fn hand_off(
        &mut self,
        job_id: PrintJobId,
        output: RenderedOutput,
    ) -> Result<HandOffReply, Self::Error>;
}

/// Hand-off recorded by the mock transport.
/// 模擬傳輸介面所記錄的交付資訊。
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedHandOff {
    pub job_id: PrintJobId,
    pub pages: Vec<u32>,
}

/// In-memory implementation of [`PreviewTransport`] used for tests.
/// 測試使用的記憶體內部傳輸介面實作。
#[cfg(test)]
#[derive(Clone)]
pub struct MockTransport {
    pub reply: HandOffReply,
    pub progress: Arc<Mutex<Vec<(u32, u32, u32)>>>,
    pub handoffs: Arc<Mutex<Vec<RecordedHandOff>>>,
}

#[cfg(test)]
impl MockTransport {
    pub fn replying(reply: HandOffReply) -> Self {
        Self {
            reply,
            progress: Arc::default(),
            handoffs: Arc::default(),
        }
    }

    pub fn drain_handoffs(&self) -> Vec<RecordedHandOff> {
        self.handoffs.lock().expect("lock poisoned").drain(..).collect()
    }
}

#[cfg(test)]
impl PreviewTransport for MockTransport {
    type Error = String;

    fn page_rendered(
        &mut self,
        _job_id: PrintJobId,
        page_index: u32,
        rendered: u32,
        total: u32,
    ) -> Result<(), Self::Error> {
        self.progress
            .lock()
            .expect("lock poisoned")
            .push((page_index, rendered, total));
        Ok(())
    }

    fn hand_off(
        &mut self,
        job_id: PrintJobId,
        output: RenderedOutput,
    ) -> Result<HandOffReply, Self::Error> {
        self.handoffs
            .lock()
            .expect("lock poisoned")
            .push(RecordedHandOff {
                job_id,
                pages: output.pages().iter().map(PageBuffer::page_index).collect(),
            });
        Ok(self.reply)
    }
}

/// Settings provider returning a fixed reply, used by tests.
#[cfg(test)]
pub struct FixedSettings(pub SettingsReply);

#[cfg(test)]
impl SettingsProvider for FixedSettings {
    fn request_settings(&mut self, _: &PreviewTarget, _: u32) -> SettingsReply {
        self.0.clone()
    }
}
