use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::{Operation, PreviewContext, RenderStep};
use crate::error::{PreviewError, PrintRequestError};
use crate::geometry::compute_geometry;
use crate::job::{PreviewTarget, PrintJobId, PrintParameters};
use crate::platform::{
    DocumentView, HandOffReply, PreviewTransport, SettingsProvider, SettingsReply,
};
use crate::render::count_pages;
use crate::settings::SettingsResolver;
use crate::throttle::ScriptPrintThrottle;

/// Who asked for the print.
/// 列印請求的發起者。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOrigin {
    /// Direct user action (menu, shortcut, context menu).
    User,
    /// `window.print()` or similar, subject to throttling.
    Script,
}

/// Final result of a print or preview request.
/// 列印或預覽請求的最終結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintingResult {
    Ok,
    FailPrint,
    FailPreview,
    AbortPreview,
}

impl PrintRequestError {
    /// How the host should report this failure.
    pub fn printing_result(&self) -> PrintingResult {
        match self {
            PrintRequestError::Throttled | PrintRequestError::SettingsCancelled => {
                PrintingResult::AbortPreview
            }
            PrintRequestError::Preview(_) => PrintingResult::FailPreview,
            PrintRequestError::Transport(_) => PrintingResult::FailPrint,
        }
    }
}

/// Progress reported after each continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewProgress {
    Rendered {
        page_index: u32,
        rendered: u32,
        total: u32,
    },
    Finished(PrintingResult),
}

/// Summary of a job driven to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewJobResult {
    pub job_id: PrintJobId,
    pub page_count: u32,
    pub document_render_time: Duration,
    pub result: PrintingResult,
}

/// Orchestrates print requests: throttle gate, settings, preview rendering, hand-off.
/// 協調列印請求：節流檢查、設定解析、預覽渲染與交付。
pub struct PreviewController<T: PreviewTransport> {
    context: PreviewContext,
    resolver: SettingsResolver,
    throttle: ScriptPrintThrottle,
    transport: T,
    last_delivery: Option<(u32, Duration)>,
}

impl<T> PreviewController<T>
where
    T: PreviewTransport,
    T::Error: fmt::Display,
{
    pub fn new(config: &EngineConfig, transport: T) -> Self {
        Self {
            context: PreviewContext::new(config.raster),
            resolver: SettingsResolver::new(config.page_setup),
            throttle: ScriptPrintThrottle::new(config.throttle),
            transport,
            last_delivery: None,
        }
    }

    pub fn context(&self) -> &PreviewContext {
        &self.context
    }

    pub fn resolver(&self) -> &SettingsResolver {
        &self.resolver
    }

    pub fn throttle(&self) -> &ScriptPrintThrottle {
        &self.throttle
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Gates the request, collects settings and schedules the preview's pages.
    ///
    /// Any job still in flight is aborted first. Returns the id continuations must carry.
    pub fn start_preview<V, S>(
        &mut self,
        origin: PrintOrigin,
        target: PreviewTarget,
        view: &mut V,
        provider: &mut S,
        now: Instant,
    ) -> Result<PrintJobId, PrintRequestError>
    where
        V: DocumentView + ?Sized,
        S: SettingsProvider + ?Sized,
    {
        if origin == PrintOrigin::Script && !self.throttle.check_allowed(now) {
            return Err(PrintRequestError::Throttled);
        }
        if self.context.is_busy() || self.context.is_ready_to_render() {
            debug!("superseding unfinished preview");
            self.context.abort();
        }

        let expected = measure_pages(view, &target, &self.resolver.defaults());

        let payload = match provider.request_settings(&target, expected) {
            SettingsReply::Accepted(payload) => payload,
            SettingsReply::Cancelled => {
                if origin == PrintOrigin::Script {
                    self.throttle.on_user_cancelled(now);
                }
                return Err(PrintRequestError::SettingsCancelled);
            }
        };
        match origin {
            PrintOrigin::Script => self.throttle.on_user_accepted(),
            PrintOrigin::User => self.throttle.on_non_script_print(),
        }

        let job_id = self.context.init_with_target(target)?;
        let params = match self
            .resolver
            .resolve_with_layout(&payload, |params| measure_pages(view, &target, params))
        {
            Ok(params) => params,
            Err(err) => {
                self.context.abort();
                return Err(err.into());
            }
        };
        self.begin(params, view)?;
        Ok(job_id)
    }

    /// Advances the job tagged `job_id` by one page, or delivers it when complete.
    pub fn continue_preview<V>(
        &mut self,
        job_id: PrintJobId,
        view: &mut V,
    ) -> Result<PreviewProgress, PrintRequestError>
    where
        V: DocumentView + ?Sized,
    {
        match self.context.render_next_page_for(job_id, view)? {
            RenderStep::Page(page_index) => {
                let rendered = self.context.rendered_page_count();
                let total = self.context.total_page_count();
                if let Err(err) = self
                    .transport
                    .page_rendered(job_id, page_index, rendered, total)
                {
                    self.context.abort();
                    return Err(PrintRequestError::Transport(err.to_string()));
                }
                Ok(PreviewProgress::Rendered {
                    page_index,
                    rendered,
                    total,
                })
            }
            RenderStep::Finalized => self.deliver(job_id),
        }
    }

    /// Drops the job in flight, if any.
    pub fn abort_preview(&mut self) {
        self.context.abort();
    }

    /// Runs a whole preview request, rendering every page before returning.
    pub fn run_preview<V, S>(
        &mut self,
        origin: PrintOrigin,
        target: PreviewTarget,
        view: &mut V,
        provider: &mut S,
        now: Instant,
    ) -> Result<PreviewJobResult, PrintRequestError>
    where
        V: DocumentView + ?Sized,
        S: SettingsProvider + ?Sized,
    {
        let job_id = self.start_preview(origin, target, view, provider, now)?;
        self.drive(job_id, view)
    }

    /// Prints the finished preview again with its accepted settings.
    pub fn print_from_preview<V>(&mut self, view: &mut V) -> Result<PreviewJobResult, PrintRequestError>
    where
        V: DocumentView + ?Sized,
    {
        let (Some(params), Some(target)) =
            (self.resolver.for_print_from_preview(), self.context.target())
        else {
            return Err(PreviewError::InvalidState {
                operation: Operation::InitWithTarget,
                state: self.context.state(),
            }
            .into());
        };
        self.throttle.on_non_script_print();
        let job_id = self.context.init_with_target(target)?;
        self.begin(params, view)?;
        let mut outcome = self.drive(job_id, view)?;
        if outcome.result == PrintingResult::AbortPreview {
            outcome.result = PrintingResult::FailPrint;
        }
        Ok(outcome)
    }

    fn begin<V>(&mut self, params: Arc<PrintParameters>, view: &mut V) -> Result<(), PrintRequestError>
    where
        V: DocumentView + ?Sized,
    {
        let pages = params.page_range.clone();
        if let Err(err) = self.context.begin_document(params, &pages, view) {
            self.context.abort();
            return Err(err.into());
        }
        Ok(())
    }

    fn drive<V>(&mut self, job_id: PrintJobId, view: &mut V) -> Result<PreviewJobResult, PrintRequestError>
    where
        V: DocumentView + ?Sized,
    {
        loop {
            if let PreviewProgress::Finished(result) = self.continue_preview(job_id, view)? {
                let (page_count, document_render_time) =
                    self.last_delivery.take().unwrap_or_default();
                return Ok(PreviewJobResult {
                    job_id,
                    page_count,
                    document_render_time,
                    result,
                });
            }
        }
    }

    fn deliver(&mut self, job_id: PrintJobId) -> Result<PreviewProgress, PrintRequestError> {
        let Some(output) = self.context.take_output() else {
            return Err(PreviewError::InvalidState {
                operation: Operation::Finalize,
                state: self.context.state(),
            }
            .into());
        };
        self.last_delivery = Some((output.page_count() as u32, output.document_render_time()));

        match self.transport.hand_off(job_id, output) {
            Ok(HandOffReply::Ack) => {
                info!("{job_id}: preview delivered");
                Ok(PreviewProgress::Finished(PrintingResult::Ok))
            }
            Ok(HandOffReply::Cancelled) => {
                warn!("{job_id}: host cancelled the preview");
                self.context.abort();
                Ok(PreviewProgress::Finished(PrintingResult::AbortPreview))
            }
            Err(err) => {
                self.context.abort();
                Err(PrintRequestError::Transport(err.to_string()))
            }
        }
    }
}

/// Page count of `target` laid out with the geometry and scale of `params`.
fn measure_pages<V>(view: &mut V, target: &PreviewTarget, params: &PrintParameters) -> u32
where
    V: DocumentView + ?Sized,
{
    let geometry = compute_geometry(
        params.paper_size(),
        params.printable_area,
        params.margin_mode,
        view.page_size_hint(target, 0),
    );
    count_pages(view, target, &geometry, params.scale_factor)
}
