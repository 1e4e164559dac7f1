//! Preview state machine.
//!
//! A job walks `Uninitialized -> Initialized -> Rendering -> Done`; `abort` returns to
//! `Uninitialized` from anywhere. Pages are rendered one per call so the caller keeps
//! control between pages and may abort at any point.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::PreviewError;
use crate::geometry::compute_geometry;
use crate::job::{PreviewTarget, PrintJobId, PrintParameters};
use crate::platform::DocumentView;
use crate::render::{count_pages, render_page, PageBuffer, RasterOptions};

/// Lifecycle state of the preview context.
/// 預覽內容的生命週期狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    /// Not ready to render.
    Uninitialized,
    /// Target set, waiting for settings.
    Initialized,
    Rendering,
    /// Finished rendering; output sealed.
    Done,
}

impl fmt::Display for PreviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PreviewState::Uninitialized => "uninitialized",
            PreviewState::Initialized => "initialized",
            PreviewState::Rendering => "rendering",
            PreviewState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Operations subject to state validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InitWithTarget,
    BeginDocument,
    RenderNextPage,
    Finalize,
    Abort,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::InitWithTarget => "init_with_target",
            Operation::BeginDocument => "begin_document",
            Operation::RenderNextPage => "render_next_page",
            Operation::Finalize => "finalize",
            Operation::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// The state `operation` leads to from `state`, or `None` when it is not allowed.
pub fn transition(state: PreviewState, operation: Operation) -> Option<PreviewState> {
    use Operation::*;
    use PreviewState::*;

    match (operation, state) {
        (InitWithTarget, Uninitialized | Done) => Some(Initialized),
        (BeginDocument, Initialized) => Some(Rendering),
        (RenderNextPage, Rendering) => Some(Rendering),
        (Finalize, Rendering) => Some(Done),
        (Abort, _) => Some(Uninitialized),
        _ => None,
    }
}

/// Per-page bookkeeping for the current job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    index: u32,
    rendered: bool,
    render_time: Option<Duration>,
}

impl PageRecord {
    fn scheduled(index: u32) -> Self {
        Self {
            index,
            rendered: false,
            render_time: None,
        }
    }

    /// Zero-based page index within the document.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn render_time(&self) -> Option<Duration> {
        self.render_time
    }
}

/// Sealed set of pages produced by a finished job.
/// 已完成作業所產生、不可再修改的頁面集合。
#[derive(Debug, Clone)]
pub struct RenderedOutput {
    job_id: PrintJobId,
    pages: Vec<PageBuffer>,
    document_render_time: Duration,
}

impl RenderedOutput {
    pub fn job_id(&self) -> PrintJobId {
        self.job_id
    }

    pub fn pages(&self) -> &[PageBuffer] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn document_render_time(&self) -> Duration {
        self.document_render_time
    }

    pub fn into_pages(self) -> Vec<PageBuffer> {
        self.pages
    }
}

/// What a call to [`PreviewContext::render_next_page`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    /// The page with this zero-based index was rendered.
    Page(u32),
    /// No pages were left; the document was finalized.
    Finalized,
}

/// Keeps track of a print preview job between calls.
/// 在多次呼叫之間追蹤列印預覽作業的狀態。
#[derive(Debug)]
pub struct PreviewContext {
    state: PreviewState,
    raster: RasterOptions,
    job_id: Option<PrintJobId>,
    target: Option<PreviewTarget>,
    params: Option<Arc<PrintParameters>>,
    natural_page_count: u32,
    records: Vec<PageRecord>,
    pending: Vec<PageBuffer>,
    output: Option<RenderedOutput>,
    document_render_time: Duration,
    begin_time: Option<Instant>,
}

impl Default for PreviewContext {
    fn default() -> Self {
        Self::new(RasterOptions::default())
    }
}

impl PreviewContext {
    pub fn new(raster: RasterOptions) -> Self {
        Self {
            state: PreviewState::Uninitialized,
            raster,
            job_id: None,
            target: None,
            params: None,
            natural_page_count: 0,
            records: Vec::new(),
            pending: Vec::new(),
            output: None,
            document_render_time: Duration::ZERO,
            begin_time: None,
        }
    }

    /// Starts a new job for `target`, dropping everything left from the previous one.
    pub fn init_with_target(&mut self, target: PreviewTarget) -> Result<PrintJobId, PreviewError> {
        let next = self.check(Operation::InitWithTarget)?;
        self.clear_job();
        let job_id = PrintJobId::next();
        self.job_id = Some(job_id);
        self.target = Some(target);
        debug!("{job_id}: previewing {target}");
        self.enter(next);
        Ok(job_id)
    }

    /// Lays the target out with `params` and schedules its pages.
    ///
    /// An empty `pages` list schedules every page. Returns the number of pages that
    /// will be rendered. On failure the context stays `Initialized`.
    pub fn begin_document<V: DocumentView + ?Sized>(
        &mut self,
        params: Arc<PrintParameters>,
        pages: &[u32],
        view: &mut V,
    ) -> Result<u32, PreviewError> {
        let next = self.check(Operation::BeginDocument)?;
        let target = self.current_target(Operation::BeginDocument)?;

        let geometry = compute_geometry(
            params.paper_size(),
            params.printable_area,
            params.margin_mode,
            view.page_size_hint(&target, 0),
        );
        let natural = count_pages(view, &target, &geometry, params.scale_factor);
        if natural == 0 {
            warn!("{target} has no printable pages");
            return Err(PreviewError::EmptyDocument);
        }

        let mut schedule = pages.to_vec();
        schedule.sort_unstable();
        schedule.dedup();
        if let Some(last) = schedule.last().filter(|last| **last >= natural) {
            return Err(PreviewError::settings(
                "pageRange",
                format!("page index {last} is outside a document of {natural} pages"),
            ));
        }
        if schedule.is_empty() {
            schedule = (0..natural).collect();
        }

        self.natural_page_count = natural;
        self.records = schedule.into_iter().map(PageRecord::scheduled).collect();
        self.pending = Vec::with_capacity(self.records.len());
        self.params = Some(params);
        self.begin_time = Some(Instant::now());
        self.enter(next);
        Ok(self.total_page_count())
    }

    /// Renders the next scheduled page, or finalizes when every page is done.
    ///
    /// A render failure aborts the whole job before the error is returned.
    pub fn render_next_page<V: DocumentView + ?Sized>(
        &mut self,
        view: &mut V,
    ) -> Result<RenderStep, PreviewError> {
        let next = self.check(Operation::RenderNextPage)?;
        let Some(position) = self.records.iter().position(|record| !record.rendered) else {
            self.finalize()?;
            return Ok(RenderStep::Finalized);
        };
        let target = self.current_target(Operation::RenderNextPage)?;
        let Some(params) = self.params.clone() else {
            return Err(self.invalid(Operation::RenderNextPage));
        };

        let page_index = self.records[position].index;
        let started = Instant::now();
        let geometry = compute_geometry(
            params.paper_size(),
            params.printable_area,
            params.margin_mode,
            view.page_size_hint(&target, page_index),
        );

        match render_page(view, &target, page_index, &params, &geometry, self.raster) {
            Ok(buffer) => {
                let elapsed = started.elapsed();
                self.pending.push(buffer);
                let record = &mut self.records[position];
                record.rendered = true;
                record.render_time = Some(elapsed);
                self.document_render_time += elapsed;
                self.state = next;
                Ok(RenderStep::Page(page_index))
            }
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    /// Like [`render_next_page`](Self::render_next_page), but rejects continuations
    /// issued for a job other than the current one.
    pub fn render_next_page_for<V: DocumentView + ?Sized>(
        &mut self,
        job_id: PrintJobId,
        view: &mut V,
    ) -> Result<RenderStep, PreviewError> {
        if self.job_id != Some(job_id) {
            debug!("ignoring stale continuation for {job_id}");
            return Err(PreviewError::StaleContinuation {
                expected: self.job_id,
                received: job_id,
            });
        }
        self.render_next_page(view)
    }

    /// Seals the rendered pages. Every scheduled page must have been rendered.
    pub fn finalize(&mut self) -> Result<(), PreviewError> {
        let next = self.check(Operation::Finalize)?;
        if self.records.iter().any(|record| !record.rendered) {
            return Err(self.invalid(Operation::Finalize));
        }
        let Some(job_id) = self.job_id else {
            return Err(self.invalid(Operation::Finalize));
        };

        let pages = mem::take(&mut self.pending);
        let elapsed = self.begin_time.map(|begin| begin.elapsed()).unwrap_or_default();
        info!(
            "{job_id}: {} pages rendered in {:?} ({:?} per page, {:?} total)",
            pages.len(),
            self.document_render_time,
            self.average_page_time().unwrap_or_default(),
            elapsed
        );
        self.output = Some(RenderedOutput {
            job_id,
            pages,
            document_render_time: self.document_render_time,
        });
        self.enter(next);
        Ok(())
    }

    /// Drops the current job and everything it produced. Always succeeds.
    pub fn abort(&mut self) {
        if self.state != PreviewState::Uninitialized {
            if let Some(job_id) = self.job_id {
                debug!(
                    "{job_id}: aborted while {} after {} pages",
                    self.state,
                    self.rendered_page_count()
                );
            }
        }
        self.clear_job();
        self.enter(PreviewState::Uninitialized);
    }

    /// Hands the sealed output to the caller; only available once `Done`.
    pub fn take_output(&mut self) -> Option<RenderedOutput> {
        if self.state == PreviewState::Done {
            self.output.take()
        } else {
            None
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == PreviewState::Rendering
    }

    pub fn is_ready_to_render(&self) -> bool {
        self.state == PreviewState::Initialized
    }

    pub fn job_id(&self) -> Option<PrintJobId> {
        self.job_id
    }

    pub fn target(&self) -> Option<PreviewTarget> {
        self.target
    }

    pub fn print_params(&self) -> Option<&Arc<PrintParameters>> {
        self.params.as_ref()
    }

    /// Number of pages scheduled for this job; 0 before `begin_document`.
    pub fn total_page_count(&self) -> u32 {
        self.records.len() as u32
    }

    /// Page count of the whole target under the job's layout.
    pub fn natural_page_count(&self) -> u32 {
        self.natural_page_count
    }

    pub fn rendered_page_count(&self) -> u32 {
        self.records.iter().filter(|record| record.rendered).count() as u32
    }

    pub fn page_records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Sum of the wall time spent rendering pages.
    pub fn accumulated_render_time(&self) -> Duration {
        self.document_render_time
    }

    pub fn average_page_time(&self) -> Option<Duration> {
        let rendered = self.rendered_page_count();
        (rendered > 0).then(|| self.document_render_time / rendered)
    }

    /// Wall time since `begin_document`, including time spent outside page renders.
    pub fn elapsed_since_begin(&self) -> Option<Duration> {
        self.begin_time.map(|begin| begin.elapsed())
    }

    pub fn output(&self) -> Option<&RenderedOutput> {
        self.output.as_ref()
    }

    fn check(&self, operation: Operation) -> Result<PreviewState, PreviewError> {
        transition(self.state, operation).ok_or_else(|| self.invalid(operation))
    }

    fn invalid(&self, operation: Operation) -> PreviewError {
        PreviewError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn current_target(&self, operation: Operation) -> Result<PreviewTarget, PreviewError> {
        self.target.ok_or_else(|| self.invalid(operation))
    }

    fn enter(&mut self, next: PreviewState) {
        if self.state != next {
            debug!("preview state {} -> {}", self.state, next);
        }
        self.state = next;
    }

    fn clear_job(&mut self) {
        self.job_id = None;
        self.target = None;
        self.params = None;
        self.natural_page_count = 0;
        self.records.clear();
        self.pending.clear();
        self.output = None;
        self.document_render_time = Duration::ZERO;
        self.begin_time = None;
    }
}
