use std::sync::{Arc, Mutex};
use std::time::Instant;

use printpreview_engine::{
    DialogSettings, DocumentView, HandOffReply, PageBuffer, PreviewContext, PreviewController,
    PreviewError, PreviewState, PreviewTarget, PreviewTransport, PrintOrigin, PrintParameters,
    PrintRequestError, PrintingResult, RasterOptions, RenderFault, RenderStep, RenderedOutput,
    SettingsPayload, SettingsProvider, SettingsReply, SettingsResolver, Size, TextDocument,
    EngineConfig, PrintJobId,
};

/// 150 lines lay out as three A4 pages with the default page setup.
fn three_page_document() -> TextDocument {
    TextDocument::new((0..150).map(|n| format!("    let value_{n} = {n};")).collect())
}

fn default_params() -> Arc<PrintParameters> {
    Arc::new(SettingsResolver::default().defaults())
}

/// Delegates to a [`TextDocument`] but fails to paint one page.
struct FaultyView {
    inner: TextDocument,
    failing_page: u32,
}

impl DocumentView for FaultyView {
    fn natural_page_count(&self, target: &PreviewTarget) -> u32 {
        self.inner.natural_page_count(target)
    }

    fn resize_view_for_print(&mut self, width: f32, height: f32) {
        self.inner.resize_view_for_print(width, height);
    }

    fn restore_view(&mut self) {
        self.inner.restore_view();
    }

    fn paint_region(
        &mut self,
        target: &PreviewTarget,
        page_index: u32,
        buffer: &mut PageBuffer,
    ) -> Result<(), RenderFault> {
        if page_index == self.failing_page {
            return Err(RenderFault::ViewDestroyed);
        }
        self.inner.paint_region(target, page_index, buffer)
    }
}

#[derive(Clone, Default)]
struct RecordingTransport {
    delivered: Arc<Mutex<Vec<(PrintJobId, Vec<u32>)>>>,
}

impl PreviewTransport for RecordingTransport {
    type Error = String;

    fn hand_off(
        &mut self,
        job_id: PrintJobId,
        output: RenderedOutput,
    ) -> Result<HandOffReply, Self::Error> {
        let pages = output.pages().iter().map(PageBuffer::page_index).collect();
        self.delivered
            .lock()
            .map_err(|_| "transport poisoned".to_string())?
            .push((job_id, pages));
        Ok(HandOffReply::Ack)
    }
}

struct AcceptDefaults;

struct FixedDialog(DialogSettings);

impl SettingsProvider for FixedDialog {
    fn request_settings(&mut self, _: &PreviewTarget, _: u32) -> SettingsReply {
        SettingsReply::Accepted(SettingsPayload::Interactive(self.0.clone()))
    }
}

impl SettingsProvider for AcceptDefaults {
    fn request_settings(&mut self, _: &PreviewTarget, _: u32) -> SettingsReply {
        SettingsReply::Accepted(SettingsPayload::Interactive(DialogSettings::default()))
    }
}

#[test]
fn whole_document_renders_in_order_then_finalizes() {
    let mut doc = three_page_document();
    let mut context = PreviewContext::default();
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    let total = context
        .begin_document(default_params(), &[], &mut doc)
        .expect("begin");
    assert_eq!(total, 3);
    assert_eq!(context.total_page_count(), 3);

    for expected in 0..3 {
        assert_eq!(
            context.render_next_page(&mut doc).expect("render"),
            RenderStep::Page(expected)
        );
    }
    assert_eq!(
        context.render_next_page(&mut doc).expect("finalize"),
        RenderStep::Finalized
    );
    assert_eq!(context.state(), PreviewState::Done);
    assert!(!doc.is_laid_out_for_print());

    let output = context.take_output().expect("output");
    assert_eq!(output.page_count(), 3);
    let png = output.pages()[0].encode_png().expect("encode");
    let decoded = image::load_from_memory(&png).expect("decode");
    assert_eq!(decoded.width(), output.pages()[0].width_px());
}

#[test]
fn explicit_page_list_sets_total_and_order() {
    let mut doc = three_page_document();
    let mut context = PreviewContext::default();
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    let total = context
        .begin_document(default_params(), &[2, 0], &mut doc)
        .expect("begin");
    assert_eq!(total, 2);
    assert_eq!(context.natural_page_count(), 3);
    assert_eq!(context.render_next_page(&mut doc), Ok(RenderStep::Page(0)));
    assert_eq!(context.render_next_page(&mut doc), Ok(RenderStep::Page(2)));
    assert_eq!(context.render_next_page(&mut doc), Ok(RenderStep::Finalized));
}

#[test]
fn abort_mid_job_discards_everything() {
    let mut doc = three_page_document();
    let mut context = PreviewContext::default();
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    context
        .begin_document(default_params(), &[], &mut doc)
        .expect("begin");
    context.render_next_page(&mut doc).expect("page 0");

    context.abort();
    assert_eq!(context.state(), PreviewState::Uninitialized);
    assert_eq!(context.total_page_count(), 0);
    assert!(context.page_records().is_empty());
    assert!(context.take_output().is_none());
    assert!(matches!(
        context.render_next_page(&mut doc),
        Err(PreviewError::InvalidState { .. })
    ));
}

#[test]
fn empty_document_is_rejected_and_stays_initialized() {
    let mut doc = TextDocument::from_text("");
    let mut context = PreviewContext::new(RasterOptions::default());
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    let err = context
        .begin_document(default_params(), &[], &mut doc)
        .unwrap_err();
    assert_eq!(err, PreviewError::EmptyDocument);
    assert_eq!(context.state(), PreviewState::Initialized);
}

#[test]
fn render_fault_aborts_job_and_discards_pages() {
    let mut view = FaultyView {
        inner: three_page_document(),
        failing_page: 1,
    };
    let mut context = PreviewContext::default();
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    context
        .begin_document(default_params(), &[], &mut view)
        .expect("begin");
    assert_eq!(context.render_next_page(&mut view), Ok(RenderStep::Page(0)));

    let err = context.render_next_page(&mut view).unwrap_err();
    assert_eq!(
        err,
        PreviewError::PageRender {
            page: 1,
            source: RenderFault::ViewDestroyed,
        }
    );
    assert_eq!(context.state(), PreviewState::Uninitialized);
    assert!(context.output().is_none());
    assert!(!view.inner.is_laid_out_for_print());
    assert_eq!(view.inner.view_size(), Size::new(800.0, 600.0));
}

#[test]
fn failed_page_is_never_handed_off() {
    let transport = RecordingTransport::default();
    let delivered = Arc::clone(&transport.delivered);
    let mut controller = PreviewController::new(&EngineConfig::default(), transport);
    let mut view = FaultyView {
        inner: three_page_document(),
        failing_page: 1,
    };

    let err = controller
        .run_preview(
            PrintOrigin::User,
            PreviewTarget::WholeDocument,
            &mut view,
            &mut AcceptDefaults,
            Instant::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PrintRequestError::Preview(PreviewError::PageRender { page: 1, .. })
    ));
    assert_eq!(err.printing_result(), PrintingResult::FailPreview);
    assert!(delivered.lock().expect("lock").is_empty());
    assert_eq!(controller.context().state(), PreviewState::Uninitialized);
}

#[test]
fn node_target_previews_only_its_lines() {
    let transport = RecordingTransport::default();
    let delivered = Arc::clone(&transport.delivered);
    let mut controller = PreviewController::new(&EngineConfig::default(), transport);
    let mut doc = three_page_document();
    let node = doc.add_node(0..20);

    let result = controller
        .run_preview(
            PrintOrigin::User,
            PreviewTarget::Node(node),
            &mut doc,
            &mut AcceptDefaults,
            Instant::now(),
        )
        .expect("preview");
    assert_eq!(result.result, PrintingResult::Ok);
    assert_eq!(result.page_count, 1);
    let delivered = delivered.lock().expect("lock");
    assert_eq!(delivered.as_slice(), &[(result.job_id, vec![0])]);
}

#[test]
fn tiny_scale_factor_lays_everything_on_one_page() {
    let mut doc = three_page_document();
    let params = Arc::new(PrintParameters {
        scale_factor: 1e-20,
        ..SettingsResolver::default().defaults()
    });
    let mut context = PreviewContext::default();
    context
        .init_with_target(PreviewTarget::WholeDocument)
        .expect("init");
    let total = context
        .begin_document(params, &[], &mut doc)
        .expect("begin");
    assert_eq!(total, 1);
    assert_eq!(context.render_next_page(&mut doc), Ok(RenderStep::Page(0)));
    assert_eq!(context.render_next_page(&mut doc), Ok(RenderStep::Finalized));
    assert!(!doc.is_laid_out_for_print());
}

#[test]
fn tiny_scale_factor_previews_through_controller() {
    let transport = RecordingTransport::default();
    let delivered = Arc::clone(&transport.delivered);
    let mut controller = PreviewController::new(&EngineConfig::default(), transport);
    let mut doc = three_page_document();
    let mut provider = FixedDialog(DialogSettings {
        scale_factor: 1e-20,
        ..DialogSettings::default()
    });

    let result = controller
        .run_preview(
            PrintOrigin::User,
            PreviewTarget::WholeDocument,
            &mut doc,
            &mut provider,
            Instant::now(),
        )
        .expect("preview");
    assert_eq!(result.page_count, 1);
    assert_eq!(delivered.lock().expect("lock").len(), 1);
}
