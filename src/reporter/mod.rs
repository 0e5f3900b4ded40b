//! Per-frame latency reporter.
//!
//! A `FrameReporter` follows one frame from the beginning of its impl-side
//! work until it is presented, dropped or skipped. The driver feeds it stage
//! transitions, raw timing snapshots and the input events the frame serves;
//! when the reporter is finalized (explicitly, or when its last handle is
//! dropped) it classifies the frame and emits everything to the sinks of its
//! `GlobalMetricsTrackers`.
//!
//! Reporters live behind `ReporterHandle`s (`Rc<RefCell<_>>`). When impl work
//! for the next frame starts before main-thread work of the current one
//! committed, the current reporter is forked: the fork starts out as a
//! *partial update* and keeps a weak edge to its *decider*, which may later
//! clear that flag if it turns out no main-thread update was coming.
//!
//! ```
//! use std::rc::Rc;
//! use frame_reporter::clock::ManualClock;
//! use frame_reporter::frame_info::{FrameFinalState, FrameTerminationStatus};
//! use frame_reporter::recorder::Recorders;
//! use frame_reporter::reporter::{FrameReporter, FrameReporterParams};
//! use frame_reporter::sinks::MetricsSampler;
//! use frame_reporter::stage::StageType;
//! use frame_reporter::timing::{BeginFrameArgs, BeginFrameId};
//!
//! let recorders = Recorders::new();
//! let clock = Rc::new(ManualClock::new(0));
//! let args = BeginFrameArgs::new(BeginFrameId::new(1, 1), 1_000, 16_000_000);
//!
//! let reporter = FrameReporter::create(
//!     FrameReporterParams::new(args),
//!     recorders.trackers(MetricsSampler::always()),
//!     clock,
//! );
//! {
//!     let mut r = reporter.borrow_mut();
//!     r.start_stage(StageType::BeginImplFrameToSendBeginMainFrame, 1_000);
//!     r.start_stage(StageType::EndActivateToSubmitCompositorFrame, 2_000);
//!     r.terminate_frame(FrameTerminationStatus::PresentedFrame, 9_000);
//!     r.finalize();
//!     assert_eq!(r.frame_info().unwrap().final_state, FrameFinalState::PresentedAll);
//! }
//! ```

mod histograms;
mod scroll_jank;
mod trace_events;

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

pub use histograms::{
    compositor_latency_histogram_name, COMPOSITOR_LATENCY_BUCKETING, EVENT_LATENCY_BUCKETING,
};

use crate::breakdown::{ProcessedBlinkBreakdown, ProcessedVizBreakdown};
use crate::clock::{Duration, TickClock, Timestamp, NANOS_PER_MILLI};
use crate::event_metrics::EventMetrics;
use crate::frame_info::{
    generate_frame_info, ClassifierInput, FrameFinalState, FrameInfo, FrameSkippedReason,
    FrameTerminationStatus, SmoothEffectDrivingThread, SmoothThread,
};
use crate::sinks::{FrameReportType, FrameReportTypes, GlobalMetricsTrackers, LatencyReport};
use crate::stage::{StageData, StageTimeline, StageType};
use crate::timing::{BeginFrameArgs, BeginMainFrameMetrics, FrameTimingDetails};
use crate::trackers::ActiveTrackers;
use crate::utils::RingBuffer;

/// Maximum number of adopted forks a decider keeps alive.
pub const MAX_OWNED_PARTIAL_UPDATE_DEPENDENTS: usize = 300;

/// Frames taking longer than this from frame time to termination are
/// flagged as high latency in traces.
pub const HIGH_LATENCY_MIN: Duration = 75 * NANOS_PER_MILLI;

pub type WeakReporter = Weak<RefCell<FrameReporter>>;

/// Partial update flag of a reporter, shared with whoever may clear it. A
/// decider clears it without borrowing the dependent.
type PartialUpdateFlag = Rc<Cell<bool>>;

/// Edge from a decider to one of its dependents.
struct DependentEdge {
    reporter: WeakReporter,
    has_partial_update: PartialUpdateFlag,
}

impl DependentEdge {
    fn is_live(&self) -> bool {
        self.reporter.strong_count() > 0
    }
}

/// Shared handle on a reporter. The reporter is finalized when the last
/// handle goes away.
#[derive(Clone)]
pub struct ReporterHandle {
    inner: Rc<RefCell<FrameReporter>>,
    has_partial_update: PartialUpdateFlag,
}

impl ReporterHandle {
    pub fn borrow(&self) -> Ref<'_, FrameReporter> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, FrameReporter> {
        self.inner.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakReporter {
        Rc::downgrade(&self.inner)
    }

    pub fn ptr_eq(&self, other: &ReporterHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Makes `decider` decide whether this reporter is a partial update.
    ///
    /// Refused (returns false) if it would nest deciders, or if either
    /// reporter is currently borrowed.
    pub fn set_partial_update_decider(&self, decider: &ReporterHandle) -> bool {
        if self.ptr_eq(decider) {
            return false;
        }

        let (Ok(mut dependent), Ok(mut decider)) =
            (self.inner.try_borrow_mut(), decider.inner.try_borrow_mut())
        else {
            tracing::warn!("reporter busy, partial update decider not set");
            return false;
        };

        if dependent.partial_update_decider.is_some()
            || !dependent.partial_update_dependents.is_empty()
            || decider.partial_update_decider.is_some()
        {
            tracing::warn!(
                sequence = dependent.args.frame_id.sequence_number,
                "partial update deciders cannot be nested"
            );
            return false;
        }

        decider.attach_dependent(&mut dependent);
        true
    }
}

/// Creation parameters of a reporter.
#[derive(Debug, Clone, Default)]
pub struct FrameReporterParams {
    pub args: BeginFrameArgs,
    pub active_trackers: ActiveTrackers,
    pub smooth_thread: SmoothThread,
    pub scrolling_thread: SmoothEffectDrivingThread,
    pub layer_tree_host_id: i32,
}

impl FrameReporterParams {
    pub fn new(args: BeginFrameArgs) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }
}

/// Breakdown tables materialized at finalize time.
pub(crate) struct ProcessedBreakdowns {
    blink: ProcessedBlinkBreakdown,
    viz: ProcessedVizBreakdown,
}

pub struct FrameReporter {
    self_ref: WeakReporter,

    args: BeginFrameArgs,
    active_trackers: ActiveTrackers,
    smooth_thread: SmoothThread,
    scrolling_thread: SmoothEffectDrivingThread,
    layer_tree_host_id: i32,
    trackers: GlobalMetricsTrackers,
    clock: Rc<dyn TickClock>,

    timeline: StageTimeline,
    blink_breakdown: BeginMainFrameMetrics,
    begin_main_frame_start: Option<Timestamp>,
    viz_breakdown: FrameTimingDetails,
    processed: Option<ProcessedBreakdowns>,
    events_metrics: Vec<EventMetrics>,

    termination_status: FrameTerminationStatus,
    termination_time: Option<Timestamp>,
    frame_skip_reason: Option<FrameSkippedReason>,
    did_finish_impl_frame: bool,
    impl_frame_finish_time: Option<Timestamp>,
    main_frame_abort_time: Option<Timestamp>,
    did_not_produce_frame_time: Option<Timestamp>,

    has_partial_update: PartialUpdateFlag,
    is_accompanied_by_main_thread_update: bool,
    want_new_tree: bool,
    created_new_tree: bool,
    invalidate_raster_scroll: bool,
    is_forked: bool,
    is_backfill: bool,
    checkerboarded_needs_raster: bool,
    checkerboarded_needs_record: bool,
    normalized_invalidated_area: Option<f32>,

    partial_update_decider: Option<WeakReporter>,
    partial_update_dependents: VecDeque<DependentEdge>,
    owned_partial_update_dependents: RingBuffer<ReporterHandle>,

    report_types: FrameReportTypes,
    frame_info: Option<FrameInfo>,
}

impl FrameReporter {
    /// Creates a reporter and announces its frame to the frame sorter.
    pub fn create(
        params: FrameReporterParams,
        trackers: GlobalMetricsTrackers,
        clock: Rc<dyn TickClock>,
    ) -> ReporterHandle {
        trackers.frame_sorter.add_new_frame(&params.args);

        let has_partial_update = PartialUpdateFlag::default();
        let inner = Rc::new_cyclic(|self_ref| {
            RefCell::new(FrameReporter {
                self_ref: self_ref.clone(),
                args: params.args,
                active_trackers: params.active_trackers,
                smooth_thread: params.smooth_thread,
                scrolling_thread: params.scrolling_thread,
                layer_tree_host_id: params.layer_tree_host_id,
                trackers,
                clock,
                timeline: StageTimeline::new(),
                blink_breakdown: BeginMainFrameMetrics::default(),
                begin_main_frame_start: None,
                viz_breakdown: FrameTimingDetails::default(),
                processed: None,
                events_metrics: Vec::new(),
                termination_status: FrameTerminationStatus::Unknown,
                termination_time: None,
                frame_skip_reason: None,
                did_finish_impl_frame: false,
                impl_frame_finish_time: None,
                main_frame_abort_time: None,
                did_not_produce_frame_time: None,
                has_partial_update: has_partial_update.clone(),
                is_accompanied_by_main_thread_update: false,
                want_new_tree: false,
                created_new_tree: false,
                invalidate_raster_scroll: false,
                is_forked: false,
                is_backfill: false,
                checkerboarded_needs_raster: false,
                checkerboarded_needs_record: false,
                normalized_invalidated_area: None,
                partial_update_decider: None,
                partial_update_dependents: VecDeque::new(),
                owned_partial_update_dependents: RingBuffer::new(MAX_OWNED_PARTIAL_UPDATE_DEPENDENTS),
                report_types: FrameReportTypes::default(),
                frame_info: None,
            })
        });

        ReporterHandle {
            inner,
            has_partial_update,
        }
    }

    fn is_terminated(&self) -> bool {
        self.termination_status != FrameTerminationStatus::Unknown || self.frame_info.is_some()
    }

    /// Closes the open stage and opens `stage_type`, unless the frame is
    /// already terminated.
    pub fn start_stage(&mut self, stage_type: StageType, ts: Timestamp) {
        if self.is_terminated() {
            return;
        }
        self.timeline.start_stage(stage_type, ts);
    }

    /// Terminates the frame. Only the first call has an effect.
    pub fn terminate_frame(&mut self, status: FrameTerminationStatus, ts: Timestamp) {
        if status == FrameTerminationStatus::Unknown {
            tracing::debug!("ignoring termination with unknown status");
            return;
        }
        self.terminate(status, ts);
    }

    fn terminate(&mut self, status: FrameTerminationStatus, ts: Timestamp) {
        if self.is_terminated() {
            return;
        }
        self.termination_status = status;
        self.termination_time = Some(ts);
        self.timeline.end_current_stage(ts);
    }

    pub fn on_finish_impl_frame(&mut self, ts: Timestamp) {
        self.did_finish_impl_frame = true;
        self.impl_frame_finish_time = Some(ts);
    }

    /// The main frame was aborted; its abort time also ends the impl frame.
    pub fn on_abort_begin_main_frame(&mut self, ts: Timestamp) {
        if self.main_frame_abort_time.is_some() {
            tracing::debug!(sequence = self.args.frame_id.sequence_number, "main frame aborted twice");
        }
        self.main_frame_abort_time = Some(ts);
        self.impl_frame_finish_time = Some(ts);
    }

    pub fn on_did_not_produce_frame(&mut self, reason: FrameSkippedReason) {
        self.did_not_produce_frame_time = Some(self.clock.now());
        self.frame_skip_reason = Some(reason);
    }

    pub fn set_blink_breakdown(&mut self, metrics: BeginMainFrameMetrics, begin_main_start: Option<Timestamp>) {
        self.blink_breakdown = metrics;
        self.begin_main_frame_start = begin_main_start;
    }

    pub fn set_viz_breakdown(&mut self, details: FrameTimingDetails) {
        self.viz_breakdown = details;
    }

    pub fn add_events_metrics(&mut self, events: impl IntoIterator<Item = EventMetrics>) {
        self.events_metrics.extend(events);
    }

    pub fn take_events_metrics(&mut self) -> Vec<EventMetrics> {
        std::mem::take(&mut self.events_metrics)
    }

    /// Removes and returns the events waiting on a main-thread update.
    pub fn take_main_blocked_events_metrics(&mut self) -> Vec<EventMetrics> {
        let (blocked, rest) = std::mem::take(&mut self.events_metrics)
            .into_iter()
            .partition(|e| e.requires_main_thread_update);
        self.events_metrics = rest;
        blocked
    }

    pub fn enable_compositor_only_reporting(&mut self) {
        self.report_types.insert(FrameReportType::CompositorOnlyFrame);
    }

    pub fn set_has_partial_update(&mut self, v: bool) {
        self.has_partial_update.set(v);
    }

    pub fn set_is_accompanied_by_main_thread_update(&mut self, v: bool) {
        self.is_accompanied_by_main_thread_update = v;
    }

    pub fn set_want_new_tree(&mut self, v: bool) {
        self.want_new_tree = v;
    }

    pub fn set_created_new_tree(&mut self, v: bool) {
        self.created_new_tree = v;
    }

    pub fn set_invalidate_raster_scroll(&mut self, v: bool) {
        self.invalidate_raster_scroll = v;
    }

    pub fn set_is_backfill(&mut self, v: bool) {
        self.is_backfill = v;
    }

    pub fn set_checkerboarded(&mut self, needs_raster: bool, needs_record: bool) {
        self.checkerboarded_needs_raster = needs_raster;
        self.checkerboarded_needs_record = needs_record;
    }

    /// Invalidated paint area normalized by the viewport, for UI compositors.
    pub fn set_normalized_invalidated_area(&mut self, area: f32) {
        self.normalized_invalidated_area = Some(area);
    }

    /// Forks this reporter at the end of its impl frame.
    ///
    /// The fork covers the same begin-frame, starts with an open
    /// `BeginImplFrameToSendBeginMainFrame` stage at this reporter's first
    /// stage start and is a partial update decided by `self`. Returns `None`
    /// if this reporter is itself a dependent, or if its impl frame has not
    /// elapsed yet.
    pub fn copy_reporter_at_begin_impl_stage(&mut self) -> Option<ReporterHandle> {
        if self.partial_update_decider.is_some() {
            return None;
        }

        let first = self.timeline.first_stage()?;
        if first.stage_type != StageType::BeginImplFrameToSendBeginMainFrame
            || (!self.did_finish_impl_frame && self.did_not_produce_frame_time.is_none())
        {
            return None;
        }
        let start = first.start();

        let params = FrameReporterParams {
            args: self.args.clone(),
            active_trackers: self.active_trackers,
            smooth_thread: self.smooth_thread,
            scrolling_thread: self.scrolling_thread,
            layer_tree_host_id: self.layer_tree_host_id,
        };
        let fork = FrameReporter::create(params, self.trackers.clone(), self.clock.clone());

        {
            let mut f = fork.borrow_mut();
            f.did_finish_impl_frame = self.did_finish_impl_frame;
            f.impl_frame_finish_time = self.impl_frame_finish_time;
            f.main_frame_abort_time = self.main_frame_abort_time;
            f.timeline =
                StageTimeline::with_open_stage(StageType::BeginImplFrameToSendBeginMainFrame, start);
            f.is_forked = true;
            self.attach_dependent(&mut f);
        }

        Some(fork)
    }

    fn attach_dependent(&mut self, dependent: &mut FrameReporter) {
        dependent.has_partial_update.set(true);
        dependent.partial_update_decider = Some(self.self_ref.clone());
        self.partial_update_dependents.push_back(DependentEdge {
            reporter: dependent.self_ref.clone(),
            has_partial_update: dependent.has_partial_update.clone(),
        });
    }

    /// Takes ownership of a forked reporter.
    ///
    /// Its main-thread-blocked events move to `self`. Owned forks are kept
    /// alive until `self` goes away; past capacity the oldest one is released
    /// after its partial update flag was cleared.
    ///
    /// Returns false, leaving `child` untouched, if `self` is itself a
    /// dependent or if `child` is borrowed (which includes `child` being
    /// `self`).
    pub fn adopt_reporter(&mut self, child: ReporterHandle) -> bool {
        if self.partial_update_decider.is_some() {
            tracing::warn!(
                sequence = self.args.frame_id.sequence_number,
                "only deciders adopt reporters"
            );
            return false;
        }

        match child.inner.try_borrow_mut() {
            Ok(mut c) => {
                let blocked = c.take_main_blocked_events_metrics();
                self.events_metrics.extend(blocked);
            }
            Err(_) => {
                tracing::warn!("adopted reporter busy or self-adoption, not adopted");
                return false;
            }
        }

        if let Some(evicted) = self.owned_partial_update_dependents.push(child) {
            evicted.has_partial_update.set(false);
            drop(evicted);

            self.partial_update_dependents.retain(DependentEdge::is_live);
        }

        true
    }

    /// Clears the partial update flag of every live dependent.
    fn cancel_partial_update_dependents(&mut self) {
        for dependent in self.partial_update_dependents.drain(..) {
            if dependent.is_live() {
                dependent.has_partial_update.set(false);
            }
        }
    }

    fn classifier_input(&self, termination_time: Timestamp) -> ClassifierInput {
        ClassifierInput {
            termination_status: self.termination_status,
            termination_time,
            frame_skip_reason: self.frame_skip_reason,
            has_partial_update: self.has_partial_update.get(),
            is_accompanied_by_main_thread_update: self.is_accompanied_by_main_thread_update,
            want_new_tree: self.want_new_tree,
            created_new_tree: self.created_new_tree,
            invalidate_raster_scroll: self.invalidate_raster_scroll,
            smooth_thread: self.smooth_thread,
            scrolling_thread: self.scrolling_thread,
            has_main_frame_start: self.begin_main_frame_start.is_some(),
            has_dependents: self.partial_update_dependents.iter().any(DependentEdge::is_live),
            checkerboarded_needs_raster: self.checkerboarded_needs_raster,
            checkerboarded_needs_record: self.checkerboarded_needs_record,
            sequence_number: self.args.frame_id.sequence_number,
        }
    }

    fn process_breakdowns(&self) -> ProcessedBreakdowns {
        ProcessedBreakdowns {
            blink: ProcessedBlinkBreakdown::new(
                self.timeline.blink_start(),
                self.begin_main_frame_start,
                &self.blink_breakdown,
            ),
            viz: ProcessedVizBreakdown::new(self.timeline.viz_start(), &self.viz_breakdown),
        }
    }

    /// Deadline after which a presented frame counts as late.
    fn safe_deadline(&self) -> Timestamp {
        self.args.frame_time + self.args.interval + self.args.interval / 2
    }

    /// Classifies the frame and emits its metrics. Runs at most once; also
    /// run when the reporter is dropped.
    pub fn finalize(&mut self) {
        if self.frame_info.is_some() {
            return;
        }

        if self.termination_status == FrameTerminationStatus::Unknown {
            let now = self.clock.now();
            self.terminate(FrameTerminationStatus::Unknown, now);
        }
        let termination_time = self.termination_time.unwrap_or_else(|| self.clock.now());

        let processed = self
            .processed
            .take()
            .unwrap_or_else(|| self.process_breakdowns());

        let info = generate_frame_info(&self.classifier_input(termination_time));

        match info.final_state {
            FrameFinalState::Dropped => self.report_types.insert(FrameReportType::DroppedFrame),
            FrameFinalState::NoUpdateDesired => self.cancel_partial_update_dependents(),
            FrameFinalState::PresentedAll
            | FrameFinalState::PresentedPartialOldMain
            | FrameFinalState::PresentedPartialNewMain => {
                self.report_types.insert(FrameReportType::NonDroppedFrame);
                if self.safe_deadline() < termination_time {
                    self.report_types
                        .insert(FrameReportType::MissedDeadlineFrame);
                }
            }
        }
        let presented = self.report_types.contains(FrameReportType::NonDroppedFrame);

        self.report_compositor_latency_trace_events(&info, &processed, termination_time);
        if presented {
            self.report_event_latency_trace_events(termination_time);
        }

        if self.report_types.any() && self.trackers.wants_latency_reports() {
            let sum = self.timeline.sum_of_intervals();
            if let Some(span) = self.timeline.span() {
                if sum != span {
                    tracing::warn!(sum, span, "stage intervals do not tile the frame");
                }
            }

            if self.timeline.append_total_latency() {
                self.report_compositor_latency_metrics(&processed);
                if presented {
                    self.report_event_latency_metrics(&processed);
                }
            }
        }

        if let Some(area) = self.normalized_invalidated_area {
            self.report_paint_metric(area);
        }

        if self.termination_status == FrameTerminationStatus::PresentedFrame {
            self.report_scroll_jank_metrics(termination_time);
        }

        self.trackers
            .frame_sorter
            .add_frame_result(&self.args, &info);

        tracing::debug!(
            sequence = self.args.frame_id.sequence_number,
            state = ?info.final_state,
            forked = self.is_forked,
            "frame finalized"
        );

        self.processed = Some(processed);
        self.frame_info = Some(info);
    }

    pub(crate) fn latency_report<'a>(&'a self, processed: &'a ProcessedBreakdowns) -> LatencyReport<'a> {
        LatencyReport {
            report_types: self.report_types,
            active_trackers: self.active_trackers,
            stages: self.timeline.history(),
            blink: &processed.blink,
            viz: &processed.viz,
        }
    }

    pub fn args(&self) -> &BeginFrameArgs {
        &self.args
    }

    pub fn termination_status(&self) -> FrameTerminationStatus {
        self.termination_status
    }

    pub fn termination_time(&self) -> Option<Timestamp> {
        self.termination_time
    }

    pub fn stage_history(&self) -> &[StageData] {
        self.timeline.history()
    }

    pub fn current_stage(&self) -> Option<(StageType, Timestamp)> {
        self.timeline.current_stage()
    }

    pub fn events_metrics(&self) -> &[EventMetrics] {
        &self.events_metrics
    }

    pub fn did_finish_impl_frame(&self) -> bool {
        self.did_finish_impl_frame
    }

    pub fn impl_frame_finish_time(&self) -> Option<Timestamp> {
        self.impl_frame_finish_time
    }

    pub fn main_frame_abort_time(&self) -> Option<Timestamp> {
        self.main_frame_abort_time
    }

    pub fn did_not_produce_frame_time(&self) -> Option<Timestamp> {
        self.did_not_produce_frame_time
    }

    pub fn has_partial_update(&self) -> bool {
        self.has_partial_update.get()
    }

    pub fn is_forked(&self) -> bool {
        self.is_forked
    }

    pub fn has_partial_update_decider(&self) -> bool {
        self.partial_update_decider
            .as_ref()
            .is_some_and(|d| d.strong_count() > 0)
    }

    pub fn partial_update_dependents_len(&self) -> usize {
        self.partial_update_dependents.len()
    }

    pub fn owned_partial_update_dependents_len(&self) -> usize {
        self.owned_partial_update_dependents.len()
    }

    pub fn report_types(&self) -> FrameReportTypes {
        self.report_types
    }

    /// Outcome of the frame, once finalized.
    pub fn frame_info(&self) -> Option<&FrameInfo> {
        self.frame_info.as_ref()
    }

    pub fn processed_blink_breakdown(&self) -> Option<&ProcessedBlinkBreakdown> {
        self.processed.as_ref().map(|p| &p.blink)
    }

    pub fn processed_viz_breakdown(&self) -> Option<&ProcessedVizBreakdown> {
        self.processed.as_ref().map(|p| &p.viz)
    }
}

impl Drop for FrameReporter {
    fn drop(&mut self) {
        self.finalize();
    }
}
