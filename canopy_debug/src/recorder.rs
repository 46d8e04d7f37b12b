// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Effect batches ([`on_effects`](TraceSink::on_effects)) store only the
//! count of each kind.

use canopy_core::lane::{LanePriority, Lanes};
use canopy_core::root::RootId;
use canopy_core::scheduler::{Priority, TaskId};
use canopy_core::time::HostTime;
use canopy_core::trace::{
    CommitBeginEvent, CommitEndEvent, CommitSummary, EffectKind, EffectRecord,
    LanesScheduledEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, RenderEvent,
    RenderEventKind, TaskEvent, TaskEventKind, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TASK: u8 = 1;
const TAG_LANES_SCHEDULED: u8 = 2;
const TAG_RENDER: u8 = 3;
const TAG_COMMIT_BEGIN: u8 = 4;
const TAG_COMMIT_END: u8 = 5;
const TAG_PHASE_BEGIN: u8 = 6;
const TAG_PHASE_END: u8 = 7;
const TAG_COMMIT_SUMMARY: u8 = 8;
const TAG_EFFECT_COUNTS: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.0);
    }

    fn write_lanes(&mut self, lanes: Lanes) {
        self.write_u32(lanes.bits());
    }

    fn write_priority(&mut self, p: Priority) {
        self.write_u8(match p {
            Priority::Immediate => 0,
            Priority::UserBlocking => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
            Priority::Idle => 4,
        });
    }

    fn write_lane_priority(&mut self, p: LanePriority) {
        self.write_u8(p as u8);
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::BeforeMutation => 0,
            PhaseKind::Mutation => 1,
            PhaseKind::Layout => 2,
            PhaseKind::Passive => 3,
        });
    }
}

fn clamp_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl TraceSink for RecorderSink {
    fn on_task(&mut self, e: &TaskEvent) {
        self.write_u8(TAG_TASK);
        self.write_u64(e.task.0);
        self.write_priority(e.priority);
        self.write_u8(match e.kind {
            TaskEventKind::Scheduled => 0,
            TaskEventKind::Start => 1,
            TaskEventKind::Yield => 2,
            TaskEventKind::Complete => 3,
            TaskEventKind::Cancel => 4,
        });
        self.write_time(e.timestamp);
    }

    fn on_lanes_scheduled(&mut self, e: &LanesScheduledEvent) {
        self.write_u8(TAG_LANES_SCHEDULED);
        self.write_u32(e.root.0);
        self.write_lanes(e.lanes);
        self.write_lane_priority(e.priority);
        self.write_time(e.timestamp);
    }

    fn on_render(&mut self, e: &RenderEvent) {
        self.write_u8(TAG_RENDER);
        self.write_u32(e.root.0);
        self.write_lanes(e.lanes);
        self.write_u8(match e.kind {
            RenderEventKind::Start => 0,
            RenderEventKind::Yield => 1,
            RenderEventKind::Interrupted => 2,
            RenderEventKind::Suspended => 3,
            RenderEventKind::Errored => 4,
            RenderEventKind::Complete => 5,
        });
        self.write_time(e.timestamp);
    }

    fn on_commit_begin(&mut self, e: &CommitBeginEvent) {
        self.write_u8(TAG_COMMIT_BEGIN);
        self.write_u32(e.root.0);
        self.write_lanes(e.lanes);
        self.write_time(e.timestamp);
    }

    fn on_commit_end(&mut self, e: &CommitEndEvent) {
        self.write_u8(TAG_COMMIT_END);
        self.write_u32(e.root.0);
        self.write_lanes(e.remaining_lanes);
        self.write_u32(e.effect_count);
        self.write_time(e.timestamp);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u32(e.root.0);
        self.write_phase(e.phase);
        self.write_time(e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u32(e.root.0);
        self.write_phase(e.phase);
        self.write_time(e.timestamp);
    }

    fn on_commit_summary(&mut self, s: &CommitSummary) {
        self.write_u8(TAG_COMMIT_SUMMARY);
        self.write_u32(s.root.0);
        self.write_lanes(s.lanes);
        self.write_time(s.started);
        self.write_u64(s.before_mutation_nanos);
        self.write_u64(s.mutation_nanos);
        self.write_u64(s.layout_nanos);
        self.write_u32(s.effect_count);
        self.write_u32(s.error_count);
    }

    fn on_effects(&mut self, root: RootId, effects: &[EffectRecord]) {
        let count = |kind: EffectKind| clamp_count(effects.iter().filter(|e| e.kind == kind).count());
        self.write_u8(TAG_EFFECT_COUNTS);
        self.write_u32(root.0);
        self.write_u32(count(EffectKind::Placement));
        self.write_u32(count(EffectKind::Update));
        self.write_u32(count(EffectKind::Deletion));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`TaskEvent`].
    Task(TaskEvent),
    /// A [`LanesScheduledEvent`].
    LanesScheduled(LanesScheduledEvent),
    /// A [`RenderEvent`].
    Render(RenderEvent),
    /// A [`CommitBeginEvent`].
    CommitBegin(CommitBeginEvent),
    /// A [`CommitEndEvent`].
    CommitEnd(CommitEndEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`CommitSummary`].
    CommitSummary(CommitSummary),
    /// Effect counts for one commit.
    EffectCounts {
        /// The committed root.
        root: RootId,
        /// Insertions and moves.
        placements: u32,
        /// Attribute and text updates.
        updates: u32,
        /// Removed subtrees.
        deletions: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_root(&mut self) -> Option<RootId> {
        self.read_u32().map(RootId)
    }

    fn read_lanes(&mut self) -> Option<Lanes> {
        self.read_u32().map(Lanes::from_bits)
    }

    fn read_priority(&mut self) -> Option<Priority> {
        Some(match self.read_u8()? {
            0 => Priority::Immediate,
            1 => Priority::UserBlocking,
            2 => Priority::Normal,
            3 => Priority::Low,
            _ => Priority::Idle,
        })
    }

    fn read_lane_priority(&mut self) -> Option<LanePriority> {
        Some(match self.read_u8()? {
            15 => LanePriority::Sync,
            14 => LanePriority::SyncBatched,
            12 => LanePriority::InputDiscrete,
            10 => LanePriority::InputContinuous,
            8 => LanePriority::Default,
            6 => LanePriority::Transition,
            5 => LanePriority::Retry,
            2 => LanePriority::Idle,
            1 => LanePriority::Offscreen,
            _ => LanePriority::NoLane,
        })
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::BeforeMutation,
            1 => PhaseKind::Mutation,
            2 => PhaseKind::Layout,
            _ => PhaseKind::Passive,
        })
    }

    fn decode_task(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Task(TaskEvent {
            task: TaskId(self.read_u64()?),
            priority: self.read_priority()?,
            kind: match self.read_u8()? {
                0 => TaskEventKind::Scheduled,
                1 => TaskEventKind::Start,
                2 => TaskEventKind::Yield,
                3 => TaskEventKind::Complete,
                _ => TaskEventKind::Cancel,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_lanes_scheduled(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LanesScheduled(LanesScheduledEvent {
            root: self.read_root()?,
            lanes: self.read_lanes()?,
            priority: self.read_lane_priority()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_render(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Render(RenderEvent {
            root: self.read_root()?,
            lanes: self.read_lanes()?,
            kind: match self.read_u8()? {
                0 => RenderEventKind::Start,
                1 => RenderEventKind::Yield,
                2 => RenderEventKind::Interrupted,
                3 => RenderEventKind::Suspended,
                4 => RenderEventKind::Errored,
                _ => RenderEventKind::Complete,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_commit_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CommitBegin(CommitBeginEvent {
            root: self.read_root()?,
            lanes: self.read_lanes()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_commit_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CommitEnd(CommitEndEvent {
            root: self.read_root()?,
            remaining_lanes: self.read_lanes()?,
            effect_count: self.read_u32()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            root: self.read_root()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            root: self.read_root()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_commit_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::CommitSummary(CommitSummary {
            root: self.read_root()?,
            lanes: self.read_lanes()?,
            started: self.read_time()?,
            before_mutation_nanos: self.read_u64()?,
            mutation_nanos: self.read_u64()?,
            layout_nanos: self.read_u64()?,
            effect_count: self.read_u32()?,
            error_count: self.read_u32()?,
        }))
    }

    fn decode_effect_counts(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::EffectCounts {
            root: self.read_root()?,
            placements: self.read_u32()?,
            updates: self.read_u32()?,
            deletions: self.read_u32()?,
        })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_TASK => self.decode_task(),
            TAG_LANES_SCHEDULED => self.decode_lanes_scheduled(),
            TAG_RENDER => self.decode_render(),
            TAG_COMMIT_BEGIN => self.decode_commit_begin(),
            TAG_COMMIT_END => self.decode_commit_end(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_COMMIT_SUMMARY => self.decode_commit_summary(),
            TAG_EFFECT_COUNTS => self.decode_effect_counts(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> CommitSummary {
        CommitSummary {
            root: RootId(2),
            lanes: Lanes::DEFAULT,
            started: HostTime(1_000_000),
            before_mutation_nanos: 100,
            mutation_nanos: 400,
            layout_nanos: 1500,
            effect_count: 12,
            error_count: 1,
        }
    }

    #[test]
    fn task_event_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_task(&TaskEvent {
            task: TaskId(41),
            priority: Priority::UserBlocking,
            kind: TaskEventKind::Yield,
            timestamp: HostTime(5_000),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Task(e) => {
                assert_eq!(e.task, TaskId(41));
                assert_eq!(e.priority, Priority::UserBlocking);
                assert_eq!(e.kind, TaskEventKind::Yield);
                assert_eq!(e.timestamp, HostTime(5_000));
            }
            other => panic!("expected Task, got {other:?}"),
        }
    }

    #[test]
    fn lane_priority_survives_recording() {
        let mut rec = RecorderSink::new();
        for priority in [
            LanePriority::Sync,
            LanePriority::InputDiscrete,
            LanePriority::Transition,
            LanePriority::Idle,
        ] {
            rec.on_lanes_scheduled(&LanesScheduledEvent {
                root: RootId(0),
                lanes: Lanes::SYNC,
                priority,
                timestamp: HostTime(1),
            });
        }
        let priorities: Vec<_> = decode(rec.as_bytes())
            .map(|event| match event {
                RecordedEvent::LanesScheduled(e) => e.priority,
                other => panic!("expected LanesScheduled, got {other:?}"),
            })
            .collect();
        assert_eq!(
            priorities,
            [
                LanePriority::Sync,
                LanePriority::InputDiscrete,
                LanePriority::Transition,
                LanePriority::Idle,
            ]
        );
    }

    #[test]
    fn commit_summary_survives_recording() {
        let mut rec = RecorderSink::new();
        let orig = sample_summary();
        rec.on_commit_summary(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::CommitSummary(s) => {
                assert_eq!(s.root, orig.root);
                assert_eq!(s.lanes, orig.lanes);
                assert_eq!(s.mutation_nanos, orig.mutation_nanos);
                assert_eq!(s.layout_nanos, orig.layout_nanos);
                assert_eq!(s.effect_count, orig.effect_count);
                assert_eq!(s.error_count, orig.error_count);
            }
            other => panic!("expected CommitSummary, got {other:?}"),
        }
    }

    #[test]
    fn mixed_stream_keeps_order() {
        let mut rec = RecorderSink::new();
        rec.on_render(&RenderEvent {
            root: RootId(0),
            lanes: Lanes::DEFAULT,
            kind: RenderEventKind::Start,
            timestamp: HostTime(10),
        });
        rec.on_commit_begin(&CommitBeginEvent {
            root: RootId(0),
            lanes: Lanes::DEFAULT,
            timestamp: HostTime(20),
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            root: RootId(0),
            phase: PhaseKind::Mutation,
            timestamp: HostTime(21),
        });
        rec.on_phase_end(&PhaseEndEvent {
            root: RootId(0),
            phase: PhaseKind::Mutation,
            timestamp: HostTime(25),
        });
        rec.on_commit_end(&CommitEndEvent {
            root: RootId(0),
            remaining_lanes: Lanes::NONE,
            effect_count: 3,
            timestamp: HostTime(30),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], RecordedEvent::Render(_)));
        assert!(matches!(events[1], RecordedEvent::CommitBegin(_)));
        assert!(
            matches!(events[2], RecordedEvent::PhaseBegin(e) if e.phase == PhaseKind::Mutation)
        );
        assert!(matches!(events[3], RecordedEvent::PhaseEnd(_)));
        assert!(matches!(
            events[4],
            RecordedEvent::CommitEnd(CommitEndEvent { effect_count: 3, .. })
        ));
    }

    #[test]
    fn effects_are_counted_by_kind() {
        let mut rec = RecorderSink::new();
        let effects = [
            EffectRecord {
                node_index: 4,
                kind: EffectKind::Placement,
            },
            EffectRecord {
                node_index: 5,
                kind: EffectKind::Deletion,
            },
            EffectRecord {
                node_index: 6,
                kind: EffectKind::Placement,
            },
        ];
        rec.on_effects(RootId(1), &effects);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        match &events[..] {
            [
                RecordedEvent::EffectCounts {
                    root,
                    placements,
                    updates,
                    deletions,
                },
            ] => {
                assert_eq!(*root, RootId(1));
                assert_eq!((*placements, *updates, *deletions), (2, 0, 1));
            }
            other => panic!("expected one EffectCounts, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_commit_summary(&sample_summary());
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
