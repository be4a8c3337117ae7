//! Typed progress events for long-running repository operations
//!
//! Sinks are called synchronously on the caller's thread, once per unit of
//! work. A slow sink stalls the operation.

/// Consumer of progress events
pub trait ProgressSink<E> {
    fn report(&mut self, event: E);
}

impl<E, F: FnMut(E)> ProgressSink<E> for F {
    fn report(&mut self, event: E) {
        self(event)
    }
}

/// Report to an optional sink
pub(crate) fn emit<E>(sink: &mut Option<&mut (dyn ProgressSink<E> + '_)>, event: E) {
    if let Some(sink) = sink.as_deref_mut() {
        sink.report(event);
    }
}

/// Position within a scan of `total` items; `current` is zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub current: usize,
    pub total: usize,
}

/// Stages of a copy, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CopyStage {
    Idle,
    Estimating,
    Copying,
    Done,
}

/// State after one file of a copy was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyFileProgress {
    /// Zero-based index of the file just handled
    pub file_index: usize,
    pub file_bytes: u64,
    pub total_files: usize,
    pub total_bytes: u64,
    /// Bytes handled so far, including files the target already had
    pub copied_bytes: u64,
}

/// Outcome of a finished copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub total_files: usize,
    pub total_bytes: u64,
    /// Files newly written to the target
    pub files_written: usize,
    /// Files the target already held
    pub files_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyProgress {
    /// One source message was estimated
    Estimating(ScanProgress),
    /// One file was copied or found already present
    Copying(CopyFileProgress),
    Done(CopySummary),
}

impl CopyProgress {
    pub fn stage(&self) -> CopyStage {
        match self {
            CopyProgress::Estimating(_) => CopyStage::Estimating,
            CopyProgress::Copying(_) => CopyStage::Copying,
            CopyProgress::Done(_) => CopyStage::Done,
        }
    }
}

/// Progress of computing which attachments a deletion frees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcProgress {
    /// Marking attachments of the messages to delete
    ScanningTargets(ScanProgress),
    /// Sweeping every other message in the repository
    ScanningRepository(ScanProgress),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        let mut sink = |p: ScanProgress| seen.push(p.current);
        let mut slot: Option<&mut dyn ProgressSink<ScanProgress>> = Some(&mut sink);

        emit(&mut slot, ScanProgress { current: 0, total: 2 });
        emit(&mut slot, ScanProgress { current: 1, total: 2 });
        drop(slot);

        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn test_emit_without_sink() {
        let mut slot: Option<&mut dyn ProgressSink<ScanProgress>> = None;
        emit(&mut slot, ScanProgress { current: 0, total: 1 });
    }

    #[test]
    fn test_stage_order() {
        assert!(CopyStage::Idle < CopyStage::Estimating);
        assert!(CopyStage::Estimating < CopyStage::Copying);
        assert!(CopyStage::Copying < CopyStage::Done);
        assert_eq!(
            CopyProgress::Done(CopySummary::default()).stage(),
            CopyStage::Done
        );
    }
}
