//! Per-framework trigger scheduling.

/// Whether a framework analyzes at `message_count`.
///
/// Aligned counts (`message_count % interval == 0`) always trigger. A framework
/// that has never analyzed this conversation also triggers at the first count
/// that reaches its interval, so enabling it mid-conversation does not wait
/// for the next aligned count. A count of zero never triggers.
pub fn should_analyze(
    message_count: usize,
    analysis_interval: u32,
    last_analyzed_count: Option<usize>,
) -> bool {
    if message_count == 0 {
        return false;
    }
    let interval = analysis_interval.max(1) as usize;
    if message_count % interval == 0 {
        return true;
    }
    last_analyzed_count.is_none() && message_count >= interval
}
