use std::fmt;

/// Lifecycle of a [`Pipeline`](crate::pipeline::Pipeline).
///
/// `Idle -> Connected -> Processing -> Completed | Failed -> CleanedUp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Connected,
    Processing,
    Completed,
    Failed,
    CleanedUp,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Connected => "connected",
            PipelineState::Processing => "processing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
            PipelineState::CleanedUp => "cleaned-up",
        };
        f.write_str(name)
    }
}
