/// Resource caps applied to one interpreter run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Executed instructions (jumps included) before the run fails with
    /// `ProgramDivergence`.
    pub max_steps: usize,
}

impl ExecutionLimits {
    pub const DEFAULT_MAX_STEPS: usize = 100_000;

    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_STEPS)
    }
}
