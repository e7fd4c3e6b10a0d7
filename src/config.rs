// Foxscream Runtime Configuration

/// Default limit on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Settings for one `Runtime`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Name reported in error locations and stack traces
    pub file_name: String,
    /// Calls nested deeper than this raise a stack overflow error
    pub max_call_depth: usize,
}

impl RuntimeConfig {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            file_name: "<script>".to_string(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}
