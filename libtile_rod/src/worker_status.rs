#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    RED,
    GREEN,
}

/// Progress message sent by a decoding worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStatus {
    pub progress: f32,
    /// Run of the last decoded event (0 before the first one)
    pub run_number: u32,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: u32, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            color,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.color == BarColor::GREEN
    }
}
