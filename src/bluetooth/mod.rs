pub mod scanner;

pub use scanner::{scan_for_ruuvitags, ScanEvent};
