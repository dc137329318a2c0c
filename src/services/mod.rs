pub mod copy;
pub mod cull;
pub mod history;
pub mod report;
pub mod scanner;

pub use copy::{DestinationAllocator, copy_file, keep_destination};
pub use history::{CullAction, CullHistoryRecord, HistoryWriter};
pub use report::{ReportItem, write_csv_report_file};
pub use scanner::scan_directory;
