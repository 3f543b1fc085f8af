pub mod comparator;
pub mod engine;
pub mod file_state;
pub mod scanner;
pub mod scheduler;

pub use comparator::{FileComparator, PlanSummary, SyncAction, SyncPlan};
pub use engine::{Reconciler, SyncEngine, SyncOutcome, SyncStats};
pub use file_state::{fingerprint_file, FileEntry, Fingerprint, FolderState};
pub use scanner::{SymlinkPolicy, TreeSnapshotter, UnreadablePolicy};
pub use scheduler::{format_report, ReportSink, Scheduler};
