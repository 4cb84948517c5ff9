pub mod decode;
pub mod encoding;
pub mod post;
pub mod sample;
pub mod stage;
pub mod write;

use std::sync::{atomic::AtomicBool, Arc};

/// Set from outside the pipeline (ctrl-c handler); checked once per row.
pub type CancelFlag = Arc<AtomicBool>;

pub use decode::{decode_line, CoercePolicy, DecodedRecord, FieldValue};
pub use sample::{SamplePlan, Verdict};
pub use stage::{stage_year, StageSummary};
pub use write::{CsvRecordWriter, RecordWriter};
