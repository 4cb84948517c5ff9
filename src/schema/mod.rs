pub mod registry;
pub mod types;

pub use registry::SchemaRegistry;
pub use types::{ColumnDef, ColumnType, YearSchema};
