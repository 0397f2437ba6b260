pub mod aggregate;
pub mod channel;
pub mod context;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod sequential;
pub mod source;
pub mod worker;

pub use aggregate::{AggregateMap, Aggregates};
pub use channel::BoundedChannel;
pub use context::{PipelineState, PipelineSummary};
pub use error::{ParseRecordError, PipelineError};
pub use pipeline::{aggregate, Pipeline, PipelineConfig, PipelineOutput};
pub use record::{BucketKey, Record};
