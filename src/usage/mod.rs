// Usage accounting module
// Author: kelexine (https://github.com/kelexine)

pub mod record;
pub mod recorder;
pub mod rollup;

pub use record::{fingerprint, CallParams, CallRecord, Evaluation};
pub use recorder::CallRecorder;
pub use rollup::{
    load_rollup, save_rollup, DailyRollup, DayRollup, RollupAggregator, UsageCounters,
};
