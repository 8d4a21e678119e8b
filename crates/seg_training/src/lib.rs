pub mod loss;
pub mod report;

pub use loss::{LogitNormLoss, LogitNormLossConfig, LossError, LOGIT_NORM_EPSILON};
pub use report::{build_report, DatasetReport, DecodeFailure};
