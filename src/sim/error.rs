//! 调度器错误

use super::time::SimTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// 试图把事件调度到过去：调用方存在因果错误，属于契约违背。
    #[error("out-of-order schedule: event at {at} but clock is already at {now}")]
    OutOfOrderSchedule { at: SimTime, now: SimTime },
}
