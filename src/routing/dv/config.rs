//! 距离向量协议参数

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sim::SimTime;

/// 水平分割策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitHorizon {
    /// 所有路由向所有邻居通告，包括学到该路由的邻居
    NoSplitHorizon,
    /// 不把路由从学到它的接口通告回去
    SplitHorizon,
    /// 从学到它的接口通告回去，但度量为无穷大
    #[default]
    PoisonReverse,
}

impl fmt::Display for SplitHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SplitHorizon::NoSplitHorizon => "NoSplitHorizon",
            SplitHorizon::SplitHorizon => "SplitHorizon",
            SplitHorizon::PoisonReverse => "PoisonReverse",
        };
        f.write_str(s)
    }
}

impl FromStr for SplitHorizon {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NoSplitHorizon" => Ok(SplitHorizon::NoSplitHorizon),
            "SplitHorizon" => Ok(SplitHorizon::SplitHorizon),
            "PoisonReverse" => Ok(SplitHorizon::PoisonReverse),
            other => Err(ConfigError::UnknownSplitHorizon(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DvConfig {
    /// 周期通告间隔
    pub update_interval: SimTime,
    /// 路由超时：超过该时长未被刷新则置为不可达
    pub timeout: SimTime,
    /// 不可达路由继续被通告的时长，到期后从表中删除
    pub gc_delay: SimTime,
    /// 启动后第一次周期通告的延迟
    pub startup_delay: SimTime,
    /// 触发更新的冷却时间（路由变化后最多等待这么久再发）
    pub triggered_delay: SimTime,
    pub split_horizon: SplitHorizon,
}

impl Default for DvConfig {
    fn default() -> Self {
        Self {
            update_interval: SimTime::from_secs(30),
            timeout: SimTime::from_secs(180),
            gc_delay: SimTime::from_secs(120),
            startup_delay: SimTime::from_secs(1),
            triggered_delay: SimTime::from_secs(1),
            split_horizon: SplitHorizon::default(),
        }
    }
}
