//! 距离向量路由（类 RIP）
//!
//! 度量为跳数（链路代价之和），16 表示不可达。支持三种水平分割策略、
//! 路由老化与垃圾回收、触发更新，以及接口恢复时的请求/应答。
//!
//! 水平分割只能减少而不能消除瞬时的计数到无穷，这是该算法族的固有局限。

mod advert;
mod config;
mod engine;
mod events;

pub use advert::{AdvertEntry, Advertisement, DvCommand, MAX_ENTRIES_PER_MESSAGE, MalformedAdvertisement};
pub use config::{DvConfig, SplitHorizon};
pub use engine::{DistanceVector, RibEntry};
pub use events::{
    DeliverAdvertisement, DvGarbageCollect, DvPeriodicUpdate, DvRouteTimeout, DvTriggeredUpdate,
};
