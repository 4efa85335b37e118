//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::error::SimError;
use super::event::Event;
use super::scheduled_event::{EventId, ScheduledEvent};
use super::time::SimTime;
use super::world::World;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, info, trace};

/// 事件驱动仿真器：维护当前时间与事件队列。
///
/// 同一时刻的事件按调度顺序（FIFO）执行，因此相同输入总能得到相同的运行结果。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    q: BinaryHeap<ScheduledEvent>,
    /// 仍在队列中、可被取消的事件
    pending: HashSet<u64>,
    /// 已取消但尚未出队的事件
    cancelled: HashSet<u64>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 队列中尚未执行（且未被取消）的事件数
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }

    /// 调度事件在指定时间执行；`at` 早于当前时间时返回 `OutOfOrderSchedule`。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn try_schedule<E: Event>(&mut self, at: SimTime, ev: E) -> Result<EventId, SimError> {
        if at < self.now {
            return Err(SimError::OutOfOrderSchedule { at, now: self.now });
        }

        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
        self.pending.insert(seq);

        debug!(queue_size = self.q.len(), "事件已加入队列");
        Ok(EventId(seq))
    }

    /// 调度事件在指定时间执行。
    ///
    /// 调度到过去是调用方的因果错误，直接 panic。
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) -> EventId {
        match self.try_schedule(at, ev) {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        }
    }

    /// 相对当前时间调度事件
    pub fn schedule_in<E: Event>(&mut self, delay: SimTime, ev: E) -> EventId {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev)
    }

    /// 取消尚未执行的事件。返回事件是否确实处于等待状态。
    ///
    /// 对正在执行或已经执行过的事件没有效果。
    pub fn cancel(&mut self, id: EventId) -> bool {
        if self.pending.remove(&id.0) {
            self.cancelled.insert(id.0);
            trace!(seq = id.0, "事件已取消");
            true
        } else {
            false
        }
    }

    /// 事件是否仍在等待执行
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains(&id.0)
    }

    /// 弹出下一个未被取消的事件
    fn pop_live(&mut self) -> Option<ScheduledEvent> {
        while let Some(item) = self.q.pop() {
            if self.cancelled.remove(&item.seq) {
                continue;
            }
            self.pending.remove(&item.seq);
            return Some(item);
        }
        None
    }

    /// 丢弃队首已取消的事件，使 `peek` 看到的是真正会执行的事件
    fn skip_cancelled(&mut self) {
        while self
            .q
            .peek()
            .is_some_and(|top| self.cancelled.contains(&top.seq))
        {
            if let Some(item) = self.q.pop() {
                self.cancelled.remove(&item.seq);
            }
        }
    }

    /// 运行直到事件队列为空或到达 `until`（恰好在 `until` 的事件也会执行）。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        loop {
            self.skip_cancelled();
            match self.q.peek() {
                Some(top) if top.at <= until => {}
                _ => break,
            }
            let Some(item) = self.pop_live() else {
                break;
            };
            self.now = item.at;
            trace!(now = ?self.now, id = ?item.id(), event = item.ev.label(), "执行事件");
            item.ev.execute(self, world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!("▶️  开始运行仿真");
        debug!(now = ?self.now, queue_size = self.q.len(), "初始状态");

        let mut event_count = 0;
        while let Some(item) = self.pop_live() {
            event_count += 1;
            self.now = item.at;

            debug!(
                event_num = event_count,
                now = ?self.now,
                seq = item.seq,
                event = item.ev.label(),
                remaining_queue = self.q.len(),
                "执行事件"
            );

            item.ev.execute(self, world);
        }

        info!(
            total_events = event_count,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
    }
}
