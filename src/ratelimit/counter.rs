//! 按键计数、创建后固定时长过期的计数表

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// 单个计数槽
#[derive(Debug, Clone, Copy)]
struct CounterSlot {
    count: u64,
    /// 计数槽失效的时刻，创建时确定，之后不再改变
    expires_at: Instant,
}

/// 会过期的计数表
///
/// 每个计数槽创建时都会在过期堆里登记一次，窗口结束后被移除，与期间的流量无关。
/// 访问时也会忽略已过期的槽，所以即使清理还没运行，调用方也看不到过期的计数。
///
/// 计数表本身不加锁，由持有者负责同步。
#[derive(Debug)]
pub struct ExpiringCounters {
    ttl: Duration,
    slots: HashMap<String, CounterSlot>,
    expiries: BinaryHeap<Reverse<(Instant, String)>>,
}

impl ExpiringCounters {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: HashMap::new(),
            expiries: BinaryHeap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `key` 当前的计数，没有有效计数器时返回 `None`
    pub fn get(&self, key: &str, now: Instant) -> Option<u64> {
        self.slots
            .get(key)
            .filter(|slot| now < slot.expires_at)
            .map(|slot| slot.count)
    }

    /// `key` 的计数器还剩多久失效
    pub fn time_to_reset(&self, key: &str, now: Instant) -> Option<Duration> {
        self.slots
            .get(key)
            .filter(|slot| now < slot.expires_at)
            .map(|slot| slot.expires_at - now)
    }

    /// 计数未达到 `limit` 时加一
    ///
    /// 不存在或已过期的计数器会以 1 重新创建，并登记移除时间。
    /// 返回新的计数；已经到达上限时不做修改，返回 `None`。
    pub fn increment_below(&mut self, key: &str, limit: u64, now: Instant) -> Option<u64> {
        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if now >= slot.expires_at {
                    let expires_at = now + self.ttl;
                    *slot = CounterSlot {
                        count: 1,
                        expires_at,
                    };
                    self.expiries.push(Reverse((expires_at, key.to_owned())));
                    Some(1)
                } else if slot.count < limit {
                    slot.count += 1;
                    Some(slot.count)
                } else {
                    None
                }
            }
            Entry::Vacant(vacant) => {
                if limit == 0 {
                    return None;
                }
                let expires_at = now + self.ttl;
                vacant.insert(CounterSlot {
                    count: 1,
                    expires_at,
                });
                self.expiries.push(Reverse((expires_at, key.to_owned())));
                Some(1)
            }
        }
    }

    /// 移除所有窗口已结束的计数器，返回移除数量
    pub fn sweep(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(Reverse((at, _))) = self.expiries.peek() {
            if *at > now {
                break;
            }
            let Some(Reverse((at, key))) = self.expiries.pop() else {
                break;
            };
            // 惰性过期后重建的槽带着更新的截止时间
            if self.slots.get(&key).is_some_and(|slot| slot.expires_at == at) {
                self.slots.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// 持有的计数器数量，包括等待清理的过期计数器
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 等待执行的移除数量
    pub fn scheduled(&self) -> usize {
        self.expiries.len()
    }
}
