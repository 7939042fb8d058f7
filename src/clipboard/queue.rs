use std::collections::VecDeque;

/// 变更队列默认容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// 入队结果
#[derive(Debug, PartialEq, Eq)]
pub enum Offer<T> {
    Queued,
    /// 与队尾相同，合并为一次处理
    Coalesced,
    /// 队列已满且各项互不相同，事件被退回给调用方
    Full(T),
}

/// 有界的剪贴板变更队列，连续相同的资源会被合并。
#[derive(Debug)]
pub struct ChangeQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: PartialEq> ChangeQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn offer(&mut self, item: T) -> Offer<T> {
        if self.items.back() == Some(&item) {
            return Offer::Coalesced;
        }
        if self.items.len() >= self.capacity {
            return Offer::Full(item);
        }
        self.items.push_back(item);
        Offer::Queued
    }

    /// 取出队首，并丢弃紧随其后的相同项。
    pub fn take_coalesced(&mut self) -> Option<T> {
        let first = self.items.pop_front()?;
        while self.items.front() == Some(&first) {
            self.items.pop_front();
        }
        Some(first)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: PartialEq> Default for ChangeQueue<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}
