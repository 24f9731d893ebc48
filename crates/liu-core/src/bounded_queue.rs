//! 有界阻塞队列 (生产者/消费者).
//!
//! 在摄取线程与解析线程之间传递数据:
//! - 队列满时生产者阻塞 (背压)
//! - 队列空时消费者阻塞
//! - `close()` 发出流结束信号, 消费者取完剩余数据后得到 `None`
//!
//! 句柄可克隆, 所有克隆共享同一队列.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::{LiuError, LiuResult};

/// 队列内部状态
struct QueueState<T> {
    items: VecDeque<T>,
    /// 是否已发出流结束信号
    closed: bool,
}

/// 共享部分: 状态 + 两个条件变量
struct Shared<T> {
    state: Mutex<QueueState<T>>,
    /// 有新数据或已关闭
    not_empty: Condvar,
    /// 有空位或已关闭
    not_full: Condvar,
    capacity: usize,
}

impl<T> Shared<T> {
    /// 加锁; 持锁线程 panic 不影响队列数据本身的一致性, 因此直接取回内部状态
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 有界阻塞队列
///
/// # 示例
/// ```
/// use liu_core::bounded_queue::BoundedQueue;
///
/// let queue = BoundedQueue::new(2).unwrap();
/// let producer = queue.clone();
/// let handle = std::thread::spawn(move || {
///     for i in 0..5 {
///         producer.push(i).unwrap();
///     }
///     producer.close();
/// });
///
/// let mut received = Vec::new();
/// while let Some(v) = queue.pop() {
///     received.push(v);
/// }
/// handle.join().unwrap();
/// assert_eq!(received, vec![0, 1, 2, 3, 4]);
/// ```
pub struct BoundedQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// 创建容量为 `capacity` 的队列, 容量必须大于 0
    pub fn new(capacity: usize) -> LiuResult<Self> {
        if capacity == 0 {
            return Err(LiuError::InvalidArgument("队列容量必须大于 0".into()));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        })
    }

    /// 队列容量
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// 当前排队的元素个数
    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// 队列是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// 放入一个元素, 队列满时阻塞
    ///
    /// 队列已关闭时返回 [`LiuError::QueueClosed`], 元素被丢弃.
    pub fn push(&self, item: T) -> LiuResult<()> {
        let shared = &*self.shared;
        let mut state = shared.lock();
        while state.items.len() >= shared.capacity && !state.closed {
            state = shared
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(LiuError::QueueClosed);
        }
        state.items.push_back(item);
        drop(state);
        shared.not_empty.notify_one();
        Ok(())
    }

    /// 取出一个元素, 队列空时阻塞
    ///
    /// 返回 `None` 表示队列已关闭且所有元素都已取出.
    pub fn pop(&self) -> Option<T> {
        let shared = &*self.shared;
        let mut state = shared.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                shared.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = shared
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 非阻塞取出
    pub fn try_pop(&self) -> Option<T> {
        let shared = &*self.shared;
        let item = shared.lock().items.pop_front();
        if item.is_some() {
            shared.not_full.notify_one();
        }
        item
    }

    /// 发出流结束信号
    ///
    /// 唤醒所有阻塞的生产者与消费者. 已排队的元素仍可被取出.
    pub fn close(&self) {
        let shared = &*self.shared;
        shared.lock().closed = true;
        shared.not_empty.notify_all();
        shared.not_full.notify_all();
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.shared.capacity)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish()
    }
}
