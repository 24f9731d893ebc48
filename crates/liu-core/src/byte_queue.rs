//! 可按绝对偏移寻址的字节队列.
//!
//! 数据从尾部追加, 读取使用自流开始以来的绝对偏移 (而非队列内相对位置).
//! 已消费的前缀可以丢弃以限制内存; 对已丢弃区域的读取返回 [`LiuError::DataEvicted`].

use bytes::{Bytes, BytesMut};

use crate::{LiuError, LiuResult};

/// 可按绝对偏移寻址的字节队列
///
/// # 示例
/// ```
/// use liu_core::byte_queue::OffsetByteQueue;
///
/// let mut q = OffsetByteQueue::new();
/// q.push(&[1, 2, 3, 4]);
/// q.trim(2).unwrap();
/// assert_eq!(q.head(), 2);
/// assert_eq!(q.read_at(2, 2).unwrap(), &[3, 4]);
/// assert!(q.read_at(1, 1).is_err());
/// ```
#[derive(Debug, Default)]
pub struct OffsetByteQueue {
    /// 保留的数据, 第一个字节对应 `head`
    buf: BytesMut,
    /// 队列头部的绝对偏移
    head: u64,
}

impl OffsetByteQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定容量创建队列
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            head: 0,
        }
    }

    /// 追加数据到尾部
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// 头部 (最早仍可读的字节) 的绝对偏移
    pub fn head(&self) -> u64 {
        self.head
    }

    /// 尾部 (下一个将被追加的字节) 的绝对偏移
    pub fn tail(&self) -> u64 {
        self.head + self.buf.len() as u64
    }

    /// 当前保留的字节数
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 是否没有保留任何字节
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 将绝对偏移转换为缓冲区下标
    fn index_of(&self, offset: u64) -> LiuResult<usize> {
        if offset < self.head {
            return Err(LiuError::DataEvicted {
                offset,
                head: self.head,
            });
        }
        if offset > self.tail() {
            return Err(LiuError::NeedMoreData);
        }
        Ok((offset - self.head) as usize)
    }

    /// 获取从 `offset` 到尾部的全部数据
    pub fn peek(&self, offset: u64) -> LiuResult<&[u8]> {
        let start = self.index_of(offset)?;
        Ok(&self.buf[start..])
    }

    /// 读取 `[offset, offset + len)` 区间
    ///
    /// 区间尚未完整到达时返回 [`LiuError::NeedMoreData`].
    pub fn read_at(&self, offset: u64, len: usize) -> LiuResult<&[u8]> {
        let start = self.index_of(offset)?;
        let end = start + len;
        if end > self.buf.len() {
            return Err(LiuError::NeedMoreData);
        }
        Ok(&self.buf[start..end])
    }

    /// 丢弃 `offset` 之前的所有数据
    ///
    /// `offset` 不大于当前头部时不做任何事.
    pub fn trim(&mut self, offset: u64) -> LiuResult<()> {
        if offset <= self.head {
            return Ok(());
        }
        if offset > self.tail() {
            return Err(LiuError::InvalidArgument(format!(
                "trim 越过队列尾部: offset={}, tail={}",
                offset,
                self.tail()
            )));
        }
        let count = (offset - self.head) as usize;
        let _ = self.buf.split_to(count);
        self.head = offset;
        Ok(())
    }

    /// 取出 `[head, offset)` 区间作为独立的 `Bytes`, 头部前移到 `offset`
    pub fn take_until(&mut self, offset: u64) -> LiuResult<Bytes> {
        let count = self.index_of(offset)?;
        let taken = self.buf.split_to(count).freeze();
        self.head = offset;
        Ok(taken)
    }

    /// 清空队列, 头部移到尾部
    pub fn clear(&mut self) {
        self.head = self.tail();
        self.buf.clear();
    }
}
