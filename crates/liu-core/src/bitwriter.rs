//! 比特流写入器.
//!
//! 按大端位序写入, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//! 主要用于构造参数集/条带等 RBSP 语法结构.

/// 比特流写入器
///
/// # 示例
/// ```
/// use liu_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_ue(0); // "1"
/// bw.write_ue(1); // "010"
/// let data = bw.finish();
/// assert_eq!(data, vec![0b1011_1010]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定容量创建比特流写入器
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            current_byte: 0,
            bit_count: 0,
        }
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 当前是否位于字节边界
    pub fn is_aligned(&self) -> bool {
        self.bit_count == 0
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte = (self.current_byte << 1) | (bit & 1) as u8;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bit(u32::from(flag));
    }

    /// 写入 N 个位 (最多 32 位)
    ///
    /// 值的低 N 位被写入, 高位在前.
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={} 超过 32 位", n);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1);
        }
    }

    /// 写入 N 个位 (最多 64 位)
    pub fn write_bits_u64(&mut self, value: u64, n: u32) {
        if n <= 32 {
            self.write_bits(value as u32, n);
        } else {
            self.write_bits((value >> 32) as u32, n - 32);
            self.write_bits(value as u32, 32);
        }
    }

    /// 写入无符号指数哥伦布编码 ue(v)
    pub fn write_ue(&mut self, value: u32) {
        let code = u64::from(value) + 1;
        let len = 64 - code.leading_zeros();
        for _ in 0..len - 1 {
            self.write_bit(0);
        }
        self.write_bits_u64(code, len);
    }

    /// 写入有符号指数哥伦布编码 se(v)
    pub fn write_se(&mut self, value: i32) {
        let value = i64::from(value);
        let code = if value > 0 { value * 2 - 1 } else { -value * 2 };
        self.write_ue(code as u32);
    }

    /// 写入 rbsp_trailing_bits: 一个 1 后补 0 到字节边界
    pub fn write_rbsp_trailing_bits(&mut self) {
        self.write_bit(1);
        self.align_zero();
    }

    /// 以 0 填充到字节边界
    pub fn align_zero(&mut self) {
        while self.bit_count != 0 {
            self.write_bit(0);
        }
    }

    /// 写入整字节序列 (要求已字节对齐, 否则逐位写入)
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_aligned() {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 完成写入, 不足一字节的部分以 0 填充
    pub fn finish(mut self) -> Vec<u8> {
        self.align_zero();
        self.data
    }
}
