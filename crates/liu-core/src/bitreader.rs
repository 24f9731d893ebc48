//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从 NAL 载荷中读取定长字段与指数哥伦布编码字段.
//!
//! 默认模式下会透明跳过防竞争字节 (`00 00 03` 中的 `03`), 调用方看到的是
//! 逻辑 RBSP 比特流而非线上编码. 对已经去除防竞争字节的数据使用 [`BitReader::new_raw`].

use crate::{LiuError, LiuResult};

/// 比特流读取器
///
/// 只支持向前读取, 需要回退时重新构造一个读取器.
///
/// # 示例
/// ```
/// use liu_core::bitreader::BitReader;
///
/// // 0x00 0x00 0x03 0x01: 中间的 0x03 是防竞争字节
/// let data = [0x00, 0x00, 0x03, 0x01];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.bits_left(), 24);
/// assert_eq!(br.read_bits(24).unwrap(), 0x000001);
/// ```
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// 源数据 (线上编码)
    data: &'a [u8],
    /// 防竞争字节在 `data` 中的下标, 升序
    escapes: Vec<usize>,
    /// 下一个尚未越过的防竞争字节在 `escapes` 中的序号
    next_escape: usize,
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建读取器, 自动跳过防竞争字节
    pub fn new(data: &'a [u8]) -> Self {
        let escapes = crate::emulation::find_emulation_prevention_bytes(data);
        let mut br = Self {
            data,
            escapes,
            next_escape: 0,
            byte_pos: 0,
            bit_pos: 0,
        };
        br.skip_escape();
        br
    }

    /// 创建不做防竞争处理的读取器 (数据已是 RBSP)
    pub fn new_raw(data: &'a [u8]) -> Self {
        Self {
            data,
            escapes: Vec::new(),
            next_escape: 0,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 若当前位置落在防竞争字节上则越过它
    fn skip_escape(&mut self) {
        while self.escapes.get(self.next_escape) == Some(&self.byte_pos) {
            self.byte_pos += 1;
            self.next_escape += 1;
        }
    }

    fn advance_byte(&mut self) {
        self.bit_pos = 0;
        self.byte_pos += 1;
        self.skip_escape();
    }

    /// 获取已读取的逻辑位数 (不含防竞争字节)
    pub fn bits_read(&self) -> usize {
        (self.byte_pos - self.next_escape) * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读逻辑位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        let pending_escapes = self.escapes.len() - self.next_escape;
        (self.data.len() - self.byte_pos - pending_escapes) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 当前是否位于字节边界
    pub fn byte_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> LiuResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(LiuError::BitstreamExhausted);
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.advance_byte();
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> LiuResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 剩余数据不足时不移动位置.
    pub fn read_bits(&mut self, n: u32) -> LiuResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(LiuError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(LiuError::BitstreamExhausted);
        }

        let mut result: u64 = 0;
        let mut remaining = n;

        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u64::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.advance_byte();
            }
            remaining -= to_read;
        }

        Ok(result as u32)
    }

    /// 读取 N 个位 (最多 64 位)
    pub fn read_bits_u64(&mut self, n: u32) -> LiuResult<u64> {
        if n <= 32 {
            return self.read_bits(n).map(u64::from);
        }
        if n > 64 {
            return Err(LiuError::InvalidArgument(format!(
                "read_bits_u64: n={} 超过 64 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(LiuError::BitstreamExhausted);
        }

        let high = u64::from(self.read_bits(n - 32)?);
        let low = u64::from(self.read_bits(32)?);
        Ok((high << 32) | low)
    }

    /// 读取无符号指数哥伦布编码 ue(v)
    pub fn read_ue(&mut self) -> LiuResult<u32> {
        let mut leading_zeros = 0u32;
        while self.read_bit()? == 0 {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(LiuError::InvalidData(
                    "指数哥伦布编码前导零超过 31 个".into(),
                ));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 读取有符号指数哥伦布编码 se(v)
    ///
    /// 映射关系: 0→0, 1→1, 2→-1, 3→2, 4→-2 ...
    pub fn read_se(&mut self) -> LiuResult<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i64;
        let value = if code & 1 == 1 { magnitude } else { -magnitude };
        Ok(value as i32)
    }

    /// 读取 ue(v) 并校验上限
    pub fn read_ue_max(&mut self, max: u32, field: &str) -> LiuResult<u32> {
        let value = self.read_ue()?;
        if value > max {
            return Err(LiuError::InvalidData(format!(
                "{} 超出范围, value={}, max={}",
                field, value, max
            )));
        }
        Ok(value)
    }

    /// 读取 se(v) 并校验区间
    pub fn read_se_range(&mut self, min: i32, max: i32, field: &str) -> LiuResult<i32> {
        let value = self.read_se()?;
        if !(min..=max).contains(&value) {
            return Err(LiuError::InvalidData(format!(
                "{} 超出范围, value={}, range=[{}, {}]",
                field, value, min, max
            )));
        }
        Ok(value)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> LiuResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(LiuError::BitstreamExhausted);
        }

        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let step = remaining.min(available);
            self.bit_pos += step as u8;
            if self.bit_pos >= 8 {
                self.advance_byte();
            }
            remaining -= step;
        }

        Ok(())
    }

    /// 对齐到下一个字节边界
    ///
    /// 如果当前已在字节边界, 则不做任何事.
    pub fn align_to_byte(&mut self) {
        if self.bit_pos > 0 {
            self.advance_byte();
        }
    }

    /// 是否还有 RBSP 数据 (more_rbsp_data)
    ///
    /// RBSP 以一个 `1` 停止位加若干 `0` 结束, 当前位置在停止位之前则返回 true.
    pub fn more_rbsp_data(&self) -> bool {
        match self.stop_bit_position() {
            Some(stop) => self.bits_read() < stop,
            None => false,
        }
    }

    /// rbsp_stop_one_bit 的逻辑位位置
    fn stop_bit_position(&self) -> Option<usize> {
        let (index, byte) = self
            .data
            .iter()
            .enumerate()
            .rev()
            .find(|(i, b)| **b != 0 && self.escapes.binary_search(i).is_err())?;
        let escapes_before = self.escapes.partition_point(|&e| e < index);
        let logical_byte = index - escapes_before;
        Some(logical_byte * 8 + 7 - byte.trailing_zeros() as usize)
    }

    /// 获取底层数据的引用
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitwriter::BitWriter;

    #[test]
    fn test_read_bits_basic() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        assert_eq!(br.read_bits(1).unwrap(), 1);
        assert_eq!(br.read_bits(1).unwrap(), 0);
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);

        assert!(br.is_eof());
    }

    #[test]
    fn test_read_bits_32_bit() {
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(32).unwrap(), 0xFF00FF00);
    }

    #[test]
    fn test_read_bits_advances_exactly_n() {
        let data = [0xA5u8; 8];
        for n in 1..=32u32 {
            let mut br = BitReader::new(&data);
            br.read_bits(n).unwrap();
            br.skip_bits(0).unwrap();
            assert_eq!(br.bits_read(), n as usize, "n={} 后位置不正确", n);
            assert_eq!(br.bits_left(), 64 - n as usize);
        }
    }

    #[test]
    fn test_read_past_end_fails() {
        let data = [0xFF, 0x01];
        let mut br = BitReader::new(&data);
        br.read_bits(12).unwrap();
        let err = br.read_bits(5).unwrap_err();
        assert!(matches!(err, LiuError::BitstreamExhausted));
        // 失败的读取不移动位置
        assert_eq!(br.bits_left(), 4);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert!(matches!(br.read_bit(), Err(LiuError::BitstreamExhausted)));
        assert!(matches!(br.skip_bits(1), Err(LiuError::BitstreamExhausted)));
    }

    #[test]
    fn test_read_bits_rejects_width_over_32() {
        let data = [0u8; 8];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_bits(33), Err(LiuError::InvalidArgument(_))));
    }

    #[test]
    fn test_emulation_prevention_elided() {
        // 00 00 03 00 00 03 01 => 逻辑数据 00 00 00 00 01
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01];
        let mut br = BitReader::new(&data);
        assert_eq!(br.bits_left(), 40);
        assert_eq!(br.read_bits(16).unwrap(), 0);
        assert_eq!(br.bits_read(), 16);
        assert_eq!(br.read_bits(24).unwrap(), 0x000001);
        assert!(br.is_eof());
    }

    #[test]
    fn test_raw_mode_keeps_escape_bytes() {
        let data = [0x00, 0x00, 0x03, 0x01];
        let mut br = BitReader::new_raw(&data);
        assert_eq!(br.bits_left(), 32);
        assert_eq!(br.read_bits(32).unwrap(), 0x00000301);
    }

    #[test]
    fn test_read_ue_se() {
        // ue: 1 -> 0, 010 -> 1, 011 -> 2, 00100 -> 3
        let data = [0b1010_0110, 0b0100_0000];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_ue().unwrap(), 0);
        assert_eq!(br.read_ue().unwrap(), 1);
        assert_eq!(br.read_ue().unwrap(), 2);
        assert_eq!(br.read_ue().unwrap(), 3);

        // se: 010 -> 1, 011 -> -1, 00100 -> 2
        let data = [0b0100_1100, 0b1000_0000];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_se().unwrap(), 1);
        assert_eq!(br.read_se().unwrap(), -1);
        assert_eq!(br.read_se().unwrap(), 2);
    }

    #[test]
    fn test_exp_golomb_round_trip() {
        let values = [
            0u32,
            1,
            2,
            7,
            254,
            255,
            65_535,
            1 << 20,
            (1 << 31) - 2,
            (1 << 31) - 1,
        ];
        let mut bw = BitWriter::new();
        for &v in &values {
            bw.write_ue(v);
        }
        bw.write_rbsp_trailing_bits();
        let data = bw.finish();

        let mut br = BitReader::new_raw(&data);
        for &v in &values {
            assert_eq!(br.read_ue().unwrap(), v, "ue 往返失败: {}", v);
        }
    }

    #[test]
    fn test_signed_exp_golomb_round_trip() {
        let values = [0i32, 1, -1, 2, -2, 1000, -1000, i32::MAX / 2, -(i32::MAX / 2)];
        let mut bw = BitWriter::new();
        for &v in &values {
            bw.write_se(v);
        }
        let data = bw.finish();

        let mut br = BitReader::new_raw(&data);
        for &v in &values {
            assert_eq!(br.read_se().unwrap(), v, "se 往返失败: {}", v);
        }
    }

    #[test]
    fn test_read_ue_too_many_leading_zeros() {
        let data = [0u8; 5];
        let mut br = BitReader::new_raw(&data);
        assert!(matches!(br.read_ue(), Err(LiuError::InvalidData(_))));
    }

    #[test]
    fn test_more_rbsp_data() {
        // 3 位有效数据 + 停止位
        let data = [0b1011_1000];
        let mut br = BitReader::new(&data);
        assert!(br.more_rbsp_data());
        br.read_bits(3).unwrap();
        assert!(br.more_rbsp_data(), "停止位之前应仍有数据");
        br.read_bits(1).unwrap();
        assert!(!br.more_rbsp_data());
    }

    #[test]
    fn test_more_rbsp_data_with_trailing_zero_bytes() {
        let data = [0b1100_0000, 0x80, 0x00];
        let mut br = BitReader::new(&data);
        br.read_bits(2).unwrap();
        assert!(br.more_rbsp_data());
        br.read_bits(6).unwrap();
        assert!(!br.more_rbsp_data());
    }

    #[test]
    fn test_skip_bits_across_escape() {
        let data = [0xAA, 0x00, 0x00, 0x03, 0x02, 0xFF];
        let mut br = BitReader::new(&data);
        br.skip_bits(24).unwrap();
        assert_eq!(br.read_bits(8).unwrap(), 0x02);
        assert_eq!(br.read_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn test_read_bits_u64() {
        let data = [0xFF, 0x00, 0xFF, 0x00, 0xAA, 0xBB, 0xCC, 0xDD];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits_u64(64).unwrap(), 0xFF00FF00AABBCCDD);
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        br.read_bits(3).unwrap();
        assert!(!br.byte_aligned());
        br.align_to_byte();
        assert!(br.byte_aligned());
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
    }
}
