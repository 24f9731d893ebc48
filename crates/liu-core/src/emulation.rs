//! 防竞争字节 (emulation prevention) 处理.
//!
//! NAL 载荷中任何 `00 00 0x` (x <= 3) 序列都会在第三个字节前插入 `0x03`,
//! 以免与起始码混淆. 这里提供双向转换:
//! - EBSP → RBSP: 去除防竞争字节
//! - RBSP → EBSP: 插入防竞争字节

/// 查找防竞争字节的位置
///
/// 返回 `data` 中所有需要跳过的 `0x03` 的下标 (升序).
pub fn find_emulation_prevention_bytes(data: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut zeros = 0usize;
    for (i, &b) in data.iter().enumerate() {
        if zeros >= 2 && b == 0x03 {
            positions.push(i);
            zeros = 0;
            continue;
        }
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
    }
    positions
}

/// 去除防竞争字节 (EBSP → RBSP)
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut zeros = 0usize;
    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
        result.push(b);
    }
    result
}

/// 插入防竞争字节 (RBSP → EBSP)
///
/// 末尾若以 `0x00` 结束, 追加一个 `0x03` (对应 cabac_zero_word 的处理).
pub fn add_emulation_prevention(rbsp: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(rbsp.len() + rbsp.len() / 64 + 1);
    let mut zeros = 0usize;
    for &b in rbsp {
        if zeros >= 2 && b <= 0x03 {
            result.push(0x03);
            zeros = 0;
        }
        result.push(b);
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
    }
    if rbsp.last() == Some(&0) {
        result.push(0x03);
    }
    result
}
