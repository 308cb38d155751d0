//! CRC-16/CCITT, shared by the SBP and ANPP framers
//!
//! Both protocols use the 0x1021 polynomial but disagree on the seed:
//! SBP starts from zero, ANPP from 0xFFFF. Frame validation runs once
//! per candidate frame, so the bitwise form is fast enough and avoids
//! carrying a lookup table.

const POLYNOMIAL: u16 = 0x1021;

/// Compute CRC-16/CCITT over `data`, starting from `init`.
pub(crate) fn crc16_ccitt(init: u16, data: &[u8]) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
