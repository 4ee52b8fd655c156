//! Synthetic Mach-O images and archives for the unit tests.
#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::consts::*;

pub struct MachOBuilder {
    cputype: cpu_type_t,
    cpusubtype: cpu_subtype_t,
    filetype: u32,
    big_endian: bool,
    segments: Vec<u64>,
    size: usize,
    fill: u8,
}

impl MachOBuilder {
    pub fn new(cputype: cpu_type_t, cpusubtype: cpu_subtype_t, filetype: u32) -> Self {
        MachOBuilder {
            cputype,
            cpusubtype,
            filetype,
            big_endian: false,
            segments: Vec::new(),
            size: 0,
            fill: 0xaa,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Add a segment load command mapped at `vmaddr`.
    pub fn segment(mut self, vmaddr: u64) -> Self {
        self.segments.push(vmaddr);
        self
    }

    /// Pad the image with `fill` bytes up to `size` bytes.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        if self.big_endian {
            self.emit::<BigEndian>()
        } else {
            self.emit::<LittleEndian>()
        }
    }

    fn emit<O: ByteOrder>(&self) -> Vec<u8> {
        let is_64bit = self.cputype & CPU_ARCH_ABI64 != 0;
        let cmdsize = if is_64bit { 72 } else { 56 };
        let mut buf = Vec::new();

        buf.write_u32::<O>(if is_64bit { MH_MAGIC_64 } else { MH_MAGIC }).unwrap();
        buf.write_i32::<O>(self.cputype).unwrap();
        buf.write_i32::<O>(self.cpusubtype).unwrap();
        buf.write_u32::<O>(self.filetype).unwrap();
        buf.write_u32::<O>(self.segments.len() as u32).unwrap();
        buf.write_u32::<O>((cmdsize * self.segments.len()) as u32).unwrap();
        buf.write_u32::<O>(0).unwrap();
        if is_64bit {
            buf.write_u32::<O>(0).unwrap();
        }

        for &vmaddr in &self.segments {
            buf.write_u32::<O>(if is_64bit { LC_SEGMENT_64 } else { LC_SEGMENT }).unwrap();
            buf.write_u32::<O>(cmdsize as u32).unwrap();
            buf.extend_from_slice(b"__SEGMENT\0\0\0\0\0\0\0");
            if is_64bit {
                buf.write_u64::<O>(vmaddr).unwrap();
                buf.write_u64::<O>(0x1000).unwrap();
                buf.write_u64::<O>(0).unwrap();
                buf.write_u64::<O>(0).unwrap();
            } else {
                buf.write_u32::<O>(vmaddr as u32).unwrap();
                buf.write_u32::<O>(0x1000).unwrap();
                buf.write_u32::<O>(0).unwrap();
                buf.write_u32::<O>(0).unwrap();
            }
            buf.write_i32::<O>(5).unwrap();
            buf.write_i32::<O>(5).unwrap();
            buf.write_u32::<O>(0).unwrap();
            buf.write_u32::<O>(0).unwrap();
        }

        if buf.len() < self.size {
            buf.resize(self.size, self.fill);
        }

        buf
    }
}

/// An x86_64 executable, its segments give a 2^12 alignment.
pub fn thin_x86_64(size: usize) -> Vec<u8> {
    MachOBuilder::new(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL, MH_EXECUTE)
        .segment(0)
        .segment(0x1_0000_0000)
        .segment(0x1_0000_1000)
        .size(size)
        .fill(0x86)
        .build()
}

/// An arm64 executable, its segments give a 2^14 alignment.
pub fn thin_arm64(size: usize) -> Vec<u8> {
    MachOBuilder::new(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, MH_EXECUTE)
        .segment(0)
        .segment(0x1_0000_0000)
        .segment(0x1_0000_4000)
        .size(size)
        .fill(0x64)
        .build()
}

pub fn thin_arm64e(size: usize) -> Vec<u8> {
    MachOBuilder::new(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E | 0x80000000u32 as i32, MH_EXECUTE)
        .segment(0)
        .segment(0x1_0000_0000)
        .segment(0x1_0000_4000)
        .size(size)
        .fill(0x6e)
        .build()
}

pub fn thin_armv7k(size: usize) -> Vec<u8> {
    MachOBuilder::new(CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7K, MH_EXECUTE)
        .segment(0)
        .segment(0x4000)
        .segment(0x8000)
        .size(size)
        .fill(0x7c)
        .build()
}

pub fn object_arm64(size: usize) -> Vec<u8> {
    MachOBuilder::new(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, MH_OBJECT)
        .size(size)
        .fill(0x0b)
        .build()
}

/// Build an ar archive, long or odd-sized member names use the BSD `#1/<len>` form.
pub fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = ARMAG.to_vec();

    for &(name, payload) in members {
        let (ar_name, long_name) = if name.len() > 16 || name.contains(' ') {
            let padded = (name.len() + 3) & !3;

            (format!("#1/{}", padded), Some(padded))
        } else {
            (name.to_owned(), None)
        };
        let size = payload.len() + long_name.unwrap_or(0);

        buf.extend_from_slice(format!("{:<16}{:<12}{:<6}{:<6}{:<8o}{:<10}", ar_name, 1_600_000_000, 501, 20, 0o100644, size).as_bytes());
        buf.extend_from_slice(ARFMAG);

        if let Some(padded) = long_name {
            let mut name = name.as_bytes().to_vec();

            name.resize(padded, 0);
            buf.extend_from_slice(&name);
        }

        buf.extend_from_slice(payload);

        if size % 2 == 1 {
            buf.push(b'\n');
        }
    }

    buf
}

/// Lay out a fat file by hand from `(cputype, cpusubtype, offset, align, payload)` entries.
///
/// Only the first `nfat_arch` entries are counted by the header, the rest follow as hidden entries.
pub fn fat_image(magic: u32, nfat_arch: u32, archs: &[(cpu_type_t, cpu_subtype_t, u64, u32, &[u8])]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.write_u32::<BigEndian>(magic).unwrap();
    buf.write_u32::<BigEndian>(nfat_arch).unwrap();

    for &(cputype, cpusubtype, offset, align, payload) in archs {
        buf.write_i32::<BigEndian>(cputype).unwrap();
        buf.write_i32::<BigEndian>(cpusubtype).unwrap();
        if magic == FAT_MAGIC_64 {
            buf.write_u64::<BigEndian>(offset).unwrap();
            buf.write_u64::<BigEndian>(payload.len() as u64).unwrap();
            buf.write_u32::<BigEndian>(align).unwrap();
            buf.write_u32::<BigEndian>(0).unwrap();
        } else {
            buf.write_u32::<BigEndian>(offset as u32).unwrap();
            buf.write_u32::<BigEndian>(payload.len() as u32).unwrap();
            buf.write_u32::<BigEndian>(align).unwrap();
        }
    }

    for &(_, _, offset, _, payload) in archs {
        let begin = offset as usize;
        let end = begin + payload.len();

        if buf.len() < end {
            buf.resize(end, 0);
        }

        buf[begin..end].copy_from_slice(payload);
    }

    buf
}
