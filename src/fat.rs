use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::arch::{effective_identity, get_arch_name_from_types};
use crate::consts::*;
use crate::errors::{Error, Result};
use crate::loader::read_fat_magic;
use crate::slice::{check_duplicates, member_filetype, Slice};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FatArch {
    /// cpu specifier (int)
    pub cputype: cpu_type_t,
    /// machine specifier (int)
    pub cpusubtype: cpu_subtype_t,
    /// file offset to this object file
    pub offset: u64,
    /// size of this object file
    pub size: u64,
    /// alignment as a power of 2
    pub align: u32,
}

impl FatArch {
    fn parse<T: Read>(buf: &mut T, is_64bit: bool) -> Result<FatArch> {
        let cputype = buf.read_i32::<BigEndian>()?;
        let cpusubtype = buf.read_i32::<BigEndian>()?;

        let arch = if is_64bit {
            let arch = FatArch {
                cputype,
                cpusubtype,
                offset: buf.read_u64::<BigEndian>()?,
                size: buf.read_u64::<BigEndian>()?,
                align: buf.read_u32::<BigEndian>()?,
            };

            // reserved, some producers leave garbage in it
            buf.read_u32::<BigEndian>()?;

            arch
        } else {
            FatArch {
                cputype,
                cpusubtype,
                offset: u64::from(buf.read_u32::<BigEndian>()?),
                size: u64::from(buf.read_u32::<BigEndian>()?),
                align: buf.read_u32::<BigEndian>()?,
            }
        };

        Ok(arch)
    }

    pub fn identity(&self) -> (cpu_type_t, cpu_subtype_t) {
        effective_identity(self.cputype, self.cpusubtype)
    }

    pub fn arch_name(&self) -> String {
        get_arch_name_from_types(self.cputype, self.cpusubtype)
    }
}

/// Size of one architecture entry for a fat magic.
pub fn fat_arch_size(magic: u32) -> usize {
    if magic == FAT_MAGIC_64 {
        FAT_ARCH_64_SIZE
    } else {
        FAT_ARCH_SIZE
    }
}

/// A universal binary read from memory.
#[derive(Debug, Clone)]
pub struct FatFile<'a> {
    pub magic: u32,
    /// the architectures counted by the fat header
    pub archs: Vec<FatArch>,
    /// ARM64 entries following the counted ones, invisible to older loaders
    pub hidden: Vec<FatArch>,
    slices: Vec<Slice<'a>>,
}

impl<'a> FatFile<'a> {
    /// Parse a fat file, fails with `Error::Thin` when `payload` is a single architecture Mach-O file.
    pub fn parse(payload: &'a [u8]) -> Result<FatFile<'a>> {
        let magic = read_fat_magic(payload)?;
        let is_64bit = magic == FAT_MAGIC_64;
        let arch_size = fat_arch_size(magic) as u64;
        let len = payload.len() as u64;

        let mut buf = Cursor::new(payload);

        buf.set_position(4);

        let nfat_arch = buf
            .read_u32::<BigEndian>()
            .map_err(|_| Error::FormatError("truncated fat header".into()))?;

        debug!("parsing fat header with {} archs, magic=0x{:x}", nfat_arch, magic);

        if nfat_arch == 0 {
            return Err(Error::NoImages);
        }

        let mut table_end = FAT_HEADER_SIZE as u64 + arch_size * u64::from(nfat_arch);

        if table_end > len {
            return Err(Error::FormatError(format!(
                "fat header with {} archs extends past the end of the file",
                nfat_arch
            )));
        }

        let mut archs = Vec::with_capacity(nfat_arch as usize);

        for i in 0..nfat_arch {
            let arch = FatArch::parse(&mut buf, is_64bit)?;

            debug!("fat header arch#{}, arch={:?}", i, arch);

            archs.push(arch);
        }

        let first_payload = archs.iter().map(|arch| arch.offset).min().unwrap_or(table_end);
        let mut hidden = Vec::new();

        while table_end + arch_size <= first_payload && table_end + arch_size <= len {
            let arch = FatArch::parse(&mut buf, is_64bit)?;

            if arch.cputype != CPU_TYPE_ARM64 {
                break;
            }

            debug!("hidden arch#{}, arch={:?}", hidden.len(), arch);

            hidden.push(arch);
            table_end += arch_size;
        }

        let slices = archs
            .iter()
            .chain(hidden.iter())
            .map(|arch| Self::slice(payload, arch))
            .collect::<Result<Vec<_>>>()?;

        check_duplicates(&slices)?;

        Ok(FatFile {
            magic,
            archs,
            hidden,
            slices,
        })
    }

    fn slice(payload: &'a [u8], arch: &FatArch) -> Result<Slice<'a>> {
        let data = arch
            .offset
            .checked_add(arch.size)
            .filter(|&end| end <= payload.len() as u64)
            .map(|end| &payload[arch.offset as usize..end as usize])
            .ok_or_else(|| {
                Error::FormatError(format!(
                    "{} slice at offset {} with size {} extends past the end of the file",
                    arch.arch_name(),
                    arch.offset,
                    arch.size
                ))
            })?;

        Ok(Slice::new(
            arch.cputype,
            arch.cpusubtype,
            member_filetype(data),
            arch.align,
            data,
        ))
    }

    pub fn is_fat64(&self) -> bool {
        self.magic == FAT_MAGIC_64
    }

    /// Every slice, the counted ones first.
    pub fn slices(&self) -> &[Slice<'a>] {
        &self.slices
    }

    pub fn visible_slices(&self) -> &[Slice<'a>] {
        &self.slices[..self.archs.len()]
    }

    pub fn hidden_slices(&self) -> &[Slice<'a>] {
        &self.slices[self.archs.len()..]
    }

    pub fn into_slices(self) -> Vec<Slice<'a>> {
        self.slices
    }
}
