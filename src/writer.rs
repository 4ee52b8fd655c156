//! Lay out and emit universal binaries.
use std::cmp::Ordering;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::arch::get_cpu_subtype_type;
use crate::consts::*;
use crate::errors::{Error, Result};
use crate::fat::{fat_arch_size, FatArch};
use crate::slice::{check_duplicates, Slice};

bitflags! {
    pub struct FatFlags: u32 {
        /// 64-bit offsets and sizes
        const FAT64 = 0x0000_0001;
        /// hide the ARM64 slices from loaders that only know 32-bit ARM
        const HIDE_ARM64 = 0x0000_0002;
    }
}

impl Default for FatFlags {
    fn default() -> Self {
        FatFlags::empty()
    }
}

/// The canonical order of slices in a fat file.
///
/// Sub-types of one CPU sort by value, ARM64 sorts after every other CPU,
/// other CPUs sort by alignment.
pub fn compare_slices(lhs: &Slice, rhs: &Slice) -> Ordering {
    if lhs.cputype == rhs.cputype {
        get_cpu_subtype_type(lhs.cpusubtype).cmp(&get_cpu_subtype_type(rhs.cpusubtype))
    } else if lhs.cputype == CPU_TYPE_ARM64 {
        Ordering::Greater
    } else if rhs.cputype == CPU_TYPE_ARM64 {
        Ordering::Less
    } else {
        lhs.align.cmp(&rhs.align)
    }
}

fn align_to(offset: u64, align: u32) -> u64 {
    let mask = (1u64 << align) - 1;

    (offset + mask) & !mask
}

/// Assign each architecture an aligned offset after the header table ending at `begin`.
///
/// Returns the end of the last payload.
pub fn assign_offsets(archs: &mut [FatArch], begin: u64, fat64: bool) -> Result<u64> {
    let limit = if fat64 { u64::max_value() } else { 1 << 32 };
    let mut offset = begin;

    for arch in archs.iter_mut() {
        let name = arch.arch_name();

        if arch.align > MAX_SECT_ALIGN {
            return Err(Error::FormatError(format!(
                "{} alignment 2^{} exceeds the maximum 2^{}",
                name, arch.align, MAX_SECT_ALIGN
            )));
        }

        arch.offset = align_to(offset, arch.align);

        offset = Some(arch.offset)
            .filter(|&begin| begin < limit)
            .and_then(|begin| begin.checked_add(arch.size))
            .filter(|&end| end < limit)
            .ok_or_else(|| Error::Fat32Overflow(name))?;

        trace!("{} at offset 0x{:x}, {} bytes, align 2^{}", arch.arch_name(), arch.offset, arch.size, arch.align);
    }

    Ok(offset)
}

/// A planned universal binary, ready to be written.
#[derive(Debug, Clone)]
pub struct FatLayout<'a> {
    pub magic: u32,
    /// the architectures counted by the fat header
    pub archs: Vec<FatArch>,
    /// ARM64 entries written after the counted ones
    pub hidden: Vec<FatArch>,
    slices: Vec<Slice<'a>>,
}

impl<'a> FatLayout<'a> {
    /// Validate, sort and place the slices of a fat file.
    pub fn plan(slices: Vec<Slice<'a>>, flags: FatFlags) -> Result<FatLayout<'a>> {
        if slices.is_empty() {
            return Err(Error::NoImages);
        }

        let mut hide_arm64 = flags.contains(FatFlags::HIDE_ARM64);

        if hide_arm64 {
            if let Some(slice) = slices.iter().find(|slice| !slice.is_executable()) {
                return Err(Error::HideArm64RequiresExecutable(slice.arch_name()));
            }

            if !slices.iter().any(|slice| slice.cputype == CPU_TYPE_ARM) {
                debug!("no arm slice to hide arm64 slices from, ignore -hideARM64");

                hide_arm64 = false;
            }
        }

        let (mut visible, mut hidden): (Vec<_>, Vec<_>) = slices
            .into_iter()
            .partition(|slice| !(hide_arm64 && slice.cputype == CPU_TYPE_ARM64));

        visible.sort_by(compare_slices);
        hidden.sort_by(compare_slices);

        let nvisible = visible.len();
        let mut slices = visible;

        slices.append(&mut hidden);

        let magic = if flags.contains(FatFlags::FAT64) {
            FAT_MAGIC_64
        } else {
            FAT_MAGIC
        };
        let mut archs = slices
            .iter()
            .map(|slice| FatArch {
                cputype: slice.cputype,
                cpusubtype: slice.cpusubtype,
                offset: 0,
                size: slice.size(),
                align: slice.align,
            })
            .collect::<Vec<_>>();

        let table_end = (FAT_HEADER_SIZE + fat_arch_size(magic) * archs.len()) as u64;

        assign_offsets(&mut archs, table_end, magic == FAT_MAGIC_64)?;
        check_duplicates(&slices)?;

        let hidden = archs.split_off(nvisible);

        debug!(
            "planned fat file with {} archs (+{} hidden), magic=0x{:x}",
            archs.len(),
            hidden.len(),
            magic
        );

        Ok(FatLayout {
            magic,
            archs,
            hidden,
            slices,
        })
    }

    /// The slices in the order they are written.
    pub fn slices(&self) -> &[Slice<'a>] {
        &self.slices
    }

    /// Total size of the fat file.
    pub fn size(&self) -> u64 {
        self.archs
            .iter()
            .chain(self.hidden.iter())
            .map(|arch| arch.offset + arch.size)
            .max()
            .unwrap_or(FAT_HEADER_SIZE as u64)
    }

    /// Emit the fat header, every architecture entry, then the zero padded payloads.
    ///
    /// The output is written strictly in order, never seeked.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<BigEndian>(self.magic)?;
        w.write_u32::<BigEndian>(self.archs.len() as u32)?;

        let mut pos = FAT_HEADER_SIZE as u64;

        for arch in self.archs.iter().chain(self.hidden.iter()) {
            w.write_i32::<BigEndian>(arch.cputype)?;
            w.write_i32::<BigEndian>(arch.cpusubtype)?;

            if self.magic == FAT_MAGIC_64 {
                w.write_u64::<BigEndian>(arch.offset)?;
                w.write_u64::<BigEndian>(arch.size)?;
                w.write_u32::<BigEndian>(arch.align)?;
                w.write_u32::<BigEndian>(0)?;
            } else {
                w.write_u32::<BigEndian>(arch.offset as u32)?;
                w.write_u32::<BigEndian>(arch.size as u32)?;
                w.write_u32::<BigEndian>(arch.align)?;
            }

            pos += fat_arch_size(self.magic) as u64;
        }

        for (arch, slice) in self.archs.iter().chain(self.hidden.iter()).zip(self.slices.iter()) {
            if pos < arch.offset {
                pos += io::copy(&mut io::repeat(0).take(arch.offset - pos), w)?;
            }

            w.write_all(slice.payload())?;

            pos += slice.size();
        }

        w.flush()?;

        Ok(())
    }
}

/// Write `slices` as a universal binary.
pub fn write_fat<'a, W: Write>(w: &mut W, slices: Vec<Slice<'a>>, flags: FatFlags) -> Result<FatLayout<'a>> {
    let layout = FatLayout::plan(slices, flags)?;

    layout.write_to(w)?;

    Ok(layout)
}
