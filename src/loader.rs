use std::cmp;
use std::io::{BufRead, Cursor};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};

use crate::consts::*;
use crate::errors::{Error, Result};

pub trait MachArch {
    /// size of the mach header
    const HEADER_SIZE: usize;
    /// the segment load command of this word size
    const LC_SEGMENT: u32;
    /// the smallest alignment a segment may be given
    const MIN_ALIGN: u32;

    fn parse_mach_header<T: BufRead, O: ByteOrder>(buf: &mut T) -> Result<MachHeader>;

    fn read_vmaddr<O: ByteOrder>(buf: &mut Cursor<&[u8]>) -> Result<u64>;
}

pub enum Arch32 {}
pub enum Arch64 {}

impl MachArch for Arch32 {
    const HEADER_SIZE: usize = MACH_HEADER_SIZE;
    const LC_SEGMENT: u32 = LC_SEGMENT;
    const MIN_ALIGN: u32 = 2;

    fn parse_mach_header<T: BufRead, O: ByteOrder>(buf: &mut T) -> Result<MachHeader> {
        let header = MachHeader {
            magic: buf.read_u32::<O>()?,
            cputype: buf.read_i32::<O>()?,
            cpusubtype: buf.read_i32::<O>()?,
            filetype: buf.read_u32::<O>()?,
            ncmds: buf.read_u32::<O>()?,
            sizeofcmds: buf.read_u32::<O>()?,
            flags: buf.read_u32::<O>()?,
        };

        Ok(header)
    }

    fn read_vmaddr<O: ByteOrder>(buf: &mut Cursor<&[u8]>) -> Result<u64> {
        Ok(u64::from(buf.read_u32::<O>()?))
    }
}

impl MachArch for Arch64 {
    const HEADER_SIZE: usize = MACH_HEADER_64_SIZE;
    const LC_SEGMENT: u32 = LC_SEGMENT_64;
    const MIN_ALIGN: u32 = 3;

    fn parse_mach_header<T: BufRead, O: ByteOrder>(buf: &mut T) -> Result<MachHeader> {
        let header = Arch32::parse_mach_header::<T, O>(buf)?;

        buf.consume(4);

        Ok(header)
    }

    fn read_vmaddr<O: ByteOrder>(buf: &mut Cursor<&[u8]>) -> Result<u64> {
        Ok(buf.read_u64::<O>()?)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MachHeader {
    pub magic: u32,
    pub cputype: cpu_type_t,
    pub cpusubtype: cpu_subtype_t,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

/// What the leading magic number says a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// a single architecture Mach-O file
    Thin,
    /// a fat file with 32-bit offsets
    Fat,
    /// a fat file with 64-bit offsets
    Fat64,
    /// an ar archive, e.g. a static library
    Archive,
}

/// Read the big-endian fat magic at the start of `payload`.
///
/// Fails with `Error::Thin` when the file is a Mach-O file instead,
/// so the caller can open it as a single architecture.
pub fn read_fat_magic(payload: &[u8]) -> Result<u32> {
    if payload.len() < 4 {
        return Err(Error::FormatError(format!(
            "file too small ({} bytes) to contain a magic number",
            payload.len()
        )));
    }

    let magic = BigEndian::read_u32(payload);

    match magic {
        FAT_MAGIC | FAT_MAGIC_64 => Ok(magic),
        _ => match LittleEndian::read_u32(payload) {
            MH_MAGIC | MH_MAGIC_64 | MH_CIGAM | MH_CIGAM_64 => Err(Error::Thin),
            _ => Err(Error::InvalidMagic(magic)),
        },
    }
}

/// Classify a file by its magic number.
pub fn file_kind(payload: &[u8]) -> Result<FileKind> {
    match read_fat_magic(payload) {
        Ok(FAT_MAGIC) => Ok(FileKind::Fat),
        Ok(_) => Ok(FileKind::Fat64),
        Err(Error::Thin) => Ok(FileKind::Thin),
        Err(Error::InvalidMagic(_)) if payload.starts_with(ARMAG) => Ok(FileKind::Archive),
        Err(err) => Err(err),
    }
}

/// The parts of a thin Mach-O file a fat file cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachFile {
    pub header: MachHeader,
    /// segment alignment as a power of 2
    pub align: u32,
}

impl MachFile {
    pub fn parse(payload: &[u8]) -> Result<MachFile> {
        if payload.len() < 4 {
            return Err(Error::FormatError("file too small to contain a mach header".into()));
        }

        match LittleEndian::read_u32(payload) {
            MH_MAGIC => Self::parse_mach_file::<Arch32, LittleEndian>(payload),
            MH_CIGAM => Self::parse_mach_file::<Arch32, BigEndian>(payload),
            MH_MAGIC_64 => Self::parse_mach_file::<Arch64, LittleEndian>(payload),
            MH_CIGAM_64 => Self::parse_mach_file::<Arch64, BigEndian>(payload),
            magic => Err(Error::InvalidMagic(magic.swap_bytes())),
        }
    }

    fn parse_mach_file<A: MachArch, O: ByteOrder>(payload: &[u8]) -> Result<MachFile> {
        if payload.len() < A::HEADER_SIZE {
            return Err(Error::FormatError(format!(
                "truncated mach header, {} bytes",
                payload.len()
            )));
        }

        let mut buf = Cursor::new(payload);
        let header = A::parse_mach_header::<_, O>(&mut buf)?;

        debug!("parsed mach-o file header: {:?}", header);

        let align = if header.filetype == MH_OBJECT {
            guess_align(OBJECT_PAGE_SIZE, A::MIN_ALIGN)
        } else {
            Self::segment_align::<A, O>(&header, &mut buf)?
        };

        Ok(MachFile { header, align })
    }

    /// The largest alignment every segment's virtual address satisfies.
    fn segment_align<A: MachArch, O: ByteOrder>(header: &MachHeader, buf: &mut Cursor<&[u8]>) -> Result<u32> {
        let len = buf.get_ref().len() as u64;
        let mut align = MAX_SECT_ALIGN;

        for i in 0..header.ncmds {
            let begin = buf.position();

            if begin + LOAD_COMMAND_HEADER_SIZE as u64 > len {
                return Err(Error::FormatError(format!("load command #{} extends past the end of the file", i)));
            }

            let cmd = buf.read_u32::<O>()?;
            let cmdsize = u64::from(buf.read_u32::<O>()?);

            if cmdsize < LOAD_COMMAND_HEADER_SIZE as u64 || begin + cmdsize > len {
                return Err(Error::FormatError(format!(
                    "load command #{} has an invalid size {}",
                    i, cmdsize
                )));
            }

            if cmd == A::LC_SEGMENT {
                // skip the 16 bytes segment name
                if cmdsize < LOAD_COMMAND_HEADER_SIZE as u64 + 16 + 8 {
                    return Err(Error::FormatError(format!("segment command #{} too small", i)));
                }

                buf.set_position(begin + LOAD_COMMAND_HEADER_SIZE as u64 + 16);

                let vmaddr = A::read_vmaddr::<O>(buf)?;
                let segalign = guess_align(vmaddr, A::MIN_ALIGN);

                trace!("segment #{} vmaddr=0x{:x}, align=2^{}", i, vmaddr, segalign);

                align = cmp::min(align, segalign);
            }

            buf.set_position(begin + cmdsize);
        }

        Ok(align)
    }
}

/// The largest power of 2 dividing `vmaddr`, clamped to `[min_align, MAX_SECT_ALIGN]`.
pub fn guess_align(vmaddr: u64, min_align: u32) -> u32 {
    if vmaddr == 0 {
        MAX_SECT_ALIGN
    } else {
        cmp::max(min_align, cmp::min(vmaddr.trailing_zeros(), MAX_SECT_ALIGN))
    }
}
