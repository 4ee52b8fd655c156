//! One architecture's payload and the set operations over a list of them.
use std::collections::HashSet;
use std::fmt;

use crate::arch::{effective_identity, get_arch_from_flag, get_arch_name_from_types};
use crate::archive::ArchiveFile;
use crate::consts::*;
use crate::errors::{Error, Result};
use crate::loader::MachFile;

/// An architecture slice, from a thin file, a fat file member or a whole static library.
///
/// The slice borrows its bytes from the file it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<'a> {
    pub cputype: cpu_type_t,
    pub cpusubtype: cpu_subtype_t,
    /// the Mach-O file type, 0 when the payload isn't a Mach-O file
    pub filetype: u32,
    /// alignment as a power of 2
    pub align: u32,
    payload: &'a [u8],
}

impl<'a> Slice<'a> {
    pub fn new(cputype: cpu_type_t, cpusubtype: cpu_subtype_t, filetype: u32, align: u32, payload: &'a [u8]) -> Self {
        Slice {
            cputype,
            cpusubtype,
            filetype,
            align,
            payload,
        }
    }

    /// A thin Mach-O file, aligned by its segments.
    pub fn from_mach_file(payload: &'a [u8]) -> Result<Slice<'a>> {
        let MachFile { header, align } = MachFile::parse(payload)?;

        Ok(Slice::new(header.cputype, header.cpusubtype, header.filetype, align, payload))
    }

    /// A static library, identified and aligned by its objects.
    pub fn from_archive(archive: ArchiveFile<'a>, path: &str) -> Result<Slice<'a>> {
        let MachFile { header, align } = archive.mach_file(path)?;

        Ok(Slice::new(header.cputype, header.cpusubtype, MH_OBJECT, align, archive.payload()))
    }

    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn identity(&self) -> (cpu_type_t, cpu_subtype_t) {
        effective_identity(self.cputype, self.cpusubtype)
    }

    pub fn arch_name(&self) -> String {
        get_arch_name_from_types(self.cputype, self.cpusubtype)
    }

    pub fn is_executable(&self) -> bool {
        self.filetype == MH_EXECUTE
    }
}

impl<'a> fmt::Display for Slice<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes, align 2^{})", self.arch_name(), self.size(), self.align)
    }
}

/// The Mach-O file type of a fat file member.
pub(crate) fn member_filetype(payload: &[u8]) -> u32 {
    if payload.starts_with(ARMAG) {
        MH_OBJECT
    } else {
        match MachFile::parse(payload) {
            Ok(file) => file.header.filetype,
            Err(err) => {
                debug!("fat member is not a Mach-O file, {}", err);
                0
            }
        }
    }
}

/// Resolve an architecture flag, e.g. `arm64e`.
pub fn lookup_arch(name: &str) -> Result<(cpu_type_t, cpu_subtype_t)> {
    get_arch_from_flag(name)
        .map(|(cputype, cpusubtype)| effective_identity(cputype, cpusubtype))
        .ok_or_else(|| Error::UnsupportedArch(name.to_owned()))
}

fn lookup_archs<S: AsRef<str>>(names: &[S]) -> Result<Vec<(&str, (cpu_type_t, cpu_subtype_t))>> {
    let mut seen = HashSet::new();
    let mut archs = Vec::new();

    for name in names {
        let name = name.as_ref();
        let identity = lookup_arch(name)?;

        if seen.insert(identity) {
            archs.push((name, identity));
        }
    }

    Ok(archs)
}

/// Fails with the name of the first architecture that appears twice.
pub fn check_duplicates(slices: &[Slice]) -> Result<()> {
    let mut seen = HashSet::new();

    for slice in slices {
        if !seen.insert(slice.identity()) {
            return Err(Error::DuplicateArch(slice.arch_name()));
        }
    }

    Ok(())
}

pub fn contains(slices: &[Slice], name: &str) -> Result<bool> {
    let identity = lookup_arch(name)?;

    Ok(slices.iter().any(|slice| slice.identity() == identity))
}

fn find_missing<S: AsRef<str>>(slices: &[Slice], names: &[S], source: &str) -> Result<()> {
    for (name, identity) in lookup_archs(names)? {
        if !slices.iter().any(|slice| slice.identity() == identity) {
            return Err(Error::ArchNotPresent {
                arch: name.to_owned(),
                path: source.to_owned(),
            });
        }
    }

    Ok(())
}

/// Keep the slices of the named architectures, every one of them must be present.
pub fn extract<'a, S: AsRef<str>>(slices: Vec<Slice<'a>>, names: &[S], source: &str) -> Result<Vec<Slice<'a>>> {
    find_missing(&slices, names, source)?;

    let identities = lookup_archs(names)?
        .into_iter()
        .map(|(_, identity)| identity)
        .collect::<HashSet<_>>();

    Ok(slices
        .into_iter()
        .filter(|slice| identities.contains(&slice.identity()))
        .collect())
}

/// Keep the slices sharing a CPU type with any of the named architectures.
pub fn extract_family<'a, S: AsRef<str>>(slices: Vec<Slice<'a>>, names: &[S], source: &str) -> Result<Vec<Slice<'a>>> {
    let cputypes = lookup_archs(names)?
        .into_iter()
        .map(|(_, (cputype, _))| cputype)
        .collect::<HashSet<_>>();

    let slices = slices
        .into_iter()
        .filter(|slice| cputypes.contains(&slice.cputype))
        .collect::<Vec<_>>();

    if slices.is_empty() {
        return Err(Error::ArchNotPresent {
            arch: names.first().map(|name| name.as_ref().to_owned()).unwrap_or_default(),
            path: source.to_owned(),
        });
    }

    Ok(slices)
}

/// Drop the slices of the named architectures, every one of them must be present.
pub fn remove<'a, S: AsRef<str>>(slices: Vec<Slice<'a>>, names: &[S], source: &str) -> Result<Vec<Slice<'a>>> {
    find_missing(&slices, names, source)?;

    let identities = lookup_archs(names)?
        .into_iter()
        .map(|(_, identity)| identity)
        .collect::<HashSet<_>>();

    Ok(slices
        .into_iter()
        .filter(|slice| !identities.contains(&slice.identity()))
        .collect())
}

/// Swap in `replacements` for the slices of the same architectures.
pub fn replace<'a>(slices: Vec<Slice<'a>>, replacements: Vec<Slice<'a>>, source: &str) -> Result<Vec<Slice<'a>>> {
    check_duplicates(&replacements)?;

    let identities = replacements.iter().map(Slice::identity).collect::<HashSet<_>>();

    for replacement in &replacements {
        if !slices.iter().any(|slice| slice.identity() == replacement.identity()) {
            return Err(Error::ArchNotPresent {
                arch: replacement.arch_name(),
                path: source.to_owned(),
            });
        }
    }

    Ok(slices
        .into_iter()
        .filter(|slice| !identities.contains(&slice.identity()))
        .chain(replacements)
        .collect())
}

/// Parse a `-segalign` value, a hexadecimal power of 2 no larger than 0x8000, into a power of 2 exponent.
pub fn parse_segalign(value: &str) -> Result<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    let align = u64::from_str_radix(digits, 16).map_err(|_| Error::SegAlignInvalid(value.to_owned()))?;

    if align == 0 || !align.is_power_of_two() {
        Err(Error::SegAlignInvalid(value.to_owned()))
    } else if align > 1 << MAX_SECT_ALIGN {
        Err(Error::SegAlignTooLarge(value.to_owned()))
    } else {
        Ok(align.trailing_zeros())
    }
}

/// Override the alignment of the named architectures with `(arch, hex value)` pairs.
pub fn update_align<S: AsRef<str>>(slices: &mut [Slice], segaligns: &[(S, S)]) -> Result<()> {
    let mut seen = HashSet::new();

    for (name, value) in segaligns {
        let name = name.as_ref();
        let identity = lookup_arch(name)?;

        if !seen.insert(identity) {
            return Err(Error::SegAlignDuplicate(name.to_owned()));
        }

        let align = parse_segalign(value.as_ref())?;
        let slice = slices
            .iter_mut()
            .find(|slice| slice.identity() == identity)
            .ok_or_else(|| Error::SegAlignArchMissing(name.to_owned()))?;

        debug!("segalign {} 2^{} => 2^{}", name, slice.align, align);

        slice.align = align;
    }

    Ok(())
}
