use std::fmt;

use crate::arch::{get_arch_labels, get_cpu_subtype_feature};
use crate::archive::ArHeader;
use crate::fat::{FatArch, FatFile};

/// The `-detailed_info` listing of a fat file.
pub struct DetailedInfo<'a, 'b> {
    pub path: &'b str,
    pub fat: &'b FatFile<'a>,
}

impl<'a, 'b> DetailedInfo<'a, 'b> {
    fn print_arch(&self, f: &mut fmt::Formatter, arch: &FatArch, hidden: bool) -> fmt::Result {
        let (cputype, cpusubtype) = get_arch_labels(arch.cputype, arch.cpusubtype);

        if hidden {
            writeln!(f, "architecture {} (hidden)", arch.arch_name())?;
        } else {
            writeln!(f, "architecture {}", arch.arch_name())?;
        }
        writeln!(f, "    cputype {}", cputype)?;
        writeln!(f, "    cpusubtype {}", cpusubtype)?;
        writeln!(f, "    capabilities 0x{:x}", get_cpu_subtype_feature(arch.cpusubtype))?;
        writeln!(f, "    offset {}", arch.offset)?;
        writeln!(f, "    size {}", arch.size)?;
        writeln!(f, "    align 2^{} ({})", arch.align, 1u64 << arch.align.min(63))
    }
}

impl<'a, 'b> fmt::Display for DetailedInfo<'a, 'b> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Fat header in: {}", self.path)?;
        writeln!(f, "fat_magic 0x{:08x}", self.fat.magic)?;

        if self.fat.hidden.is_empty() {
            writeln!(f, "nfat_arch {}", self.fat.archs.len())?;
        } else {
            writeln!(f, "nfat_arch {} (+{} hidden)", self.fat.archs.len(), self.fat.hidden.len())?;
        }

        for arch in &self.fat.archs {
            self.print_arch(f, arch, false)?;
        }
        for arch in &self.fat.hidden {
            self.print_arch(f, arch, true)?;
        }

        Ok(())
    }
}

/// One line of the `-info` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoLine {
    Fat { path: String, archs: Vec<String> },
    Thin { path: String, arch: String },
}

impl InfoLine {
    pub fn is_fat(&self) -> bool {
        match self {
            InfoLine::Fat { .. } => true,
            InfoLine::Thin { .. } => false,
        }
    }
}

impl fmt::Display for InfoLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InfoLine::Fat { path, archs } => write!(f, "Architectures in the fat file: {} are: {}", path, archs.join(" ")),
            InfoLine::Thin { path, arch } => write!(f, "Non-fat file: {} is architecture: {}", path, arch),
        }
    }
}

impl fmt::Display for ArHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:o} {}/{} {:8} {} {}",
            self.ar_mode & 0o7777,
            self.ar_uid,
            self.ar_gid,
            self.ar_size,
            self.ar_date,
            self.ar_name
        )
    }
}
