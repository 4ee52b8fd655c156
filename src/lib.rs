//! Create, inspect and edit Mach-O universal (fat) binaries, the way Apple's `lipo` does.
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate bitflags;

mod arch;
mod archive;
mod consts;
mod display;
mod errors;
mod fat;
mod loader;
pub mod lipo;
mod slice;
#[cfg(test)]
mod testdata;
mod writer;

pub use crate::arch::{
    arch_names, effective_identity, get_arch_from_flag, get_arch_info_from_flag, get_arch_info_from_types,
    get_arch_labels, get_arch_name_from_types, get_cpu_subtype_feature, get_cpu_subtype_type, ArchInfo,
};
pub use crate::archive::{ArHeader, ArMember, ArMembers, ArchiveFile};
pub use crate::consts::*;
pub use crate::display::{DetailedInfo, InfoLine};
pub use crate::errors::{Error, Result};
pub use crate::fat::{FatArch, FatFile};
pub use crate::lipo::{InputFile, Inspection, Options};
pub use crate::loader::{file_kind, guess_align, read_fat_magic, FileKind, MachFile, MachHeader};
pub use crate::slice::{
    check_duplicates, contains, extract, extract_family, lookup_arch, parse_segalign, remove, replace, update_align,
    Slice,
};
pub use crate::writer::{assign_offsets, compare_slices, write_fat, FatFlags, FatLayout};
