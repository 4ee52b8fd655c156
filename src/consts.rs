#![allow(non_camel_case_types)]

pub type cpu_type_t = i32;
pub type cpu_subtype_t = i32;

// Capability bits used in the definition of cpu_type.
//

/// 64 bit ABI
pub const CPU_ARCH_ABI64: cpu_type_t = 0x01000000;
/// ABI for 64-bit hardware with 32-bit types; LP32
pub const CPU_ARCH_ABI64_32: cpu_type_t = 0x02000000;

//  Machine types known by all.
//

pub const CPU_TYPE_MC680X0: cpu_type_t = 6;
pub const CPU_TYPE_X86: cpu_type_t = 7;
pub const CPU_TYPE_I386: cpu_type_t = CPU_TYPE_X86;
pub const CPU_TYPE_X86_64: cpu_type_t = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_HPPA: cpu_type_t = 11;
pub const CPU_TYPE_ARM: cpu_type_t = 12;
pub const CPU_TYPE_ARM64: cpu_type_t = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM64_32: cpu_type_t = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;
pub const CPU_TYPE_MC88000: cpu_type_t = 13;
pub const CPU_TYPE_SPARC: cpu_type_t = 14;
pub const CPU_TYPE_I860: cpu_type_t = 15;
pub const CPU_TYPE_POWERPC: cpu_type_t = 18;
pub const CPU_TYPE_POWERPC64: cpu_type_t = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

// Capability bits used in the definition of cpu_subtype.
//

/// mask for feature flags
pub const CPU_SUBTYPE_MASK: u32 = 0xff000000;
/// 64 bit libraries
pub const CPU_SUBTYPE_LIB64: u32 = 0x80000000;

pub const CPU_SUBTYPE_MC680X0_ALL: cpu_subtype_t = 1;
pub const CPU_SUBTYPE_MC68040: cpu_subtype_t = 2;
pub const CPU_SUBTYPE_MC68030_ONLY: cpu_subtype_t = 3;

pub const CPU_SUBTYPE_I386_ALL: cpu_subtype_t = 3;
pub const CPU_SUBTYPE_486: cpu_subtype_t = 4;
pub const CPU_SUBTYPE_486SX: cpu_subtype_t = 4 + (8 << 4);
pub const CPU_SUBTYPE_586: cpu_subtype_t = 5;
pub const CPU_SUBTYPE_PENTPRO: cpu_subtype_t = 6 + (1 << 4);
pub const CPU_SUBTYPE_PENTII_M3: cpu_subtype_t = 6 + (3 << 4);
pub const CPU_SUBTYPE_PENTII_M5: cpu_subtype_t = 6 + (5 << 4);
pub const CPU_SUBTYPE_PENTIUM_4: cpu_subtype_t = 10;

pub const CPU_SUBTYPE_X86_64_ALL: cpu_subtype_t = 3;
/// Haswell feature subset
pub const CPU_SUBTYPE_X86_64_H: cpu_subtype_t = 8;

pub const CPU_SUBTYPE_HPPA_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_HPPA_7100LC: cpu_subtype_t = 1;

pub const CPU_SUBTYPE_MC88000_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_SPARC_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_I860_ALL: cpu_subtype_t = 0;

pub const CPU_SUBTYPE_POWERPC_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_POWERPC_601: cpu_subtype_t = 1;
pub const CPU_SUBTYPE_POWERPC_603: cpu_subtype_t = 3;
pub const CPU_SUBTYPE_POWERPC_603E: cpu_subtype_t = 4;
pub const CPU_SUBTYPE_POWERPC_603EV: cpu_subtype_t = 5;
pub const CPU_SUBTYPE_POWERPC_604: cpu_subtype_t = 6;
pub const CPU_SUBTYPE_POWERPC_604E: cpu_subtype_t = 7;
pub const CPU_SUBTYPE_POWERPC_750: cpu_subtype_t = 9;
pub const CPU_SUBTYPE_POWERPC_7400: cpu_subtype_t = 10;
pub const CPU_SUBTYPE_POWERPC_7450: cpu_subtype_t = 11;
pub const CPU_SUBTYPE_POWERPC_970: cpu_subtype_t = 100;

pub const CPU_SUBTYPE_ARM_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_ARM_V4T: cpu_subtype_t = 5;
pub const CPU_SUBTYPE_ARM_V6: cpu_subtype_t = 6;
pub const CPU_SUBTYPE_ARM_V5TEJ: cpu_subtype_t = 7;
pub const CPU_SUBTYPE_ARM_XSCALE: cpu_subtype_t = 8;
pub const CPU_SUBTYPE_ARM_V7: cpu_subtype_t = 9;
pub const CPU_SUBTYPE_ARM_V7F: cpu_subtype_t = 10;
pub const CPU_SUBTYPE_ARM_V7S: cpu_subtype_t = 11;
pub const CPU_SUBTYPE_ARM_V7K: cpu_subtype_t = 12;
pub const CPU_SUBTYPE_ARM_V8: cpu_subtype_t = 13;
pub const CPU_SUBTYPE_ARM_V6M: cpu_subtype_t = 14;
pub const CPU_SUBTYPE_ARM_V7M: cpu_subtype_t = 15;
pub const CPU_SUBTYPE_ARM_V7EM: cpu_subtype_t = 16;

pub const CPU_SUBTYPE_ARM64_ALL: cpu_subtype_t = 0;
pub const CPU_SUBTYPE_ARM64_V8: cpu_subtype_t = 1;
/// ARMv8.3 with pointer authentication
pub const CPU_SUBTYPE_ARM64E: cpu_subtype_t = 2;

pub const CPU_SUBTYPE_ARM64_32_V8: cpu_subtype_t = 1;

// Constant for the magic field of the mach_header (32-bit architectures)
//

/// the mach magic number
pub const MH_MAGIC: u32 = 0xfeedface;
/// NXSwapInt(MH_MAGIC)
pub const MH_CIGAM: u32 = 0xcefaedfe;

// Constant for the magic field of the mach_header_64 (64-bit architectures)
//

/// the 64-bit mach magic number
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
/// NXSwapInt(MH_MAGIC_64)
pub const MH_CIGAM_64: u32 = 0xcffaedfe;

// The layout of the file depends on the filetype.  For all but the MH_OBJECT
// file type the segments are padded out and aligned on a segment alignment
// boundary for efficient demand pageing.
//
// The file type MH_OBJECT is a compact format intended as output of the
// assembler and input (and possibly output) of the link editor (the .o
// format).  All sections are in one unnamed segment with no segment padding.
//
// Constants for the filetype field of the mach_header
//

/// relocatable object file
pub const MH_OBJECT: u32 = 0x1;
/// demand paged executable file
pub const MH_EXECUTE: u32 = 0x2;
/// fixed VM shared library file
pub const MH_FVMLIB: u32 = 0x3;
/// core file
pub const MH_CORE: u32 = 0x4;
/// preloaded executable file
pub const MH_PRELOAD: u32 = 0x5;
/// dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;
/// dynamic link editor
pub const MH_DYLINKER: u32 = 0x7;
/// dynamically bound bundle file
pub const MH_BUNDLE: u32 = 0x8;

/// segment of this file to be mapped
pub const LC_SEGMENT: u32 = 0x1;
/// 64-bit segment of this file to be mapped
pub const LC_SEGMENT_64: u32 = 0x19;

/// size of `mach_header`
pub const MACH_HEADER_SIZE: usize = 28;
/// size of `mach_header_64`, which carries one reserved word more
pub const MACH_HEADER_64_SIZE: usize = 32;
/// cmd + cmdsize
pub const LOAD_COMMAND_HEADER_SIZE: usize = 8;

// The structures in a fat file are always big-endian.
//

/// the fat magic number
pub const FAT_MAGIC: u32 = 0xcafebabe;
/// NXSwapLong(FAT_MAGIC)
pub const FAT_CIGAM: u32 = 0xbebafeca;
/// the 64-bit fat magic number
pub const FAT_MAGIC_64: u32 = FAT_MAGIC + 1;
/// NXSwapLong(FAT_MAGIC_64)
pub const FAT_CIGAM_64: u32 = 0xbfbafeca;

/// size of `fat_header`
pub const FAT_HEADER_SIZE: usize = 8;
/// size of `fat_arch`
pub const FAT_ARCH_SIZE: usize = 20;
/// size of `fat_arch_64`, offset and size widened plus one reserved word
pub const FAT_ARCH_64_SIZE: usize = 32;

/// the largest alignment a fat file can express, 2^15
pub const MAX_SECT_ALIGN: u32 = 15;

/// the page size used to align relocatable objects, independent of the host
pub const OBJECT_PAGE_SIZE: u64 = 0x4000;

// The archive file format
//

/// ar magic string
pub const ARMAG: &[u8] = b"!<arch>\n";
/// size of ar magic string
pub const SARMAG: usize = 8;
/// size of the member header
pub const AR_HEADER_SIZE: usize = 60;
/// header trailer string
pub const ARFMAG: &[u8] = b"`\n";
/// BSD 4.4 extended format #1: the name follows the header, its length is the decimal suffix
pub const AR_EFMT1: &str = "#1/";
/// name prefix of the archive symbol table member
pub const SYMDEF: &str = "__.SYMDEF";
