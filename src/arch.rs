//! The architecture registry.
//!
//! Maps the flags accepted on the command line (`arm64e`, `x86_64h`, ...) to
//! `(cputype, cpusubtype)` pairs and back. The top 8 bits of the sub-type are
//! capability bits and never take part in a lookup.
use std::collections::HashMap;

use crate::consts::*;

/// An entry of the architecture table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchInfo {
    pub name: &'static str,
    pub cputype: cpu_type_t,
    pub cpusubtype: cpu_subtype_t,
    pub cputype_label: &'static str,
    pub cpusubtype_label: &'static str,
}

macro_rules! arch_table {
    ($(($name:expr, $cputype:ident, $cpusubtype:ident)),* $(,)*) => {
        &[$(ArchInfo {
            name: $name,
            cputype: $cputype,
            cpusubtype: $cpusubtype,
            cputype_label: stringify!($cputype),
            cpusubtype_label: stringify!($cpusubtype),
        }),*]
    };
}

static ARCH_INFOS: &[ArchInfo] = arch_table! {
    ("i386", CPU_TYPE_I386, CPU_SUBTYPE_I386_ALL),
    ("x86_64", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL),
    ("x86_64h", CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_H),
    ("arm", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_ALL),
    ("arm64", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL),
    ("arm64e", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E),
    ("arm64v8", CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_V8),
    ("arm64_32", CPU_TYPE_ARM64_32, CPU_SUBTYPE_ARM64_32_V8),
    ("armv4t", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V4T),
    ("armv5", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V5TEJ),
    ("xscale", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_XSCALE),
    ("armv6", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6),
    ("armv6m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V6M),
    ("armv7", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7),
    ("armv7f", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7F),
    ("armv7s", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7S),
    ("armv7k", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7K),
    ("armv7m", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7M),
    ("armv7em", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7EM),
    ("armv8", CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V8),
    ("ppc", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_ALL),
    ("ppc601", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_601),
    ("ppc603", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603),
    ("ppc603e", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603E),
    ("ppc603ev", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_603EV),
    ("ppc604", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_604),
    ("ppc604e", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_604E),
    ("ppc750", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_750),
    ("ppc7400", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_7400),
    ("ppc7450", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_7450),
    ("ppc970", CPU_TYPE_POWERPC, CPU_SUBTYPE_POWERPC_970),
    ("ppc64", CPU_TYPE_POWERPC64, CPU_SUBTYPE_POWERPC_ALL),
    ("ppc970-64", CPU_TYPE_POWERPC64, CPU_SUBTYPE_POWERPC_970),
    ("i486", CPU_TYPE_I386, CPU_SUBTYPE_486),
    ("i486SX", CPU_TYPE_I386, CPU_SUBTYPE_486SX),
    ("i586", CPU_TYPE_I386, CPU_SUBTYPE_586),
    ("i686", CPU_TYPE_I386, CPU_SUBTYPE_PENTPRO),
    ("pentIIm3", CPU_TYPE_I386, CPU_SUBTYPE_PENTII_M3),
    ("pentIIm5", CPU_TYPE_I386, CPU_SUBTYPE_PENTII_M5),
    ("pentium4", CPU_TYPE_I386, CPU_SUBTYPE_PENTIUM_4),
    ("m68k", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC680X0_ALL),
    ("m68030", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC68030_ONLY),
    ("m68040", CPU_TYPE_MC680X0, CPU_SUBTYPE_MC68040),
    ("hppa", CPU_TYPE_HPPA, CPU_SUBTYPE_HPPA_ALL),
    ("hppa7100LC", CPU_TYPE_HPPA, CPU_SUBTYPE_HPPA_7100LC),
    ("sparc", CPU_TYPE_SPARC, CPU_SUBTYPE_SPARC_ALL),
    ("m88k", CPU_TYPE_MC88000, CPU_SUBTYPE_MC88000_ALL),
    ("i860", CPU_TYPE_I860, CPU_SUBTYPE_I860_ALL),
};

lazy_static! {
    static ref ARCH_BY_NAME: HashMap<&'static str, &'static ArchInfo> =
        ARCH_INFOS.iter().map(|info| (info.name, info)).collect();
    static ref ARCH_BY_TYPE: HashMap<(cpu_type_t, cpu_subtype_t), &'static ArchInfo> = ARCH_INFOS
        .iter()
        .map(|info| ((info.cputype, get_cpu_subtype_type(info.cpusubtype)), info))
        .collect();
}

/// Strip the capability bits off a CPU sub-type.
pub fn get_cpu_subtype_type(subtype: cpu_subtype_t) -> cpu_subtype_t {
    (subtype as u32 & !CPU_SUBTYPE_MASK) as cpu_subtype_t
}

/// The capability bits of a CPU sub-type, shifted down to a byte.
pub fn get_cpu_subtype_feature(subtype: cpu_subtype_t) -> u32 {
    (subtype as u32 & CPU_SUBTYPE_MASK) >> 24
}

/// The `(cputype, cpusubtype)` pair two architectures are compared by.
pub fn effective_identity(cputype: cpu_type_t, cpusubtype: cpu_subtype_t) -> (cpu_type_t, cpu_subtype_t) {
    (cputype, get_cpu_subtype_type(cpusubtype))
}

/// Look up the table entry of an architecture flag.
pub fn get_arch_info_from_flag(name: &str) -> Option<&'static ArchInfo> {
    ARCH_BY_NAME.get(name).copied()
}

/// Get the cputype and cpusubtype from a name
pub fn get_arch_from_flag(name: &str) -> Option<(cpu_type_t, cpu_subtype_t)> {
    get_arch_info_from_flag(name).map(|info| (info.cputype, info.cpusubtype))
}

pub fn get_arch_info_from_types(cputype: cpu_type_t, cpusubtype: cpu_subtype_t) -> Option<&'static ArchInfo> {
    ARCH_BY_TYPE.get(&effective_identity(cputype, cpusubtype)).copied()
}

/// Get the canonical name of an architecture, `unknown(<cputype>,<cpusubtype>)` when it isn't registered.
pub fn get_arch_name_from_types(cputype: cpu_type_t, cpusubtype: cpu_subtype_t) -> String {
    match get_arch_info_from_types(cputype, cpusubtype) {
        Some(info) => info.name.to_owned(),
        None => format!("unknown({},{})", cputype, get_cpu_subtype_type(cpusubtype)),
    }
}

/// All registered architecture names, in table order.
pub fn arch_names() -> Vec<&'static str> {
    ARCH_INFOS.iter().map(|info| info.name).collect()
}

/// The `CPU_TYPE_*` / `CPU_SUBTYPE_*` labels printed by the detailed listing.
///
/// Unregistered pairs fall back to their decimal values.
pub fn get_arch_labels(cputype: cpu_type_t, cpusubtype: cpu_subtype_t) -> (String, String) {
    match get_arch_info_from_types(cputype, cpusubtype) {
        Some(info) => (info.cputype_label.to_owned(), info.cpusubtype_label.to_owned()),
        None => (
            cputype.to_string(),
            get_cpu_subtype_type(cpusubtype).to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_basic_mapping() {
        assert_eq!(get_arch_from_flag("armv7"), Some((CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7)));
        assert_eq!(get_arch_from_flag("arm64e"), Some((CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E)));
        assert_eq!(get_arch_from_flag("x86_64h"), Some((CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_H)));
        assert_eq!(get_arch_from_flag("arm64_32"), Some((CPU_TYPE_ARM64_32, CPU_SUBTYPE_ARM64_32_V8)));
        assert_eq!(get_arch_from_flag("nonsense"), None);

        assert_eq!(get_arch_name_from_types(CPU_TYPE_ARM, CPU_SUBTYPE_ARM_V7K), "armv7k");
        assert_eq!(get_arch_name_from_types(CPU_TYPE_I386, CPU_SUBTYPE_I386_ALL), "i386");
    }

    #[test]
    fn test_capability_bits_ignored() {
        let lib64 = CPU_SUBTYPE_X86_64_ALL | CPU_SUBTYPE_LIB64 as cpu_subtype_t;

        assert_eq!(get_arch_name_from_types(CPU_TYPE_X86_64, lib64), "x86_64");
        assert_eq!(get_cpu_subtype_feature(lib64), 0x80);
        assert_eq!(get_cpu_subtype_type(lib64), CPU_SUBTYPE_X86_64_ALL);
        assert_eq!(
            effective_identity(CPU_TYPE_X86_64, lib64),
            effective_identity(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL)
        );
    }

    #[test]
    fn test_unknown_arch() {
        assert_eq!(get_arch_name_from_types(CPU_TYPE_ARM64, 0x8000_0007u32 as i32), "unknown(16777228,7)");
        assert_eq!(get_arch_labels(99, 4), ("99".to_owned(), "4".to_owned()));
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            get_arch_labels(CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E),
            ("CPU_TYPE_ARM64".to_owned(), "CPU_SUBTYPE_ARM64E".to_owned())
        );
        assert_eq!(
            get_arch_labels(CPU_TYPE_X86_64, CPU_SUBTYPE_X86_64_ALL),
            ("CPU_TYPE_X86_64".to_owned(), "CPU_SUBTYPE_X86_64_ALL".to_owned())
        );
    }

    #[test]
    fn test_table_is_one_to_one() {
        let names = arch_names();
        let identities: HashSet<_> = ARCH_INFOS
            .iter()
            .map(|info| effective_identity(info.cputype, info.cpusubtype))
            .collect();

        assert_eq!(names.len(), identities.len());
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), names.len());
        assert_eq!(names[0], "i386");

        for name in names {
            let (cputype, cpusubtype) = get_arch_from_flag(name).unwrap();

            assert_eq!(get_arch_name_from_types(cputype, cpusubtype), name);
        }
    }
}
