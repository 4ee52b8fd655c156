//! The operations of the `lipo` tool.
//!
//! Every operation maps its inputs, gathers the slices it keeps, and only then
//! streams the result into a temporary file next to the output, which is renamed
//! over the output once complete. The slices borrow the mappings, so they can't
//! outlive the operation that created them.
use std::fs::{self, File, Permissions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap::Mmap;
use tempfile::NamedTempFile;

use crate::arch::get_arch_name_from_types;
use crate::archive::ArchiveFile;
use crate::consts::*;
use crate::display::{DetailedInfo, InfoLine};
use crate::errors::{Error, Result};
use crate::fat::FatFile;
use crate::loader::{file_kind, FileKind};
use crate::slice::{self, lookup_arch, Slice};
use crate::writer::{FatFlags, FatLayout};

/// An input file, optionally declaring its architecture with `-arch <arch> <file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub arch: Option<String>,
}

impl InputFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        InputFile {
            path: path.into(),
            arch: None,
        }
    }

    pub fn with_arch<P: Into<PathBuf>, S: Into<String>>(arch: S, path: P) -> Self {
        InputFile {
            path: path.into(),
            arch: Some(arch.into()),
        }
    }
}

/// Options shared by the operations writing a fat file.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub flags: FatFlags,
    /// `(arch, hex alignment)` overrides
    pub segaligns: Vec<(String, String)>,
}

/// A read-only mapping of an input file.
struct MappedFile {
    path: PathBuf,
    mmap: Mmap,
    permissions: Permissions,
}

impl MappedFile {
    fn open<P: AsRef<Path>>(path: P) -> Result<MappedFile> {
        let path = path.as_ref();
        let file = File::open(path).map_err(Error::file(path))?;
        let metadata = file.metadata().map_err(Error::file(path))?;

        if metadata.len() == 0 {
            return Err(Error::FormatError(format!("{} is an empty file", path.display())));
        }

        let mmap = unsafe { Mmap::map(&file) }.map_err(Error::file(path))?;

        debug!("mapped {:?}, {} bytes", path, mmap.len());

        Ok(MappedFile {
            path: path.to_owned(),
            mmap,
            permissions: metadata.permissions(),
        })
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn payload(&self) -> &[u8] {
        &self.mmap
    }
}

/// The slices of one input file.
enum Contents<'a> {
    Thin(Slice<'a>),
    Fat(FatFile<'a>),
    Archive(Slice<'a>),
}

impl<'a> Contents<'a> {
    fn parse(file: &'a MappedFile) -> Result<Contents<'a>> {
        let payload = file.payload();

        match FatFile::parse(payload) {
            Ok(fat) => Ok(Contents::Fat(fat)),
            Err(Error::Thin) => Slice::from_mach_file(payload).map(Contents::Thin),
            Err(Error::InvalidMagic(_)) if payload.starts_with(ARMAG) => {
                let archive = ArchiveFile::parse(payload)?;

                Slice::from_archive(archive, &file.name()).map(Contents::Archive)
            }
            Err(err) => Err(err),
        }
    }

    /// The slices a listing reports, hidden ones excluded.
    fn visible_slices(&self) -> &[Slice<'a>] {
        match self {
            Contents::Thin(slice) | Contents::Archive(slice) => std::slice::from_ref(slice),
            Contents::Fat(fat) => fat.visible_slices(),
        }
    }

    fn into_slices(self) -> Vec<Slice<'a>> {
        match self {
            Contents::Thin(slice) | Contents::Archive(slice) => vec![slice],
            Contents::Fat(fat) => fat.into_slices(),
        }
    }

    /// The encoding a rewrite of this file keeps.
    fn flags(&self) -> FatFlags {
        let mut flags = FatFlags::empty();

        if let Contents::Fat(fat) = self {
            if fat.is_fat64() {
                flags |= FatFlags::FAT64;
            }
            if !fat.hidden.is_empty() {
                flags |= FatFlags::HIDE_ARM64;
            }
        }

        flags
    }

    /// Check the architecture declared with `-arch` against the file.
    fn check_arch(&self, requested: Option<&str>) -> Result<()> {
        let requested = match requested {
            Some(name) => name,
            None => return Ok(()),
        };
        let identity = lookup_arch(requested)?;

        let matched = match self {
            Contents::Thin(slice) | Contents::Archive(slice) => slice.identity() == identity,
            Contents::Fat(fat) => fat.slices().iter().any(|slice| slice.identity() == identity),
        };

        if matched {
            Ok(())
        } else {
            Err(Error::ArchSpecMismatch {
                requested: requested.to_owned(),
                actual: self
                    .visible_slices()
                    .iter()
                    .map(Slice::arch_name)
                    .collect::<Vec<_>>()
                    .join(" "),
            })
        }
    }
}

fn single_input(inputs: &[InputFile]) -> Result<&InputFile> {
    match inputs {
        [] => Err(Error::NoInput),
        [input] => Ok(input),
        _ => Err(Error::OnlyOneInputAllowed),
    }
}

fn open_inputs(inputs: &[InputFile]) -> Result<Vec<MappedFile>> {
    if inputs.is_empty() {
        return Err(Error::NoInput);
    }

    inputs.iter().map(|input| MappedFile::open(&input.path)).collect()
}

fn parse_input<'a>(input: &InputFile, file: &'a MappedFile) -> Result<Contents<'a>> {
    let contents = Contents::parse(file)?;

    contents.check_arch(input.arch.as_ref().map(String::as_str))?;

    Ok(contents)
}

/// Stream the output into a temporary file beside `output`, then move it into place.
fn write_output<P, F>(output: P, permissions: Permissions, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let output = output.as_ref();
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(Error::file(dir))?;

    {
        let mut w = BufWriter::new(tmp.as_file_mut());

        write(&mut w).map_err(|err| err.at(output))?;

        w.flush().map_err(Error::file(output))?;
    }

    fs::set_permissions(tmp.path(), permissions).map_err(Error::file(output))?;

    tmp.persist(output).map_err(|err| Error::file(output)(err.error))?;

    info!("wrote {:?}", output);

    Ok(())
}

fn write_fat_output<P: AsRef<Path>>(output: P, permissions: Permissions, slices: Vec<Slice>, flags: FatFlags) -> Result<()> {
    let layout = FatLayout::plan(slices, flags)?;

    write_output(output, permissions, |w| layout.write_to(w))
}

fn write_thin_output<P: AsRef<Path>>(output: P, permissions: Permissions, slice: &Slice) -> Result<()> {
    write_output(output, permissions, |w| Ok(w.write_all(slice.payload())?))
}

/// Combine the inputs into one fat file.
pub fn create<P: AsRef<Path>>(inputs: &[InputFile], output: P, opts: &Options) -> Result<()> {
    let files = open_inputs(inputs)?;
    let mut flags = opts.flags;
    let mut slices = Vec::new();

    for (input, file) in inputs.iter().zip(files.iter()) {
        let contents = parse_input(input, file)?;

        flags |= contents.flags() & FatFlags::FAT64;
        slices.extend(contents.into_slices());
    }

    slice::check_duplicates(&slices)?;
    slice::update_align(&mut slices, &opts.segaligns)?;

    write_fat_output(output, files[0].permissions.clone(), slices, flags)
}

/// Copy the slice of one architecture out of a fat file, without a fat header.
pub fn thin<P: AsRef<Path>>(inputs: &[InputFile], arch: &str, output: P) -> Result<()> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;

    let slices = slice::extract(contents.into_slices(), &[arch], &file.name())?;

    match slices.first() {
        Some(slice) => write_thin_output(output, file.permissions.clone(), slice),
        None => Err(Error::ArchNotPresent {
            arch: arch.to_owned(),
            path: file.name(),
        }),
    }
}

/// Keep the named architectures, the result is always a fat file.
pub fn extract<P: AsRef<Path>, S: AsRef<str>>(inputs: &[InputFile], archs: &[S], output: P, opts: &Options) -> Result<()> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;
    let flags = opts.flags | contents.flags();

    let mut slices = slice::extract(contents.into_slices(), archs, &file.name())?;

    slice::update_align(&mut slices, &opts.segaligns)?;

    write_fat_output(output, file.permissions.clone(), slices, flags)
}

/// Keep every architecture sharing a CPU type with the named ones, a single survivor is written thin.
pub fn extract_family<P: AsRef<Path>, S: AsRef<str>>(
    inputs: &[InputFile],
    archs: &[S],
    output: P,
    opts: &Options,
) -> Result<()> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;
    let flags = opts.flags | contents.flags();

    let mut slices = slice::extract_family(contents.into_slices(), archs, &file.name())?;

    if slices.len() == 1 {
        debug!("single {} slice left, write a thin file", slices[0].arch_name());

        return write_thin_output(output, file.permissions.clone(), &slices[0]);
    }

    slice::update_align(&mut slices, &opts.segaligns)?;

    write_fat_output(output, file.permissions.clone(), slices, flags)
}

/// Drop the named architectures.
pub fn remove<P: AsRef<Path>, S: AsRef<str>>(inputs: &[InputFile], archs: &[S], output: P, opts: &Options) -> Result<()> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;
    let flags = opts.flags | contents.flags();

    let mut slices = slice::remove(contents.into_slices(), archs, &file.name())?;

    slice::update_align(&mut slices, &opts.segaligns)?;

    write_fat_output(output, file.permissions.clone(), slices, flags)
}

/// Swap in the thin files of `replacements`, given as `(arch, file)` pairs.
pub fn replace<P: AsRef<Path>, Q: AsRef<Path>>(
    inputs: &[InputFile],
    replacements: &[(String, Q)],
    output: P,
    opts: &Options,
) -> Result<()> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;
    let flags = opts.flags | contents.flags();

    let replacement_files = replacements
        .iter()
        .map(|(_, path)| MappedFile::open(path))
        .collect::<Result<Vec<_>>>()?;
    let mut replacement_slices = Vec::with_capacity(replacements.len());

    for ((arch, _), replacement) in replacements.iter().zip(replacement_files.iter()) {
        let contents = Contents::parse(replacement)?;

        contents.check_arch(Some(arch.as_str()))?;

        match contents {
            Contents::Thin(slice) | Contents::Archive(slice) => replacement_slices.push(slice),
            Contents::Fat(_) => {
                return Err(Error::FormatError(format!(
                    "replacement file {} must be a thin file",
                    replacement.name()
                )))
            }
        }
    }

    let mut slices = slice::replace(contents.into_slices(), replacement_slices, &file.name())?;

    slice::update_align(&mut slices, &opts.segaligns)?;

    write_fat_output(output, file.permissions.clone(), slices, flags)
}

/// The names of the architectures in a file, hidden ones excluded.
pub fn archs(inputs: &[InputFile]) -> Result<Vec<String>> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;

    Ok(contents.visible_slices().iter().map(Slice::arch_name).collect())
}

/// Whether the file has every one of the named architectures.
pub fn verify_arch<S: AsRef<str>>(inputs: &[InputFile], archs: &[S]) -> Result<bool> {
    let input = single_input(inputs)?;
    let file = MappedFile::open(&input.path)?;
    let contents = parse_input(input, &file)?;

    for arch in archs {
        if !slice::contains(contents.visible_slices(), arch.as_ref())? {
            debug!("{} doesn't contain {}", file.name(), arch.as_ref());

            return Ok(false);
        }
    }

    Ok(true)
}

/// One line per input, the fat files first.
pub fn info(inputs: &[InputFile]) -> Result<Vec<InfoLine>> {
    let files = open_inputs(inputs)?;
    let mut lines = Vec::with_capacity(files.len());

    for (input, file) in inputs.iter().zip(files.iter()) {
        let contents = parse_input(input, file)?;
        let path = file.name();

        lines.push(match contents {
            Contents::Fat(ref fat) => InfoLine::Fat {
                path,
                archs: fat.visible_slices().iter().map(Slice::arch_name).collect(),
            },
            Contents::Thin(ref slice) | Contents::Archive(ref slice) => InfoLine::Thin {
                path,
                arch: slice.arch_name(),
            },
        });
    }

    lines.sort_by_key(|line| !line.is_fat());

    Ok(lines)
}

/// The fat headers of the inputs, every architecture entry included.
pub fn detailed_info(inputs: &[InputFile]) -> Result<String> {
    let files = open_inputs(inputs)?;
    let mut s = String::new();

    for (input, file) in inputs.iter().zip(files.iter()) {
        let contents = parse_input(input, file)?;
        let path = file.name();

        match contents {
            Contents::Fat(ref fat) => s += &DetailedInfo { path: &path, fat }.to_string(),
            Contents::Thin(ref slice) | Contents::Archive(ref slice) => {
                s += &format!("input file {} is not a fat file\n", path);
                s += &format!(
                    "{}\n",
                    InfoLine::Thin {
                        path: path.clone(),
                        arch: slice.arch_name(),
                    }
                );
            }
        }
    }

    Ok(s)
}

/// What a file is, and the architecture of its first slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    pub kind: FileKind,
    pub cputype: cpu_type_t,
    pub cpusubtype: cpu_subtype_t,
}

impl Inspection {
    pub fn arch_name(&self) -> String {
        get_arch_name_from_types(self.cputype, self.cpusubtype)
    }
}

/// Classify a file, `None` when it's neither Mach-O, fat nor an archive.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Option<Inspection>> {
    let file = MappedFile::open(path)?;
    let kind = match file_kind(file.payload()) {
        Ok(kind) => kind,
        Err(Error::InvalidMagic(magic)) => {
            debug!("{} has an unknown magic 0x{:08x}", file.name(), magic);

            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let contents = Contents::parse(&file)?;

    Ok(contents.visible_slices().first().map(|slice| Inspection {
        kind,
        cputype: slice.cputype,
        cpusubtype: slice.cpusubtype,
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;
    use crate::testdata::*;
    use crate::writer::write_fat;

    fn write_file(dir: &TempDir, name: &str, data: &[u8], mode: u32) -> PathBuf {
        let path = dir.path().join(name);

        fs::write(&path, data).unwrap();
        fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();

        path
    }

    /// Accepts `left` bytes, then fails like a full disk.
    struct Capped<W> {
        inner: W,
        left: usize,
    }

    impl<W: Write> Write for Capped<W> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.left == 0 {
                return Err(io::Error::from_raw_os_error(libc::ENOSPC));
            }

            let n = self.inner.write(&buf[..buf.len().min(self.left)])?;

            self.left -= n;

            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    fn universal(dir: &TempDir, name: &str, payloads: &[&[u8]], flags: FatFlags) -> PathBuf {
        let slices = payloads.iter().map(|data| Slice::from_mach_file(data).unwrap()).collect();
        let mut buf = Vec::new();

        write_fat(&mut buf, slices, flags).unwrap();

        write_file(dir, name, &buf, 0o755)
    }

    #[test]
    fn test_create_and_archs() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x1000), thin_arm64(0x1000));
        let inputs = vec![
            InputFile::new(write_file(&dir, "arm64", &arm64, 0o750)),
            InputFile::with_arch("x86_64", write_file(&dir, "x86_64", &x86_64, 0o755)),
        ];
        let output = dir.path().join("universal");

        create(&inputs, &output, &Options::default()).unwrap();

        assert_eq!(archs(&[InputFile::new(&output)]).unwrap(), vec!["x86_64", "arm64"]);
        assert_eq!(fs::metadata(&output).unwrap().permissions().mode() & 0o777, 0o750);
        assert!(verify_arch(&[InputFile::new(&output)], &["arm64", "x86_64"]).unwrap());
        assert!(!verify_arch(&[InputFile::new(&output)], &["arm64e"]).unwrap());
    }

    #[test]
    fn test_write_error_names_output() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x1000), thin_arm64(0x1000));
        let layout = FatLayout::plan(
            vec![Slice::from_mach_file(&x86_64).unwrap(), Slice::from_mach_file(&arm64).unwrap()],
            FatFlags::empty(),
        )
        .unwrap();
        let output = dir.path().join("universal");

        match write_output(&output, Permissions::from_mode(0o755), |w| {
            layout.write_to(&mut Capped { inner: w, left: 0x100 })
        }) {
            Err(Error::File { ref path, ref source }) => {
                assert_eq!(path, &output);
                assert_eq!(source.raw_os_error(), Some(libc::ENOSPC));
            }
            res => panic!("unexpected {:?}", res),
        }

        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_create_arch_mismatch() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![InputFile::with_arch("x86_64", write_file(&dir, "arm64", &thin_arm64(0x100), 0o755))];

        match create(&inputs, dir.path().join("out"), &Options::default()) {
            Err(Error::ArchSpecMismatch { requested, actual }) => {
                assert_eq!(requested, "x86_64");
                assert_eq!(actual, "arm64");
            }
            res => panic!("unexpected {:?}", res),
        }
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_usage_errors() {
        let dir = TempDir::new().unwrap();
        let a = InputFile::new(write_file(&dir, "a", &thin_arm64(0x100), 0o755));
        let b = InputFile::new(write_file(&dir, "b", &thin_x86_64(0x100), 0o755));

        match create(&[], dir.path().join("out"), &Options::default()) {
            Err(Error::NoInput) => {}
            res => panic!("unexpected {:?}", res),
        }
        match archs(&[a, b]) {
            Err(Error::OnlyOneInputAllowed) => {}
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_thin_and_inspect() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x100), thin_arm64(0x100));
        let input = universal(&dir, "universal", &[&x86_64[..], &arm64[..]], FatFlags::empty());
        let output = dir.path().join("thin");

        thin(&[InputFile::new(&input)], "arm64", &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), arm64);

        let inspection = inspect(&output).unwrap().unwrap();

        assert_eq!(inspection.kind, FileKind::Thin);
        assert_eq!(inspection.arch_name(), "arm64");

        let inspection = inspect(&input).unwrap().unwrap();

        assert_eq!(inspection.kind, FileKind::Fat);
        assert_eq!(inspection.arch_name(), "x86_64");

        assert_eq!(inspect(write_file(&dir, "text", b"hello world", 0o644)).unwrap(), None);

        match inspect(write_file(&dir, "short", b"\xca\xfe\xba", 0o644)) {
            Err(Error::FormatError(_)) => {}
            res => panic!("unexpected {:?}", res),
        }
        match inspect(write_file(&dir, "empty", b"", 0o644)) {
            Err(Error::FormatError(_)) => {}
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_extract_keeps_fat() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x100), thin_arm64(0x100));
        let input = universal(&dir, "universal", &[&x86_64[..], &arm64[..]], FatFlags::FAT64);
        let output = dir.path().join("extracted");

        extract(&[InputFile::new(&input)], &["arm64"], &output, &Options::default()).unwrap();

        let data = fs::read(&output).unwrap();
        let fat = FatFile::parse(&data).unwrap();

        assert!(fat.is_fat64());
        assert_eq!(fat.slices().len(), 1);
        assert_eq!(fat.slices()[0].payload(), &arm64[..]);
    }

    #[test]
    fn test_segalign() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x100), thin_arm64(0x100));
        let inputs = vec![
            InputFile::new(write_file(&dir, "x86_64", &x86_64, 0o755)),
            InputFile::new(write_file(&dir, "arm64", &arm64, 0o755)),
        ];
        let output = dir.path().join("universal");
        let opts = Options {
            flags: FatFlags::empty(),
            segaligns: vec![("x86_64".into(), "4000".into())],
        };

        create(&inputs, &output, &opts).unwrap();

        let data = fs::read(&output).unwrap();
        let fat = FatFile::parse(&data).unwrap();

        assert_eq!(fat.archs[0].align, 14);
        assert_eq!(fat.archs[0].offset, 0x4000);

        let opts = Options {
            flags: FatFlags::empty(),
            segaligns: vec![("armv7".into(), "4000".into())],
        };

        match create(&inputs, &output, &opts) {
            Err(Error::SegAlignArchMissing(_)) => {}
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_archive_input() {
        let dir = TempDir::new().unwrap();
        let obj = object_arm64(0x40);
        let lib = archive(&[("__.SYMDEF", &b""[..]), ("a.o", &obj[..])]);
        let input = InputFile::new(write_file(&dir, "liba.a", &lib, 0o644));

        assert_eq!(archs(&[input.clone()]).unwrap(), vec!["arm64"]);

        let inspection = inspect(&input.path).unwrap().unwrap();

        assert_eq!(inspection.kind, FileKind::Archive);

        let lines = info(&[input]).unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].to_string().ends_with("liba.a is architecture: arm64"));
    }

    #[test]
    fn test_info_orders_fat_first() {
        let dir = TempDir::new().unwrap();
        let (x86_64, arm64) = (thin_x86_64(0x100), thin_arm64(0x100));
        let thin_input = write_file(&dir, "thin", &arm64, 0o755);
        let fat_input = universal(&dir, "fat", &[&x86_64[..], &arm64[..]], FatFlags::empty());

        let lines = info(&[InputFile::new(&thin_input), InputFile::new(&fat_input)]).unwrap();

        assert_eq!(
            lines,
            vec![
                InfoLine::Fat {
                    path: fat_input.display().to_string(),
                    archs: vec!["x86_64".into(), "arm64".into()],
                },
                InfoLine::Thin {
                    path: thin_input.display().to_string(),
                    arch: "arm64".into(),
                },
            ]
        );

        let s = detailed_info(&[InputFile::new(&thin_input)]).unwrap();

        assert_eq!(
            s,
            format!(
                "input file {0} is not a fat file\nNon-fat file: {0} is architecture: arm64\n",
                thin_input.display()
            )
        );
    }
}
