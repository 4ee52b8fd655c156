use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid magic number 0x{0:08x}")]
    InvalidMagic(u32),
    #[error("malformed file, {0}")]
    FormatError(String),
    /// The input is a single architecture Mach-O file, not a fat file.
    #[error("not a fat file")]
    Thin,
    #[error("fat file contains no architectures")]
    NoImages,
    #[error("duplicate architecture {0}")]
    DuplicateArch(String),
    #[error("{path} does not contain the specified architecture {arch}")]
    ArchNotPresent { arch: String, path: String },
    #[error("unknown architecture specification flag: {0}")]
    UnsupportedArch(String),
    #[error("file offset of architecture {0} exceeds 4GB, use -fat64 to handle as fat64")]
    Fat32Overflow(String),
    #[error("segalign {0} must be a non-zero power of two")]
    SegAlignInvalid(String),
    #[error("-segalign {0} specified multiple times")]
    SegAlignDuplicate(String),
    #[error("segalign {0} exceeds the maximum alignment 0x8000")]
    SegAlignTooLarge(String),
    #[error("-segalign {0} specified but the resulting file does not contain that architecture")]
    SegAlignArchMissing(String),
    #[error("archive member {path}({member}) cputype ({got}) does not match previous archive members cputype ({want})")]
    ArchiveArchMismatch {
        path: String,
        member: String,
        got: String,
        want: String,
    },
    #[error("-hideARM64 requires executables, {0} is not an executable")]
    HideArm64RequiresExecutable(String),
    #[error("no input files specified")]
    NoInput,
    #[error("only one input file allowed")]
    OnlyOneInputAllowed,
    #[error("specified architecture {requested} does not match the file architecture {actual}")]
    ArchSpecMismatch { requested: String, actual: String },
    #[error("{}: {source}", path.display())]
    File { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn file<P: Into<PathBuf>>(path: P) -> impl FnOnce(io::Error) -> Error {
        move |source| Error::File {
            path: path.into(),
            source,
        }
    }

    /// Attach `path` to a bare I/O error, other errors pass through.
    pub fn at<P: Into<PathBuf>>(self, path: P) -> Error {
        match self {
            Error::Io(source) => Error::file(path)(source),
            err => err,
        }
    }

    /// Errors caused by how the tool was invoked rather than by the files it was given.
    pub fn is_usage(&self) -> bool {
        match self {
            Error::NoInput
            | Error::OnlyOneInputAllowed
            | Error::UnsupportedArch(_)
            | Error::ArchSpecMismatch { .. }
            | Error::SegAlignInvalid(_)
            | Error::SegAlignDuplicate(_)
            | Error::SegAlignTooLarge(_)
            | Error::SegAlignArchMissing(_)
            | Error::HideArm64RequiresExecutable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
