use std::str::{self, FromStr};

use crate::arch::{effective_identity, get_arch_name_from_types};
use crate::consts::*;
use crate::errors::{Error, Result};
use crate::loader::MachFile;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArHeader {
    pub ar_name: String,
    // modification time
    pub ar_date: libc::time_t,
    // user id
    pub ar_uid: libc::uid_t,
    // group id
    pub ar_gid: libc::gid_t,
    // octal file permissions
    pub ar_mode: libc::mode_t,
    // size in bytes, including a BSD extended name
    pub ar_size: usize,
}

impl ArHeader {
    /// Parse the 60 bytes member header, returns the header and the length of a BSD extended name.
    fn parse(buf: &[u8]) -> Result<(ArHeader, usize)> {
        if &buf[58..60] != ARFMAG {
            return Err(Error::FormatError(format!(
                "bad archive member header trailer {:?}",
                String::from_utf8_lossy(&buf[58..60])
            )));
        }

        let ar_name = field(&buf[0..16])?;
        let header = ArHeader {
            ar_name: ar_name.to_owned(),
            ar_date: parse_decimal(&buf[16..28], "date")?,
            ar_uid: parse_decimal(&buf[28..34], "uid")?,
            ar_gid: parse_decimal(&buf[34..40], "gid")?,
            ar_mode: parse_octal(&buf[40..48])?,
            ar_size: parse_decimal(&buf[48..58], "size")?,
        };

        let name_len = if ar_name.starts_with(AR_EFMT1) {
            parse_decimal(ar_name[AR_EFMT1.len()..].as_bytes(), "extended name length")?
        } else {
            0
        };

        if name_len > header.ar_size {
            return Err(Error::FormatError(format!(
                "archive member name length {} exceeds member size {}",
                name_len, header.ar_size
            )));
        }

        Ok((header, name_len))
    }
}

fn field(buf: &[u8]) -> Result<&str> {
    str::from_utf8(buf)
        .map(|s| s.trim_end_matches(' '))
        .map_err(|err| Error::FormatError(format!("archive member header is not ASCII, {}", err)))
}

fn parse_decimal<T: FromStr + Default>(buf: &[u8], what: &str) -> Result<T> {
    let s = field(buf)?;

    if s.is_empty() {
        Ok(T::default())
    } else {
        s.parse()
            .map_err(|_| Error::FormatError(format!("bad archive member {} {:?}", what, s)))
    }
}

fn parse_octal(buf: &[u8]) -> Result<libc::mode_t> {
    let s = field(buf)?;

    if s.is_empty() {
        Ok(0)
    } else {
        libc::mode_t::from_str_radix(s, 8).map_err(|_| Error::FormatError(format!("bad archive member mode {:?}", s)))
    }
}

/// A member of an ar archive, `payload` excludes the BSD extended name.
#[derive(Debug, Clone)]
pub struct ArMember<'a> {
    pub header: ArHeader,
    pub payload: &'a [u8],
}

impl<'a> ArMember<'a> {
    pub fn name(&self) -> &str {
        &self.header.ar_name
    }

    pub fn is_symdef(&self) -> bool {
        self.header.ar_name.starts_with(SYMDEF)
    }
}

/// An iterator over the members of an ar archive.
pub struct ArMembers<'a> {
    payload: &'a [u8],
    offset: usize,
}

impl<'a> ArMembers<'a> {
    fn parse_member(&mut self) -> Result<ArMember<'a>> {
        let begin = self.offset;
        let rest = &self.payload[begin..];

        if rest.len() < AR_HEADER_SIZE {
            return Err(Error::FormatError(format!("truncated archive member header at offset {}", begin)));
        }

        let (mut header, name_len) = ArHeader::parse(&rest[..AR_HEADER_SIZE])?;
        let body = &rest[AR_HEADER_SIZE..];

        if body.len() < header.ar_size {
            return Err(Error::FormatError(format!(
                "archive member {} at offset {} extends past the end of the file",
                header.ar_name, begin
            )));
        }

        if name_len > 0 {
            let name = &body[..name_len];

            header.ar_name = String::from_utf8_lossy(name.split(|&b| b == 0).next().unwrap_or(name)).into_owned();
        }

        trace!("archive member at offset {}: {}", begin, header);

        let payload = &body[name_len..header.ar_size];

        self.offset = begin + AR_HEADER_SIZE + header.ar_size;
        self.offset += self.offset % 2;

        Ok(ArMember { header, payload })
    }
}

impl<'a> Iterator for ArMembers<'a> {
    type Item = Result<ArMember<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.payload.get(self.offset..).unwrap_or_default();

        if rest.iter().all(|&b| b == b'\n') {
            return None;
        }

        let member = self.parse_member();

        if member.is_err() {
            self.offset = self.payload.len();
        }

        Some(member)
    }
}

/// An ar archive, e.g. a static library.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveFile<'a> {
    payload: &'a [u8],
}

impl<'a> ArchiveFile<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<ArchiveFile<'a>> {
        if !payload.starts_with(ARMAG) {
            return Err(Error::FormatError("missing archive magic string".into()));
        }

        Ok(ArchiveFile { payload })
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn members(&self) -> ArMembers<'a> {
        ArMembers {
            payload: self.payload,
            offset: SARMAG,
        }
    }

    /// The Mach-O header of the first object, after checking every object shares its architecture.
    ///
    /// The symbol table members are skipped.
    pub fn mach_file(&self, path: &str) -> Result<MachFile> {
        let mut first: Option<MachFile> = None;

        for member in self.members() {
            let member = member?;

            if member.is_symdef() {
                trace!("skip symdef member {:?}", member.name());
                continue;
            }
            if member.name().is_empty() {
                warn!("archive {} has a member without a name", path);
            }

            let file = MachFile::parse(member.payload).map_err(|err| {
                Error::FormatError(format!("archive member {}({}) is not a Mach-O file, {}", path, member.name(), err))
            })?;

            match first {
                None => first = Some(file),
                Some(ref want) => {
                    let got = &file.header;
                    let want = &want.header;

                    if effective_identity(got.cputype, got.cpusubtype) != effective_identity(want.cputype, want.cpusubtype) {
                        return Err(Error::ArchiveArchMismatch {
                            path: path.to_owned(),
                            member: member.name().to_owned(),
                            got: get_arch_name_from_types(got.cputype, got.cpusubtype),
                            want: get_arch_name_from_types(want.cputype, want.cpusubtype),
                        });
                    }
                }
            }
        }

        first.ok_or_else(|| Error::FormatError(format!("archive {} contains no object files", path)))
    }
}
