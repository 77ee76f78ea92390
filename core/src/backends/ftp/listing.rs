//! Parser for `LIST` output.
//!
//! Two formats are understood: the unix `ls -l` layout most servers emit and
//! the DOS layout of IIS-style servers. The detected [`ServerFlavor`] only
//! decides which one is tried first.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::files::{parse_permissions, Access, EntryKind, RawEntry};
use crate::path;

/// Operating system family of the FTP server, guessed from its banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerFlavor {
    #[default]
    Unix,
    Windows,
}

impl ServerFlavor {
    pub fn detect(welcome: Option<&str>) -> Self {
        let banner = welcome.unwrap_or_default().to_ascii_lowercase();
        if banner.contains("windows") || banner.contains("microsoft") {
            Self::Windows
        } else {
            Self::Unix
        }
    }
}

/// Turns listing lines into [`RawEntry`] records.
///
/// Dates without a year are placed in the most recent year that does not
/// put them in the future relative to `today`.
#[derive(Debug, Clone, Copy)]
pub struct ListingParser {
    pub flavor: ServerFlavor,
    pub offset: FixedOffset,
    pub today: NaiveDate,
}

impl ListingParser {
    /// Parse one line listed inside `parent` (a logical path).
    ///
    /// Returns `None` for headers (`total 12`), `.`/`..` and lines in an
    /// unknown format.
    pub fn parse(&self, parent: &str, line: &str) -> Option<RawEntry> {
        let line = line.trim_end_matches(['\r', '\n']);
        let listed = match self.flavor {
            ServerFlavor::Unix => self.parse_unix(line).or_else(|| self.parse_dos(line)),
            ServerFlavor::Windows => self.parse_dos(line).or_else(|| self.parse_unix(line)),
        }?;

        if listed.name == "." || listed.name == ".." {
            return None;
        }

        Some(RawEntry {
            path: path::join(parent, &listed.name),
            name: listed.name,
            kind: listed.kind,
            size: listed.size,
            owner: listed.owner,
            group: listed.group,
            created: None,
            accessed: None,
            modified: listed.modified,
            mode: listed.mode,
            access: listed.access,
        })
    }

    /// `drwxr-xr-x 2 owner group 4096 Jan 20 10:00 name`
    ///
    /// Some servers leave out the group column; both layouts are accepted.
    fn parse_unix(&self, line: &str) -> Option<Listed> {
        let perm = line.split_whitespace().next()?;
        if perm.len() < 10 || !perm.is_ascii() {
            return None;
        }

        let kind = match perm.as_bytes()[0] {
            b'd' => Some(EntryKind::Directory),
            b'-' => Some(EntryKind::File),
            b'l' => Some(EntryKind::Link),
            b'b' | b'c' | b'p' | b's' => None,
            _ => return None,
        };

        let (owner, group, size, [month, day, time_or_year], name) =
            match split_fields(line, 8).filter(|(f, _)| is_size_then_month(f[4], f[5])) {
                Some((f, name)) => (f[2], Some(f[3]), f[4], [f[5], f[6], f[7]], name),
                None => {
                    let (f, name) = split_fields(line, 7)
                        .filter(|(f, _)| is_size_then_month(f[3], f[4]))?;
                    (f[2], None, f[3], [f[4], f[5], f[6]], name)
                }
            };

        let name = if kind == Some(EntryKind::Link) {
            name.split(" -> ").next().unwrap_or(name)
        } else {
            name
        };

        Some(Listed {
            name: name.to_string(),
            kind,
            size: size.parse().ok()?,
            owner: Some(owner.to_string()),
            group: group.map(str::to_string),
            modified: self.unix_date(month, day, time_or_year),
            mode: parse_permissions(&perm[..10]),
            access: Access::from_rwx(&perm[1..4]),
        })
    }

    /// `01-23-24  10:30AM  <DIR>  name` or `01-23-24  10:30AM  12345  name`
    fn parse_dos(&self, line: &str) -> Option<Listed> {
        let (fields, name) = split_fields(line, 3)?;
        let date = parse_dos_date(fields[0])?;
        let time = parse_dos_time(fields[1])?;

        let (kind, size) = if fields[2].eq_ignore_ascii_case("<DIR>") {
            (EntryKind::Directory, 0)
        } else {
            (EntryKind::File, fields[2].parse::<u64>().ok()?)
        };

        Some(Listed {
            name: name.to_string(),
            kind: Some(kind),
            size,
            owner: None,
            group: None,
            modified: self.to_utc(date.and_time(time)),
            mode: None,
            access: Access {
                readable: true,
                writeable: true,
                executable: false,
            },
        })
    }

    fn unix_date(&self, month: &str, day: &str, time_or_year: &str) -> Option<DateTime<Utc>> {
        let month = month_number(month)?;
        let day: u32 = day.parse().ok()?;

        let naive = if let Some((hour, minute)) = time_or_year.split_once(':') {
            let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;
            let mut date = NaiveDate::from_ymd_opt(self.today.year(), month, day)?;
            if date > self.today.succ_opt().unwrap_or(self.today) {
                date = NaiveDate::from_ymd_opt(self.today.year() - 1, month, day)?;
            }
            date.and_time(time)
        } else {
            let year: i32 = time_or_year.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)?.and_time(NaiveTime::MIN)
        };

        self.to_utc(naive)
    }

    fn to_utc(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// One parsed line before it is placed under a parent path.
struct Listed {
    name: String,
    kind: Option<EntryKind>,
    size: u64,
    owner: Option<String>,
    group: Option<String>,
    modified: Option<DateTime<Utc>>,
    mode: Option<u32>,
    access: Access,
}

/// Split `n` whitespace-separated fields off the front of `line`.
///
/// The remainder (the entry name, which may contain spaces) must be
/// non-empty.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    if rest.is_empty() {
        None
    } else {
        Some((fields, rest))
    }
}

fn is_size_then_month(size: &str, month: &str) -> bool {
    size.parse::<u64>().is_ok() && month_number(month).is_some()
}

fn month_number(month: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = month.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|idx| idx as u32 + 1)
}

fn parse_dos_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%m-%d-%y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m-%d-%Y"))
        .ok()
}

fn parse_dos_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%I:%M%p")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}
