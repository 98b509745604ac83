//! `LIST` output parsing.
//!
//! Two formats are recognised:
//! 1. Unix `ls -l`: `-rw-r--r--   1 owner group  1234 Jan  1 12:00 file.txt`
//! 2. DOS/IIS: `01-01-26  12:00AM       1234 file.txt`
//!
//! Lines matching neither become an entry of unknown type named after the whole line.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref UNIX_RE: Regex = Regex::new(
        r"(?x)
        ^([bcdlps-][rwxsStT-]{9})[+@.]?\s+  # permissions
        (\d+)\s+                            # link count
        (\S+)\s+                            # owner
        (?:(\S+)\s+)?                       # group, omitted by some servers
        (\d+)\s+                            # size
        (\w{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4}))\s  # date
        (.+)$                               # name
        "
    )
    .unwrap();

    static ref DOS_RE: Regex = Regex::new(
        r"(?x)
        ^(\d{2}-\d{2}-\d{2,4})\s+           # date
        (\d{1,2}:\d{2}(?:AM|PM)?)\s+        # time
        (<DIR>|\d+)\s+                      # size or <DIR>
        (.+)$                               # name
        "
    )
    .unwrap();
}

/// Type of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    File,
    Directory,
    SymbolicLink,
    Unknown,
}

/// One entry of a directory listing, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    /// Date exactly as the server printed it.
    pub raw_modified_at: String,
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Target of a symbolic link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl DirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Parse the lines of a `LIST` reply. `.` and `..` are dropped; order is kept.
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<DirectoryEntry> {
    lines
        .iter()
        .map(|l| l.as_ref().trim_end())
        .filter(|l| !l.trim().is_empty() && !l.starts_with("total "))
        .map(parse_line)
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

/// Parse a single listing line.
pub fn parse_line(line: &str) -> DirectoryEntry {
    parse_unix(line)
        .or_else(|| parse_dos(line))
        .unwrap_or_else(|| DirectoryEntry {
            name: line.to_owned(),
            kind: EntryKind::Unknown,
            size: 0,
            raw_modified_at: String::new(),
            modified_at: None,
            permissions: None,
            user: None,
            group: None,
            link: None,
        })
}

fn parse_unix(line: &str) -> Option<DirectoryEntry> {
    let caps = UNIX_RE.captures(line)?;
    let perms = &caps[1];
    let kind = match perms.as_bytes()[0] {
        b'd' => EntryKind::Directory,
        b'l' => EntryKind::SymbolicLink,
        b'-' => EntryKind::File,
        _ => EntryKind::Unknown,
    };
    let raw_date = caps[6].to_owned();
    let (name, link) = match (kind, caps[7].find(" -> ")) {
        (EntryKind::SymbolicLink, Some(pos)) => (
            caps[7][..pos].to_owned(),
            Some(caps[7][pos + 4..].to_owned()),
        ),
        _ => (caps[7].to_owned(), None),
    };

    Some(DirectoryEntry {
        name,
        kind,
        size: caps[5].parse().unwrap_or(0),
        modified_at: parse_unix_date(&raw_date, Utc::now()),
        raw_modified_at: raw_date,
        permissions: Some(perms[1..].to_owned()),
        user: Some(caps[3].to_owned()),
        group: caps.get(4).map(|m| m.as_str().to_owned()),
        link,
    })
}

/// "Jan  1 12:00" (within the last six months) or "Jan  1  2025".
fn parse_unix_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.contains(':') {
        let this_year = NaiveDateTime::parse_from_str(
            &format!("{} {}", now.year(), normalized),
            "%Y %b %d %H:%M",
        )
        .ok()?;
        let date = Utc.from_utc_datetime(&this_year);
        // A time instead of a year means "recent"; a date ahead of now belongs to last year.
        if date > now {
            let last_year = NaiveDateTime::parse_from_str(
                &format!("{} {}", now.year() - 1, normalized),
                "%Y %b %d %H:%M",
            )
            .ok()?;
            return Some(Utc.from_utc_datetime(&last_year));
        }
        return Some(date);
    }

    NaiveDate::parse_from_str(&normalized, "%b %d %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn parse_dos(line: &str) -> Option<DirectoryEntry> {
    let caps = DOS_RE.captures(line)?;
    let raw_date = format!("{} {}", &caps[1], &caps[2]);
    let (kind, size) = if &caps[3] == "<DIR>" {
        (EntryKind::Directory, 0)
    } else {
        (EntryKind::File, caps[3].parse().unwrap_or(0))
    };

    Some(DirectoryEntry {
        name: caps[4].to_owned(),
        kind,
        size,
        modified_at: parse_dos_date(&raw_date),
        raw_modified_at: raw_date,
        permissions: None,
        user: None,
        group: None,
        link: None,
    })
}

fn parse_dos_date(raw: &str) -> Option<DateTime<Utc>> {
    ["%m-%d-%y %I:%M%p", "%m-%d-%y %H:%M", "%m-%d-%Y %I:%M%p", "%m-%d-%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_file() {
        let entries = parse_listing(&["-rw-r--r--   1 user group  1234 Jan  1  2025 readme.txt"]);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.name, "readme.txt");
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.size, 1234);
        assert_eq!(e.raw_modified_at, "Jan  1  2025");
        assert_eq!(e.permissions.as_deref(), Some("rw-r--r--"));
        assert_eq!(e.user.as_deref(), Some("user"));
        assert_eq!(
            e.modified_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn unix_without_group_column() {
        let entries = parse_listing(&[
            "-rw-r--r-- 1 ftp 1234 Jan 1 2025 x",
            "drwxr-xr-x 2 ftp 4096 Mar  1 09:30 sub",
            "-rw-r--r-- 1 ftp 1000 77 Jan 1 2025 numeric-group",
        ]);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].name, "x");
        assert_eq!(entries[0].size, 1234);
        assert_eq!(entries[0].user.as_deref(), Some("ftp"));
        assert_eq!(entries[0].group, None);
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[2].group.as_deref(), Some("1000"));
        assert_eq!(entries[2].size, 77);
    }

    #[test]
    fn unix_directory_and_symlink() {
        let entries = parse_listing(&[
            "total 8",
            "drwxr-xr-x   2 root root  4096 Mar  1 09:30 sub dir",
            "lrwxrwxrwx   1 root root    22 Jan  5 08:00 link -> /var/target",
        ]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "sub dir");
        assert!(entries[0].is_directory());
        assert_eq!(entries[1].kind, EntryKind::SymbolicLink);
        assert_eq!(entries[1].name, "link");
        assert_eq!(entries[1].link.as_deref(), Some("/var/target"));
    }

    #[test]
    fn recent_dates_resolve_to_the_past() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        assert_eq!(
            parse_unix_date("Jan  5 08:00", now),
            Some(Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap())
        );
        assert_eq!(
            parse_unix_date("Dec 24 18:30", now),
            Some(Utc.with_ymd_and_hms(2025, 12, 24, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn dos_entries() {
        let entries = parse_listing(&[
            "01-01-26  12:00AM      <DIR> My Documents",
            "02-15-26  03:04PM        42 notes.txt",
        ]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[0].name, "My Documents");
        assert_eq!(entries[1].size, 42);
        assert_eq!(
            entries[1].modified_at,
            Some(Utc.with_ymd_and_hms(2026, 2, 15, 15, 4, 0).unwrap())
        );
    }

    #[test]
    fn dots_dropped_order_kept() {
        let entries = parse_listing(&[
            "drwxr-xr-x 2 u g 0 Jan 1 2025 .",
            "drwxr-xr-x 2 u g 0 Jan 1 2025 ..",
            "-rw-r--r-- 1 u g 1 Jan 1 2025 b",
            "-rw-r--r-- 1 u g 1 Jan 1 2025 a",
        ]);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn unknown_format_keeps_the_line() {
        let entry = parse_line("something odd");
        assert_eq!(entry.kind, EntryKind::Unknown);
        assert_eq!(entry.name, "something odd");
    }

    #[test]
    fn serializes_type_field() {
        let entry = parse_line("-rw-r--r-- 1 u g 5 Jan 1 2025 f");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["rawModifiedAt"], "Jan 1 2025");
        assert!(json.get("link").is_none());
    }
}
