//! Advisory RPM tag-number → name table, for human-readable output only.
//!
//! A linear `const` slice, matching the original `rpm_info.py`'s plain dict:
//! no perfect-hash table is warranted for a lookup this small and this rarely
//! hit (once per tag, on `rpm-info --headers`/`--names` output).

pub const NAME: u32 = 1000;
pub const VERSION: u32 = 1001;
pub const RELEASE: u32 = 1002;
pub const SUMMARY: u32 = 1004;
pub const DESCRIPTION: u32 = 1005;
pub const BUILDTIME: u32 = 1006;
pub const BUILDHOST: u32 = 1007;
pub const SIZE: u32 = 1009;
pub const LICENSE: u32 = 1014;
pub const GROUP: u32 = 1016;
pub const OS: u32 = 1021;
pub const ARCH: u32 = 1022;
pub const SOURCERPM: u32 = 1044;
pub const RPMVERSION: u32 = 1064;

pub const DIRINDEXES: u32 = 1116;
pub const BASENAMES: u32 = 1117;
pub const DIRNAMES: u32 = 1118;

pub const FILELANGS: u32 = 1097;
pub const FILEFLAGS: u32 = 1037;
pub const FILEDEVICES: u32 = 1095;
pub const FILEINODES: u32 = 1096;
pub const FILEVERIFYFLAGS: u32 = 1045;
pub const FILERDEVS: u32 = 1033;
pub const FILEMD5S: u32 = 1035;
pub const FILELINKTOS: u32 = 1036;

pub const PAYLOADFORMAT: u32 = 1124;
pub const PAYLOADCOMPRESSOR: u32 = 1125;
pub const PAYLOADFLAGS: u32 = 1126;

pub const SIGTAG_SIZE: u32 = 1000;
pub const SIGTAG_MD5: u32 = 1004;
pub const SIGTAG_PAYLOADSIZE: u32 = 1007;

/// `(tag, name)` pairs for the main-header tags this crate knows about.
/// Looked up by linear scan for `rpm-info --headers`/`--names` rendering.
pub const TAG_NAMES: &[(u32, &str)] = &[
    (NAME, "NAME"),
    (VERSION, "VERSION"),
    (RELEASE, "RELEASE"),
    (SUMMARY, "SUMMARY"),
    (DESCRIPTION, "DESCRIPTION"),
    (BUILDTIME, "BUILDTIME"),
    (BUILDHOST, "BUILDHOST"),
    (SIZE, "SIZE"),
    (LICENSE, "LICENSE"),
    (GROUP, "GROUP"),
    (OS, "OS"),
    (ARCH, "ARCH"),
    (SOURCERPM, "SOURCERPM"),
    (RPMVERSION, "RPMVERSION"),
    (DIRINDEXES, "DIRINDEXES"),
    (BASENAMES, "BASENAMES"),
    (DIRNAMES, "DIRNAMES"),
    (FILELANGS, "FILELANGS"),
    (FILEFLAGS, "FILEFLAGS"),
    (FILEDEVICES, "FILEDEVICES"),
    (FILEINODES, "FILEINODES"),
    (FILEVERIFYFLAGS, "FILEVERIFYFLAGS"),
    (FILERDEVS, "FILERDEVS"),
    (FILEMD5S, "FILEMD5S"),
    (FILELINKTOS, "FILELINKTOS"),
    (PAYLOADFORMAT, "PAYLOADFORMAT"),
    (PAYLOADCOMPRESSOR, "PAYLOADCOMPRESSOR"),
    (PAYLOADFLAGS, "PAYLOADFLAGS"),
];

pub fn name_for(tag: u32) -> &'static str {
    TAG_NAMES
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, n)| *n)
        .unwrap_or("UNKNOWN")
}
