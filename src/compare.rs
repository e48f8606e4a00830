//! Streaming comparison engine: diffs an `expected` tree against a `got`
//! stream, applies path filters and size-change thresholds, yields a verdict.
//!
//! Grounded directly on the original `compare_test.py`'s exact scenario
//! values (the default flags dict, the five scenario cases); this module's
//! tests are close transliterations of that file's assertions.
use std::collections::HashMap;

use regex::Regex;

use crate::error::{Error, Result};
use crate::fileinfo::FileInfo;
use crate::tree_reader::TreeReader;

#[derive(Debug, Clone)]
pub struct CompareFlags {
    pub max_allowed_absolute_increase: u64,
    pub max_allowed_percent_increase: f64,
    pub show_decreases: bool,
    pub minimum_compare_size: u64,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub compare_uid_gid: bool,
}

impl Default for CompareFlags {
    fn default() -> CompareFlags {
        CompareFlags {
            max_allowed_absolute_increase: 0,
            max_allowed_percent_increase: 100.0,
            show_decreases: true,
            minimum_compare_size: 0,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            compare_uid_gid: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeChange {
    pub path: String,
    pub old_size: u64,
    pub new_size: u64,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct CompareResult {
    pub only_in_expected: Vec<FileInfo>,
    pub only_in_got: Vec<FileInfo>,
    pub symlink_target_changed: Vec<(String, String, String)>,
    pub metadata_changed: Vec<(String, FileInfo, FileInfo)>,
    pub size_changed: Vec<SizeChange>,
}

impl CompareResult {
    /// Non-zero-exit verdict per §7: any failed size change, any non-empty
    /// diff list, or a reader error (surfaced separately via `Result`).
    pub fn has_differences(&self) -> bool {
        !self.only_in_expected.is_empty()
            || !self.only_in_got.is_empty()
            || !self.symlink_target_changed.is_empty()
            || !self.metadata_changed.is_empty()
            || self.size_changed.iter().any(|s| !s.passed)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| Error::InvalidArgument(format!("bad pattern {:?}: {}", p, e))))
        .collect()
}

fn should_include_path(path: &str, includes: &[Regex], excludes: &[Regex]) -> bool {
    let included = includes.is_empty() || includes.iter().any(|r| r.is_match(path));
    let excluded = excludes.iter().any(|r| r.is_match(path));
    included && !excluded
}

/// Pass/fail verdict plus message for one size transition, per the §4.16
/// threshold algorithm.
pub fn check_size_threshold(old: u64, new: u64, flags: &CompareFlags) -> (bool, String) {
    if old < flags.minimum_compare_size && new < flags.minimum_compare_size {
        return (true, String::new());
    }

    let delta = new as i64 - old as i64;
    if delta < 0 && !flags.show_decreases {
        return (true, String::new());
    }

    if flags.max_allowed_absolute_increase > 0 && delta > flags.max_allowed_absolute_increase as i64 {
        return (false, format!("{} bytes", delta));
    }

    let pct = if old == 0 {
        if delta > 0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        100.0 * delta as f64 / old as f64
    };

    if pct > flags.max_allowed_percent_increase {
        return (false, format!("{:.2}%", pct));
    }

    (true, String::new())
}

/// Streams `got` against the materialized `expected` map, classifying every
/// entry per §4.16's algorithm.
pub fn stream_compare(
    expected: Vec<FileInfo>,
    got: &mut dyn TreeReader,
    flags: &CompareFlags,
) -> Result<CompareResult> {
    let includes = compile_patterns(&flags.include_patterns)?;
    let excludes = compile_patterns(&flags.exclude_patterns)?;

    let mut expected_map: HashMap<String, FileInfo> = expected
        .into_iter()
        .filter(|e| should_include_path(&e.path, &includes, &excludes))
        .map(|e| (e.path.clone(), e))
        .collect();

    let mut result = CompareResult::default();

    while let Some(entry) = got.next()? {
        if !should_include_path(&entry.path, &includes, &excludes) {
            continue;
        }

        match expected_map.remove(&entry.path) {
            None => {
                result.only_in_got.push(entry);
            }
            Some(old) => {
                classify_pair(old, entry, flags, &mut result);
            }
        }
    }

    let mut remaining: Vec<FileInfo> = expected_map.into_values().collect();
    remaining.sort_by(|a, b| a.path.cmp(&b.path));
    result.only_in_expected = remaining;

    Ok(result)
}

fn classify_pair(old: FileInfo, new: FileInfo, flags: &CompareFlags, result: &mut CompareResult) {
    if old.is_symlink && new.is_symlink {
        if old.symlink_target != new.symlink_target {
            result.symlink_target_changed.push((
                new.path.clone(),
                old.symlink_target.clone().unwrap_or_default(),
                new.symlink_target.clone().unwrap_or_default(),
            ));
        }
        return;
    }

    if old.is_symlink != new.is_symlink {
        result.metadata_changed.push((new.path.clone(), old, new));
        return;
    }

    let metadata_differs = old.mode != new.mode
        || (flags.compare_uid_gid && (old.uid != new.uid || old.gid != new.gid));

    if metadata_differs {
        result.metadata_changed.push((new.path.clone(), old.clone(), new.clone()));
    }

    if !old.is_dir && !new.is_dir && old.size != new.size {
        let (passed, message) = check_size_threshold(old.size, new.size, flags);
        result.size_changed.push(SizeChange {
            path: new.path.clone(),
            old_size: old.size,
            new_size: new.size,
            passed,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_reader::TreeReader;
    use std::collections::VecDeque;

    struct VecReader {
        items: VecDeque<FileInfo>,
    }

    impl TreeReader for VecReader {
        fn next(&mut self) -> Result<Option<FileInfo>> {
            Ok(self.items.pop_front())
        }
        fn is_done(&self) -> bool {
            self.items.is_empty()
        }
    }

    fn reference_tree() -> Vec<FileInfo> {
        vec![
            FileInfo::new_file("hello.txt", 100, 0o644, 0, 0),
            FileInfo::new_dir("subdir", 0o755, 0, 0),
            FileInfo::new_file("subdir/nested.txt", 50, 0o644, 0, 0),
            FileInfo::new_symlink("link_to_hello", "hello.txt", 0o777, 0, 0),
        ]
    }

    fn reader_of(entries: Vec<FileInfo>) -> VecReader {
        VecReader { items: entries.into() }
    }

    #[test]
    fn identical_trees_yield_empty_lists() {
        let expected = reference_tree();
        let mut got = reader_of(reference_tree());
        let result = stream_compare(expected, &mut got, &CompareFlags::default()).unwrap();
        assert!(!result.has_differences());
    }

    #[test]
    fn missing_files_are_reported() {
        let expected = reference_tree();
        let modified = vec![
            FileInfo::new_file("hello.txt", 100, 0o644, 0, 0),
            FileInfo::new_symlink("link_to_hello", "hello.txt", 0o777, 0, 0),
        ];
        let mut got = reader_of(modified);
        let result = stream_compare(expected, &mut got, &CompareFlags::default()).unwrap();
        let missing: Vec<&str> = result.only_in_expected.iter().map(|f| f.path.as_str()).collect();
        assert!(missing.contains(&"subdir"));
        assert!(missing.contains(&"subdir/nested.txt"));
        assert_eq!(result.only_in_got.len(), 0);
    }

    #[test]
    fn symlink_retarget_is_reported() {
        let expected = reference_tree();
        let mut modified = reference_tree();
        let link = modified.iter_mut().find(|f| f.path == "link_to_hello").unwrap();
        link.symlink_target = Some("subdir/nested.txt".to_string());

        let mut got = reader_of(modified);
        let result = stream_compare(expected, &mut got, &CompareFlags::default()).unwrap();
        assert_eq!(
            result.symlink_target_changed,
            vec![(
                "link_to_hello".to_string(),
                "hello.txt".to_string(),
                "subdir/nested.txt".to_string()
            )]
        );
        assert!(result.metadata_changed.is_empty());
    }

    #[test]
    fn uid_gid_toggle_respects_flag() {
        let expected = reference_tree();
        let mut modified = reference_tree();
        let f = modified.iter_mut().find(|f| f.path == "hello.txt").unwrap();
        f.uid = 5;

        let mut flags = CompareFlags::default();
        let mut got = reader_of(modified.clone());
        let result = stream_compare(expected.clone(), &mut got, &flags).unwrap();
        assert_eq!(result.metadata_changed.len(), 1);
        assert_eq!(result.metadata_changed[0].0, "hello.txt");

        flags.compare_uid_gid = false;
        let mut got2 = reader_of(modified);
        let result2 = stream_compare(expected, &mut got2, &flags).unwrap();
        assert!(result2.metadata_changed.is_empty());
    }

    #[test]
    fn size_threshold_scenarios() {
        let f1 = CompareFlags {
            max_allowed_absolute_increase: 100,
            max_allowed_percent_increase: 100.0,
            ..CompareFlags::default()
        };
        assert_eq!(check_size_threshold(1000, 1050, &f1).0, true);

        let f2 = CompareFlags {
            max_allowed_absolute_increase: 100,
            ..CompareFlags::default()
        };
        let (passed, msg) = check_size_threshold(1000, 1200, &f2);
        assert!(!passed);
        assert!(msg.contains("200 bytes"));

        let f3 = CompareFlags {
            max_allowed_percent_increase: 10.0,
            ..CompareFlags::default()
        };
        let (passed, msg) = check_size_threshold(1000, 1200, &f3);
        assert!(!passed);
        assert!(msg.contains("20.00%"));

        let f4 = CompareFlags {
            max_allowed_percent_increase: 10.0,
            minimum_compare_size: 500,
            ..CompareFlags::default()
        };
        assert_eq!(check_size_threshold(100, 200, &f4).0, true);

        let f5 = CompareFlags {
            max_allowed_percent_increase: 10.0,
            show_decreases: false,
            ..CompareFlags::default()
        };
        assert_eq!(check_size_threshold(1000, 100, &f5).0, true);
    }

    #[test]
    fn filters_restrict_both_sides() {
        let expected = reference_tree();
        let mut modified = reference_tree();
        modified.push(FileInfo::new_file("extra/hello.txt", 10, 0o644, 0, 0));

        let include_flags = CompareFlags {
            include_patterns: vec!["hello".to_string()],
            ..CompareFlags::default()
        };
        let mut got = reader_of(modified.clone());
        let result = stream_compare(expected.clone(), &mut got, &include_flags).unwrap();
        assert!(result
            .only_in_got
            .iter()
            .any(|f| f.path == "extra/hello.txt"));
        assert!(!result.only_in_expected.iter().any(|f| f.path == "subdir"));

        let exclude_flags = CompareFlags {
            exclude_patterns: vec!["extra".to_string()],
            ..CompareFlags::default()
        };
        let mut got2 = reader_of(modified);
        let result2 = stream_compare(expected, &mut got2, &exclude_flags).unwrap();
        assert!(!result2
            .only_in_got
            .iter()
            .any(|f| f.path == "extra/hello.txt"));
    }
}
