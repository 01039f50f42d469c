//! Descent policies: path exclusion and same-device confinement.

use crate::cancel::CancelToken;
use crate::error::{ConfigError, Result};
use crate::fs::{FileInfo, FileSystem};
use regex::Regex;

/// A set of regular expressions matched against directory paths.
/// Matching directories are not descended into; matching is against the
/// full path, not the leaf name.
#[derive(Debug, Default)]
pub struct Exclusions {
    regexps: Vec<Regex>,
}

impl Exclusions {
    /// Compile the patterns; any invalid pattern is fatal.
    pub fn new(patterns: &[String]) -> std::result::Result<Self, ConfigError> {
        let mut regexps = Vec::with_capacity(patterns.len());
        for p in patterns {
            let re = Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })?;
            regexps.push(re);
        }
        Ok(Self { regexps })
    }

    /// True iff any pattern matches; short-circuits on the first hit.
    pub fn is_match(&self, path: &str) -> bool {
        self.regexps.iter().any(|re| re.is_match(path))
    }
}

/// Confines a walk to the device of its start path.
///
/// A zero start device (backends that do not report devices) degrades to
/// permissive.
#[derive(Debug, Clone, Copy)]
pub struct SameDevice {
    device: u64,
}

impl SameDevice {
    /// Record the device of `path`. Stat or xattr failures here are fatal
    /// since the start path must be reachable anyway.
    pub fn new(ctx: &CancelToken, fs: &dyn FileSystem, path: &str) -> Result<Self> {
        let info = fs.stat(ctx, path)?;
        let attrs = fs.xattr(ctx, path, &info)?;
        Ok(Self {
            device: attrs.device,
        })
    }

    /// Whether `path` lives on the recorded device. Errors propagate so
    /// the walker can report them through its visitor.
    pub fn matches(
        &self,
        ctx: &CancelToken,
        fs: &dyn FileSystem,
        path: &str,
        info: &FileInfo,
    ) -> Result<bool> {
        if self.device == 0 {
            return Ok(true);
        }
        let attrs = fs.xattr(ctx, path, info)?;
        Ok(self.device == attrs.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    #[test]
    fn test_exclusions_match_full_path() {
        let ex = Exclusions::new(&[r"\.snapshot".to_string(), r"^/proc".to_string()]).unwrap();
        assert!(ex.is_match("/data/.snapshot/hourly.0"));
        assert!(ex.is_match("/proc/42"));
        assert!(!ex.is_match("/data/file.txt"));
        assert!(!Exclusions::default().is_match("/anything"));
    }

    #[test]
    fn test_invalid_pattern_is_fatal() {
        let err = Exclusions::new(&["(".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
    }

    #[test]
    fn test_same_device_comparison() {
        let fs = MemFs::builder("r")
            .device(30)
            .populate(|d| {
                d.dir("same", |_| {});
                d.dir("other", |_| {}).device(40);
            })
            .build();
        let ctx = CancelToken::new();
        let sd = SameDevice::new(&ctx, &fs, "r").unwrap();

        let same = fs.lstat(&ctx, "r/same").unwrap();
        assert!(sd.matches(&ctx, &fs, "r/same", &same).unwrap());

        let other = fs.lstat(&ctx, "r/other").unwrap();
        assert!(!sd.matches(&ctx, &fs, "r/other", &other).unwrap());
    }

    #[test]
    fn test_zero_device_is_permissive() {
        let fs = MemFs::builder("r")
            .device(0)
            .populate(|d| {
                d.dir("sub", |_| {}).device(40);
            })
            .build();
        let ctx = CancelToken::new();
        let sd = SameDevice::new(&ctx, &fs, "r").unwrap();
        let sub = fs.lstat(&ctx, "r/sub").unwrap();
        assert!(sd.matches(&ctx, &fs, "r/sub", &sub).unwrap());
    }

    #[test]
    fn test_xattr_error_propagates() {
        let fs = MemFs::builder("r")
            .device(30)
            .populate(|d| {
                d.dir("bad", |_| {}).xattr_error();
            })
            .build();
        let ctx = CancelToken::new();
        let sd = SameDevice::new(&ctx, &fs, "r").unwrap();
        let bad = fs.lstat(&ctx, "r/bad").unwrap();
        assert!(sd.matches(&ctx, &fs, "r/bad", &bad).is_err());
    }
}
