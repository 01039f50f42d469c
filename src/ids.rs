//! User and group id resolution with a process-wide cache.
//!
//! Long output and the `user=`/`group=` operands translate between names
//! and numeric ids. Lookups go through the reentrant `getpwuid_r` family
//! and results (including misses) are cached behind an `RwLock`, so
//! concurrent walker threads resolve owners without repeated NSS calls.
//! Model the manager as a handle passed into collaborators rather than a
//! true global so tests stay isolated.

#![allow(unsafe_code)]

use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::Arc;

/// Cached uid/gid name resolution.
#[derive(Debug, Default)]
pub struct IdManager {
    users: RwLock<HashMap<u32, Option<String>>>,
    groups: RwLock<HashMap<u32, Option<String>>>,
}

impl IdManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolve a uid to a user name, caching the answer.
    pub fn user_name(&self, uid: u32) -> Option<String> {
        if let Some(cached) = self.users.read().get(&uid) {
            return cached.clone();
        }
        let name = lookup_user_name(uid);
        self.users.write().insert(uid, name.clone());
        name
    }

    /// Resolve a gid to a group name, caching the answer.
    pub fn group_name(&self, gid: u32) -> Option<String> {
        if let Some(cached) = self.groups.read().get(&gid) {
            return cached.clone();
        }
        let name = lookup_group_name(gid);
        self.groups.write().insert(gid, name.clone());
        name
    }

    /// Resolve `value` to a uid: numeric values pass through, otherwise
    /// the user database is consulted.
    pub fn user_id(&self, value: &str) -> Option<u32> {
        if let Ok(uid) = value.parse::<u32>() {
            return Some(uid);
        }
        lookup_user_by_name(value)
    }

    /// Resolve `value` to a gid: numeric values pass through, otherwise
    /// the group database is consulted.
    pub fn group_id(&self, value: &str) -> Option<u32> {
        if let Ok(gid) = value.parse::<u32>() {
            return Some(gid);
        }
        lookup_group_by_name(value)
    }
}

fn lookup_user_name(uid: u32) -> Option<String> {
    let mut buffer = vec![0_u8; 1024];
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::zeroed();
        let mut result: *mut libc::passwd = ptr::null_mut();
        // SAFETY: all pointers are valid for the duration of the call;
        // `buffer` provides the scratch space `pw_name` is backed by.
        let errno = unsafe {
            libc::getpwuid_r(
                uid as libc::uid_t,
                pwd.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut libc::c_char,
                buffer.len(),
                &mut result,
            )
        };
        if errno == 0 {
            if result.is_null() {
                return None;
            }
            // SAFETY: non-null `result` means `pwd` was initialized and
            // `pw_name` points at a NUL-terminated string inside `buffer`.
            let pwd = unsafe { pwd.assume_init() };
            let name = unsafe { CStr::from_ptr(pwd.pw_name) };
            return Some(name.to_string_lossy().into_owned());
        }
        if errno == libc::ERANGE {
            buffer.resize(buffer.len().saturating_mul(2), 0);
            continue;
        }
        return None;
    }
}

fn lookup_group_name(gid: u32) -> Option<String> {
    let mut buffer = vec![0_u8; 1024];
    loop {
        let mut grp = MaybeUninit::<libc::group>::zeroed();
        let mut result: *mut libc::group = ptr::null_mut();
        // SAFETY: see lookup_user_name; same contract for getgrgid_r.
        let errno = unsafe {
            libc::getgrgid_r(
                gid as libc::gid_t,
                grp.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut libc::c_char,
                buffer.len(),
                &mut result,
            )
        };
        if errno == 0 {
            if result.is_null() {
                return None;
            }
            // SAFETY: non-null `result` means `grp` was initialized.
            let grp = unsafe { grp.assume_init() };
            let name = unsafe { CStr::from_ptr(grp.gr_name) };
            return Some(name.to_string_lossy().into_owned());
        }
        if errno == libc::ERANGE {
            buffer.resize(buffer.len().saturating_mul(2), 0);
            continue;
        }
        return None;
    }
}

fn lookup_user_by_name(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut buffer = vec![0_u8; 1024];
    loop {
        let mut pwd = MaybeUninit::<libc::passwd>::zeroed();
        let mut result: *mut libc::passwd = ptr::null_mut();
        // SAFETY: `c_name` is a valid NUL-terminated string; remaining
        // pointers as in lookup_user_name.
        let errno = unsafe {
            libc::getpwnam_r(
                c_name.as_ptr(),
                pwd.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut libc::c_char,
                buffer.len(),
                &mut result,
            )
        };
        if errno == 0 {
            if result.is_null() {
                return None;
            }
            // SAFETY: non-null `result` means `pwd` was initialized.
            let pwd = unsafe { pwd.assume_init() };
            return Some(pwd.pw_uid as u32);
        }
        if errno == libc::ERANGE {
            buffer.resize(buffer.len().saturating_mul(2), 0);
            continue;
        }
        return None;
    }
}

fn lookup_group_by_name(name: &str) -> Option<u32> {
    let c_name = CString::new(name).ok()?;
    let mut buffer = vec![0_u8; 1024];
    loop {
        let mut grp = MaybeUninit::<libc::group>::zeroed();
        let mut result: *mut libc::group = ptr::null_mut();
        // SAFETY: as lookup_user_by_name, for getgrnam_r.
        let errno = unsafe {
            libc::getgrnam_r(
                c_name.as_ptr(),
                grp.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut libc::c_char,
                buffer.len(),
                &mut result,
            )
        };
        if errno == 0 {
            if result.is_null() {
                return None;
            }
            // SAFETY: non-null `result` means `grp` was initialized.
            let grp = unsafe { grp.assume_init() };
            return Some(grp.gr_gid as u32);
        }
        if errno == libc::ERANGE {
            buffer.resize(buffer.len().saturating_mul(2), 0);
            continue;
        }
        return None;
    }
}
