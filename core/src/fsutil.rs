//! Atomic file replacement with mode, ownership and a single backup.
//!
//! Content is written to a hidden sibling file, fsynced and renamed over the
//! destination, so a concurrent reader sees either the old or the new file.

use std::ffi::CString;
use std::fs;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::types::outcome::ResourceStatus;

/// Owner and group to apply by name. `None` leaves that side as created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ownership {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl Ownership {
    pub fn new(user: &str, group: &str) -> Self {
        Ownership {
            user: Some(user.to_string()),
            group: Some(group.to_string()),
        }
    }

    pub fn unchanged() -> Self {
        Ownership::default()
    }

    fn is_empty(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub mode: u32,
    pub ownership: Ownership,
    /// Keep the previous content as `<path>.bak` when it changes.
    pub backup: bool,
}

impl WriteOptions {
    pub fn mode(mode: u32) -> Self {
        WriteOptions {
            mode,
            ownership: Ownership::unchanged(),
            backup: false,
        }
    }

    pub fn owned_by(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn with_backup(mut self) -> Self {
        self.backup = true;
        self
    }
}

/// Replace `path` with `content` unless it already holds exactly that
/// content with the requested mode and owner.
pub fn write_atomic(path: &Path, content: &[u8], options: &WriteOptions) -> io::Result<ResourceStatus> {
    let ids = resolve_ownership(&options.ownership)?;

    if let Ok(meta) = fs::metadata(path) {
        let same_mode = meta.permissions().mode() & 0o7777 == options.mode;
        let same_owner = ids.uid.map_or(true, |u| u == meta.uid())
            && ids.gid.map_or(true, |g| g == meta.gid());
        if same_mode && same_owner && fs::read(path)? == content {
            return Ok(ResourceStatus::Unchanged);
        }
        if options.backup {
            write_backup(path)?;
        }
    }

    let tmp = temp_sibling(path);
    let result = write_temp(&tmp, content, options.mode, &ids)
        .and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(ResourceStatus::Changed)
}

/// Create `path` (and parents) if missing and bring its mode and owner in
/// line.
pub fn ensure_directory(path: &Path, mode: Option<u32>, ownership: &Ownership) -> io::Result<ResourceStatus> {
    let mut status = ResourceStatus::Unchanged;
    if !path.is_dir() {
        fs::create_dir_all(path)?;
        status = ResourceStatus::Changed;
    }
    let meta = fs::metadata(path)?;
    if let Some(mode) = mode {
        if meta.permissions().mode() & 0o7777 != mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            status = ResourceStatus::Changed;
        }
    }
    let ids = resolve_ownership(ownership)?;
    let uid_differs = ids.uid.map_or(false, |u| u != meta.uid());
    let gid_differs = ids.gid.map_or(false, |g| g != meta.gid());
    if uid_differs || gid_differs {
        chown(path, &ids)?;
        status = ResourceStatus::Changed;
    }
    Ok(status)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

fn write_backup(path: &Path) -> io::Result<()> {
    let bak = backup_path(path);
    // The old backup may be read-only; replace rather than overwrite it.
    match fs::remove_file(&bak) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::copy(path, &bak)?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}

fn write_temp(tmp: &Path, content: &[u8], mode: u32, ids: &Ids) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)?;
    file.write_all(content)?;
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    chown(tmp, ids)?;
    file.sync_all()
}

#[derive(Debug, Clone, Copy, Default)]
struct Ids {
    uid: Option<u32>,
    gid: Option<u32>,
}

fn resolve_ownership(ownership: &Ownership) -> io::Result<Ids> {
    if ownership.is_empty() {
        return Ok(Ids::default());
    }
    let uid = ownership.user.as_deref().map(lookup_uid).transpose()?;
    let gid = ownership.group.as_deref().map(lookup_gid).transpose()?;
    Ok(Ids { uid, gid })
}

fn lookup_uid(name: &str) -> io::Result<u32> {
    let cname = to_cstring(name)?;
    let pw = unsafe { libc::getpwnam(cname.as_ptr()) };
    if pw.is_null() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("unknown user '{}'", name),
        ));
    }
    Ok(unsafe { (*pw).pw_uid })
}

fn lookup_gid(name: &str) -> io::Result<u32> {
    let cname = to_cstring(name)?;
    let gr = unsafe { libc::getgrnam(cname.as_ptr()) };
    if gr.is_null() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("unknown group '{}'", name),
        ));
    }
    Ok(unsafe { (*gr).gr_gid })
}

fn chown(path: &Path, ids: &Ids) -> io::Result<()> {
    if ids.uid.is_none() && ids.gid.is_none() {
        return Ok(());
    }
    let cpath = to_cstring(path.as_os_str().as_bytes())?;
    // u32::MAX is (uid_t)-1: leave that id untouched.
    let uid = ids.uid.unwrap_or(u32::MAX) as libc::uid_t;
    let gid = ids.gid.unwrap_or(u32::MAX) as libc::gid_t;
    if unsafe { libc::chown(cpath.as_ptr(), uid, gid) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn to_cstring<T: Into<Vec<u8>>>(bytes: T) -> io::Result<CString> {
    CString::new(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

    fn test_dir() -> PathBuf {
        let seq = TEST_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("snfs{}-{}", std::process::id(), seq));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn mode_of(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn writes_new_file_with_mode() {
        let dir = test_dir();
        let path = dir.join("elasticsearch.yml");
        let status = write_atomic(&path, b"a: 1\n", &WriteOptions::mode(0o640)).unwrap();
        assert_eq!(status, ResourceStatus::Changed);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
        assert_eq!(mode_of(&path), 0o640);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn identical_content_is_unchanged() {
        let dir = test_dir();
        let path = dir.join("f");
        let opts = WriteOptions::mode(0o644);
        write_atomic(&path, b"same", &opts).unwrap();
        assert_eq!(write_atomic(&path, b"same", &opts).unwrap(), ResourceStatus::Unchanged);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn mode_drift_is_corrected() {
        let dir = test_dir();
        let path = dir.join("f");
        write_atomic(&path, b"same", &WriteOptions::mode(0o644)).unwrap();
        let status = write_atomic(&path, b"same", &WriteOptions::mode(0o600)).unwrap();
        assert_eq!(status, ResourceStatus::Changed);
        assert_eq!(mode_of(&path), 0o600);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn keeps_exactly_one_backup() {
        let dir = test_dir();
        let path = dir.join("inputs.conf");
        let opts = WriteOptions::mode(0o550).with_backup();
        write_atomic(&path, b"one", &opts).unwrap();
        assert!(!backup_path(&path).exists());
        write_atomic(&path, b"two", &opts).unwrap();
        write_atomic(&path, b"three", &opts).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "three");
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "two");
        let names: Vec<_> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 2, "no temp files left behind: {:?}", names);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_parent_fails_without_leftovers() {
        let dir = test_dir();
        let path = dir.join("missing").join("f");
        assert!(write_atomic(&path, b"x", &WriteOptions::mode(0o644)).is_err());
        assert!(!path.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_owner_is_an_error() {
        let dir = test_dir();
        let path = dir.join("f");
        let opts = WriteOptions::mode(0o644)
            .owned_by(Ownership::new("no-such-user-searchnode", "no-such-group-searchnode"));
        let err = write_atomic(&path, b"x", &opts).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!path.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let dir = test_dir();
        let target = dir.join("srv").join("data");
        let none = Ownership::unchanged();
        assert_eq!(ensure_directory(&target, Some(0o770), &none).unwrap(), ResourceStatus::Changed);
        assert_eq!(mode_of(&target), 0o770);
        assert_eq!(ensure_directory(&target, Some(0o770), &none).unwrap(), ResourceStatus::Unchanged);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/etc/telegraf/inputs.conf")),
            PathBuf::from("/etc/telegraf/inputs.conf.bak")
        );
    }
}
