//! Format-aware archive extraction.
//!
//! The extractor consumes a byte stream plus the archive's declared filename
//! and unpacks the file tree under a destination root. The filename suffix is
//! the only format signal: `.gz`/`.tgz` streams are gzip-decompressed and fed
//! to the tar demuxer, `.zip` archives are spooled to a temporary file first
//! (zip needs random access to its central directory), and anything else is
//! treated as a bare tar stream.
//!
//! Extraction is not transactional: the first error aborts with the partial
//! tree left in place. Idempotence across runs comes from the pipeline's
//! clean-before-build step, not from rollback here.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::read::GzDecoder;
use thiserror::Error;
use zip::ZipArchive;

/// Decompression, unpacking, or filesystem failure during extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Filesystem or stream I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The archive container itself is malformed.
    #[error("archive error: {0}")]
    Archive(String),

    /// An entry path would escape the destination root.
    #[error("unsafe path in archive: {0}")]
    UnsafePath(String),
}

/// Unpack `reader` under `dest`, dispatching on the suffix of
/// `declared_name`.
///
/// Directory structure, permission bits, and (for tar) modification times are
/// preserved. Entry paths containing absolute or parent-directory components
/// are rejected rather than written outside the destination.
pub fn extract<R: Read>(reader: R, dest: &Path, declared_name: &str) -> Result<(), ExtractError> {
    let name = Path::new(declared_name);
    if has_extension(name, "zip") {
        extract_zip_stream(reader, dest)
    } else if has_extension(name, "gz") || has_extension(name, "tgz") {
        extract_tar(GzDecoder::new(reader), dest)
    } else {
        extract_tar(reader, dest)
    }
}

fn has_extension(name: &Path, ext: &str) -> bool {
    name.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Validate an entry path: only normal components may remain, so the joined
/// path cannot escape the destination root.
fn safe_relative(path: &Path) -> Result<PathBuf, ExtractError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return Err(ExtractError::UnsafePath(path.display().to_string())),
        }
    }
    Ok(out)
}

/// Stream a tar archive entry by entry until the end-of-archive sentinel.
fn extract_tar<R: Read>(reader: R, dest: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest)?;
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let rel = safe_relative(&entry.path()?)?;
        let target = dest.join(&rel);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
            set_mode(&target, entry.header().mode()?)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if entry_type.is_symlink() {
            let link = entry
                .link_name()?
                .ok_or_else(|| ExtractError::Archive(format!("symlink without target: {}", rel.display())))?;
            make_symlink(&link, &target)?;
            continue;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        set_mode(&target, entry.header().mode()?)?;

        // Later build steps may depend on correct staleness signals, so a
        // failed timestamp write is an extraction failure, not a warning.
        if let Ok(mtime) = entry.header().mtime() {
            out.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime))?;
        }
    }

    Ok(())
}

/// Spool the stream to a temporary file, then extract it as a zip container.
///
/// Every entry's reader and writer are closed before the next entry is
/// opened, so archives with many entries cannot exhaust file descriptors.
fn extract_zip_stream<R: Read>(mut reader: R, dest: &Path) -> Result<(), ExtractError> {
    let mut spool = tempfile::tempfile()?;
    io::copy(&mut reader, &mut spool)?;
    spool.rewind()?;

    let mut archive = ZipArchive::new(spool).map_err(|e| ExtractError::Archive(e.to_string()))?;
    fs::create_dir_all(dest)?;

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let rel = file
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafePath(file.name().to_string()))?;
        let target = dest.join(rel);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        drop(out);

        if let Some(mode) = file.unix_mode() {
            set_mode(&target, mode)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    if target.symlink_metadata().is_ok() {
        fs::remove_file(target)?;
    }
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn make_symlink(_link: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::other("symlink entries unsupported on this platform"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn tar_bytes(entries: &[(&str, &[u8], u32, u64)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content, mode, mtime) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_mtime(*mtime);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn tar_roundtrip_preserves_path_content_mode_mtime() {
        let tar = tar_bytes(&[
            ("pkg-1.0/configure", b"#!/bin/sh\n", 0o755, 1_600_000_000),
            ("pkg-1.0/src/main.c", b"int main(){}\n", 0o644, 1_600_000_100),
        ]);
        let dest = tempdir().unwrap();
        extract(&tar[..], dest.path(), "pkg-1.0.tar").unwrap();

        let configure = dest.path().join("pkg-1.0/configure");
        assert_eq!(fs::read(&configure).unwrap(), b"#!/bin/sh\n");
        assert_eq!(
            fs::read(dest.path().join("pkg-1.0/src/main.c")).unwrap(),
            b"int main(){}\n"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&configure).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let mtime = fs::metadata(&configure)
            .unwrap()
            .modified()
            .unwrap()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert_eq!(mtime, 1_600_000_000);
    }

    #[test]
    fn gzip_suffixes_decompress_before_demuxing() {
        let tar = tar_bytes(&[("dir/file.txt", b"zipped", 0o644, 0)]);
        let gz = gzip(&tar);

        for name in ["pkg.tar.gz", "pkg.tgz"] {
            let dest = tempdir().unwrap();
            extract(&gz[..], dest.path(), name).unwrap();
            assert_eq!(fs::read(dest.path().join("dir/file.txt")).unwrap(), b"zipped");
        }
    }

    #[test]
    fn zip_stream_is_spooled_and_extracted() {
        let mut zip_buf = io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut zip_buf);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        writer.add_directory("pkg-1.0/", options).unwrap();
        writer.start_file("pkg-1.0/run.sh", options).unwrap();
        writer.write_all(b"echo hi\n").unwrap();
        writer.finish().unwrap();
        let zip_bytes = zip_buf.into_inner();

        let dest = tempdir().unwrap();
        extract(&zip_bytes[..], dest.path(), "pkg-1.0.zip").unwrap();
        assert_eq!(fs::read(dest.path().join("pkg-1.0/run.sh")).unwrap(), b"echo hi\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.path().join("pkg-1.0/run.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn tar_and_zip_produce_identical_trees() {
        let tar = tar_bytes(&[("top/data.txt", b"same bytes", 0o644, 0)]);

        let mut zip_buf = io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut zip_buf);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
        writer.start_file("top/data.txt", options).unwrap();
        writer.write_all(b"same bytes").unwrap();
        writer.finish().unwrap();
        let zip_bytes = zip_buf.into_inner();

        let tar_dest = tempdir().unwrap();
        let zip_dest = tempdir().unwrap();
        extract(&tar[..], tar_dest.path(), "a.tar").unwrap();
        extract(&zip_bytes[..], zip_dest.path(), "a.zip").unwrap();

        let tar_file = tar_dest.path().join("top/data.txt");
        let zip_file = zip_dest.path().join("top/data.txt");
        assert_eq!(fs::read(&tar_file).unwrap(), fs::read(&zip_file).unwrap());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert_eq!(
                fs::metadata(&tar_file).unwrap().permissions().mode() & 0o777,
                fs::metadata(&zip_file).unwrap().permissions().mode() & 0o777,
            );
        }
    }

    #[test]
    fn parent_traversal_entries_are_rejected() {
        // Write the hostile path straight into the header bytes; the builder
        // API would refuse to construct it.
        let mut header = tar::Header::new_gnu();
        let hostile = b"../evil.txt";
        {
            let name = &mut header.as_gnu_mut().unwrap().name;
            name[..hostile.len()].copy_from_slice(hostile);
        }
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();

        let mut builder = tar::Builder::new(Vec::new());
        builder.append(&header, &b"evil"[..]).unwrap();
        let tar = builder.into_inner().unwrap();

        let parent = tempdir().unwrap();
        let dest = parent.path().join("inner");
        let err = extract(&tar[..], &dest, "evil.tar").unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath(_)));
        assert!(!parent.path().join("evil.txt").exists());
    }

    #[test]
    fn truncated_gzip_aborts_with_error() {
        let tar = tar_bytes(&[("f", b"data", 0o644, 0)]);
        let mut gz = gzip(&tar);
        gz.truncate(gz.len() / 2);

        let dest = tempdir().unwrap();
        assert!(extract(&gz[..], dest.path(), "broken.tar.gz").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_entries_are_recreated() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "pkg/link.txt", "real.txt")
            .unwrap();
        let tar = builder.into_inner().unwrap();

        let dest = tempdir().unwrap();
        extract(&tar[..], dest.path(), "links.tar").unwrap();
        let link = dest.path().join("pkg/link.txt");
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("real.txt"));
    }
}
