use std::ffi::{OsStr, OsString};
use std::fs::{File, Metadata};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{self, Context};
use clap::Parser;
use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyData,
    ReplyDirectory, ReplyEntry, ReplyOpen, Request,
};
use libc::{c_int, EACCES, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, O_ACCMODE, O_RDONLY};
use log::{debug, info, warn};
use uzip::container::Container;

const TTL: Duration = Duration::from_secs(1);
const ROOT_INO: u64 = 1;
const IMAGE_INO: u64 = 2;
const CONTAINER_SUFFIX: &[u8] = b".uzip";

/// Mount a uzip compressed image as a single read-only file
#[derive(Parser, Debug)]
struct Args {
    /// The uzip container to expose
    container: PathBuf,

    /// Directory to mount the filesystem on
    mountpoint: PathBuf,

    /// Mount options, comma separated. May be given more than once.
    #[arg(short = 'o', value_name = "OPTIONS")]
    options: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let container = Container::open(&args.container)
        .with_context(|| format!("Failed to open {}", args.container.display()))?;
    let meta = container.storage().metadata()
        .with_context(|| format!("Failed to stat {}", args.container.display()))?;
    let fs = UzipFs::new(container, entry_name(&args.container), &meta);

    let options = mount_options(&args.container, &args.options);
    info!("mounting {} on {}", args.container.display(), args.mountpoint.display());
    debug!("mount options: {options:?}");
    fuser::mount2(fs, &args.mountpoint, &options)
        .with_context(|| format!("Failed to mount on {}", args.mountpoint.display()))?;
    Ok(())
}

/// The name the image is listed under: the container's file name without
/// its `.uzip` suffix.
fn entry_name(path: &Path) -> OsString {
    let name = path.file_name().unwrap_or(path.as_os_str());
    match name.as_bytes().strip_suffix(CONTAINER_SUFFIX) {
        Some(stem) if !stem.is_empty() => OsStr::from_bytes(stem).to_os_string(),
        _ => name.to_os_string(),
    }
}

fn mount_options(container: &Path, args: &[String]) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName(container.display().to_string()),
        MountOption::Subtype("uzip".to_string()),
    ];
    options.extend(
        args.iter()
            .flat_map(|a| a.split(','))
            .filter(|o| !o.is_empty())
            .filter_map(parse_option),
    );
    options
}

fn parse_option(opt: &str) -> Option<MountOption> {
    Some(match opt {
        "ro" => MountOption::RO,
        "rw" => {
            warn!("ignoring mount option 'rw', uzip images are read-only");
            return None;
        }
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        "dirsync" => MountOption::DirSync,
        _ => match opt.split_once('=') {
            Some(("fsname", v)) => MountOption::FSName(v.to_string()),
            Some(("subtype", v)) => MountOption::Subtype(v.to_string()),
            _ => MountOption::CUSTOM(opt.to_string()),
        },
    })
}

fn system_time(secs: i64, nsecs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
    } else {
        UNIX_EPOCH
    }
}

/// Exposes one container as `/<name>` on a FUSE mount. The container is
/// dropped, closing its file, when the filesystem is unmounted.
struct UzipFs {
    container: Option<Container<File>>,
    name: OsString,
    root_attr: FileAttr,
    image_attr: FileAttr,
}

impl UzipFs {
    fn new(container: Container<File>, name: OsString, meta: &Metadata) -> Self {
        let atime = system_time(meta.atime(), meta.atime_nsec());
        let mtime = system_time(meta.mtime(), meta.mtime_nsec());
        let ctime = system_time(meta.ctime(), meta.ctime_nsec());
        let size = container.logical_size();

        let image_attr = FileAttr {
            ino: IMAGE_INO,
            size,
            blocks: size.div_ceil(512),
            atime,
            mtime,
            ctime,
            crtime: mtime,
            kind: FileType::RegularFile,
            perm: (meta.mode() & 0o7777 & !0o222) as u16,
            nlink: 1,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: 0,
            blksize: container.block_size(),
            flags: 0,
        };
        let root_attr = FileAttr {
            ino: ROOT_INO,
            size: 0,
            blocks: 0,
            kind: FileType::Directory,
            perm: 0o555,
            nlink: 2,
            blksize: 512,
            ..image_attr
        };
        Self { container: Some(container), name, root_attr, image_attr }
    }

    fn read_image(&self, offset: i64, size: u32) -> Result<Vec<u8>, c_int> {
        let container = self.container.as_ref().ok_or(EIO)?;
        let offset = u64::try_from(offset).map_err(|_| EINVAL)?;
        container.read_range(offset, size as usize).map_err(|e| {
            warn!("read of {size} bytes at {offset} failed: {e}");
            e.errno()
        })
    }
}

impl Filesystem for UzipFs {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("serving {:?}, {} bytes", self.name, self.image_attr.size);
        Ok(())
    }

    fn destroy(&mut self) {
        if self.container.take().is_some() {
            info!("unmounted, container closed");
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent == ROOT_INO && name == self.name {
            reply.entry(&TTL, &self.image_attr, 0);
        } else {
            reply.error(ENOENT);
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match ino {
            ROOT_INO => reply.attr(&TTL, &self.root_attr),
            IMAGE_INO => reply.attr(&TTL, &self.image_attr),
            _ => reply.error(ENOENT),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match ino {
            IMAGE_INO if flags & O_ACCMODE != O_RDONLY => reply.error(EACCES),
            IMAGE_INO => reply.opened(0, 0),
            ROOT_INO => reply.error(EISDIR),
            _ => reply.error(ENOENT),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if ino != IMAGE_INO {
            reply.error(ENOENT);
            return;
        }
        match self.read_image(offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        match ino {
            ROOT_INO => {}
            IMAGE_INO => return reply.error(ENOTDIR),
            _ => return reply.error(ENOENT),
        }
        let entries = [
            (ROOT_INO, FileType::Directory, OsStr::new(".")),
            (ROOT_INO, FileType::Directory, OsStr::new("..")),
            (IMAGE_INO, FileType::RegularFile, self.name.as_os_str()),
        ];
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            // The offset handed back is where the next call resumes
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }
}
