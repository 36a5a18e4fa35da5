//! Persistence: a 128-byte file header followed by a fixed-stride page
//! file.
//!
//! Hand-rolled little-endian struct packing rather than `serde`: the wire
//! format is a fixed byte layout meant to be readable by non-Rust tools,
//! so it is framed explicitly rather than through a serialization crate.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::Utc;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::Mbr;
use crate::page::{Page, PagePool, PAGE_SIZE};

pub const MAGIC: u32 = 0x5552_4249; // "URBI"
pub const FILE_FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 128;

/// The 128-byte fixed file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_count: u32,
    pub track_count: u32,
    pub object_count: u32,
    pub bounds: Mbr,
    pub created_time: u64,
    pub modified_time: u64,
    pub page_size: u32,
    pub pages_per_track: u32,
    pub index_offset: u64,
    pub data_offset: u64,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.page_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.track_count.to_le_bytes());
        buf[16..20].copy_from_slice(&self.object_count.to_le_bytes());
        buf[20..52].copy_from_slice(&self.bounds.to_le_bytes());
        buf[52..60].copy_from_slice(&self.created_time.to_le_bytes());
        buf[60..68].copy_from_slice(&self.modified_time.to_le_bytes());
        buf[68..72].copy_from_slice(&self.page_size.to_le_bytes());
        buf[72..76].copy_from_slice(&self.pages_per_track.to_le_bytes());
        buf[76..84].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[84..92].copy_from_slice(&self.data_offset.to_le_bytes());
        // bytes [92..128) are reserved, left zeroed.
        buf
    }

    fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(Error::Corrupt("file header magic mismatch"));
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version > FILE_FORMAT_VERSION {
            return Err(Error::Version {
                found: version,
                max: FILE_FORMAT_VERSION,
            });
        }
        Ok(Self {
            magic,
            version,
            page_count: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            track_count: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            object_count: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            bounds: Mbr::from_le_bytes(&buf[20..52]),
            created_time: u64::from_le_bytes(buf[52..60].try_into().unwrap()),
            modified_time: u64::from_le_bytes(buf[60..68].try_into().unwrap()),
            page_size: u32::from_le_bytes(buf[68..72].try_into().unwrap()),
            pages_per_track: u32::from_le_bytes(buf[72..76].try_into().unwrap()),
            index_offset: u64::from_le_bytes(buf[76..84].try_into().unwrap()),
            data_offset: u64::from_le_bytes(buf[84..92].try_into().unwrap()),
        })
    }
}

fn data_offset() -> u64 {
    (HEADER_SIZE + PAGE_SIZE) as u64
}

fn page_offset(page_id: u32) -> u64 {
    data_offset() + (page_id as u64 - 1) * PAGE_SIZE as u64
}

/// A handle to an on-disk Urbis file.
pub struct PersistentFile {
    file: File,
    pub header: FileHeader,
}

impl PersistentFile {
    /// Create a new file, writing a fresh header. Fails if the path
    /// already exists.
    pub fn create(path: impl AsRef<Path>, bounds: Mbr, pages_per_track: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;
        let now = Utc::now().timestamp() as u64;
        let header = FileHeader {
            magic: MAGIC,
            version: FILE_FORMAT_VERSION,
            page_count: 0,
            track_count: 0,
            object_count: 0,
            bounds,
            created_time: now,
            modified_time: now,
            page_size: PAGE_SIZE as u32,
            pages_per_track,
            index_offset: HEADER_SIZE as u64,
            data_offset: data_offset(),
        };
        file.write_all(&header.to_bytes())?;
        debug!("created urbis file at {}", path.display());
        Ok(Self { file, header })
    }

    /// Open an existing file, validating magic and version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut buf)?;
        let header = FileHeader::from_bytes(&buf)?;
        debug!("opened urbis file at {} (version {})", path.display(), header.version);
        Ok(Self { file, header })
    }

    /// Write a page to its fixed-stride slot.
    pub fn write_page(&mut self, pool: &mut PagePool, page: &Page) -> Result<()> {
        let mut buf = vec![0u8; PAGE_SIZE];
        page.serialize(&mut buf)?;
        let offset = page_offset(page.id.0);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buf)?;
        pool.record_page_written(PAGE_SIZE as u64);
        Ok(())
    }

    pub fn read_page(&mut self, pool: &mut PagePool, page_id: u32) -> Result<Page> {
        let offset = page_offset(page_id);
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.read_exact(&mut buf)?;
        pool.record_page_read(PAGE_SIZE as u64);
        let (page, checksum) = Page::deserialize(&buf)?;
        if !page.verify(checksum) {
            warn!("page checksum mismatch on read for page {page_id}");
            return Err(Error::Corrupt("page checksum mismatch"));
        }
        Ok(page)
    }

    /// Write all dirty pages, then the header. Returns the number of
    /// pages written.
    pub fn sync(&mut self, pool: &mut PagePool) -> Result<usize> {
        let dirty_ids: Vec<_> = pool.pages().filter(|p| p.flags.dirty).map(|p| p.id).collect();
        let written = dirty_ids.len();
        for id in &dirty_ids {
            let page = pool.get_page(*id).expect("id came from pool iteration").clone();
            self.write_page(pool, &page)?;
            pool.get_page_mut(*id).unwrap().flags.dirty = false;
        }

        let stats = pool.stats();
        self.header.page_count = stats.total_pages as u32;
        self.header.track_count = stats.total_tracks as u32;
        self.header.object_count = stats.total_objects as u32;
        self.header.modified_time = Utc::now().timestamp() as u64;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        self.file.flush()?;
        debug!("synced urbis file, wrote {written} pages");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, Point, SpatialObject};
    use tempfile::tempdir;

    #[test]
    fn create_then_open_roundtrips_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.urbis");
        let bounds = Mbr::new(0.0, 0.0, 100.0, 100.0);
        {
            let pf = PersistentFile::create(&path, bounds, 16).unwrap();
            assert_eq!(pf.header.magic, MAGIC);
        }
        let pf = PersistentFile::open(&path).unwrap();
        assert_eq!(pf.header.bounds, bounds);
        assert_eq!(pf.header.version, FILE_FORMAT_VERSION);
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.urbis");
        std::fs::write(&path, vec![0u8; HEADER_SIZE]).unwrap();
        assert!(matches!(PersistentFile::open(&path), Err(Error::Corrupt(_))));
    }

    #[test]
    fn open_rejects_future_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.urbis");
        let mut header = FileHeader {
            magic: MAGIC,
            version: FILE_FORMAT_VERSION + 1,
            page_count: 0,
            track_count: 0,
            object_count: 0,
            bounds: Mbr::empty(),
            created_time: 0,
            modified_time: 0,
            page_size: PAGE_SIZE as u32,
            pages_per_track: 16,
            index_offset: HEADER_SIZE as u64,
            data_offset: data_offset(),
        };
        std::fs::write(&path, header.to_bytes()).unwrap();
        header.version = FILE_FORMAT_VERSION + 1;
        assert!(matches!(PersistentFile::open(&path), Err(Error::Version { .. })));
    }

    #[test]
    fn write_and_read_page_verifies_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pages.urbis");
        let mut pf = PersistentFile::create(&path, Mbr::new(0.0, 0.0, 10.0, 10.0), 16).unwrap();

        let mut pool = PagePool::new(64, 16);
        let page_id = pool.alloc_page().id;
        pool.get_page_mut(page_id)
            .unwrap()
            .add_object(SpatialObject::new(1, Geometry::Point(Point::new(1.0, 2.0))).unwrap())
            .unwrap();

        let page = pool.get_page(page_id).unwrap().clone();
        pf.write_page(&mut pool, &page).unwrap();
        let read_back = pf.read_page(&mut pool, page_id.0).unwrap();
        assert_eq!(read_back.objects.len(), 1);
        assert_eq!(pool.io_stats().pages_written, 1);
        assert_eq!(pool.io_stats().pages_read, 1);
    }
}
