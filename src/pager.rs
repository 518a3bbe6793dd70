use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, trace};

use crate::{
    error::{DbError, Result},
    page::{Page, PAGE_SIZE},
};

/// Index of a page within the database file.
pub type PageNum = u32;

/// Default upper bound on the number of pages a table may use.
pub const TABLE_MAX_PAGES: u32 = 100;

/// A cached page plus whether it has been handed out for writing since it was last flushed
#[derive(Debug)]
struct Frame {
    page: Page,
    dirty: bool,
}

impl Frame {
    fn new(page: Page) -> Self {
        Self { page, dirty: false }
    }
}

/// The pager owns the database file and an in-memory cache of its pages.
///
/// Pages are loaded lazily on first access and stay cached until [`Pager::close`].
/// The pager is the only component that knows about file offsets.
#[derive(Debug)]
pub struct Pager {
    path: PathBuf,
    file: File,
    file_length: u64,
    num_pages: u32,
    max_pages: u32,
    frames: Vec<Option<Frame>>,
}

impl Pager {
    /// Open (or create) the database file at `path`.
    /// Fails if the file length is not a whole number of pages.
    pub fn open<P>(path: P, max_pages: u32) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let file_length = file.seek(SeekFrom::End(0))?;
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(DbError::CorruptFile {
                length: file_length,
            });
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        info!(?path, num_pages, "opened pager");
        Ok(Self {
            path,
            file,
            file_length,
            num_pages,
            max_pages,
            frames: Vec::new(),
        })
    }

    /// The high-water page count: one past the largest page number ever touched
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Number of whole pages currently backed by the file on disk
    pub fn file_pages(&self) -> u32 {
        (self.file_length / PAGE_SIZE as u64) as u32
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// The page number the next freshly allocated page will get.
    /// There is no free list, so this is always the current page count.
    pub fn allocate_page_num(&self) -> PageNum {
        self.num_pages
    }

    /// Get a read-only view of a page, loading it on first reference
    pub fn get_page(&mut self, page_num: PageNum) -> Result<&Page> {
        let frame = self.frame(page_num)?;
        Ok(&frame.page)
    }

    /// Get a writable view of a page, loading it on first reference.
    /// The page is written back to disk on close.
    pub fn get_page_mut(&mut self, page_num: PageNum) -> Result<&mut Page> {
        let frame = self.frame(page_num)?;
        frame.dirty = true;
        Ok(&mut frame.page)
    }

    /// Find the frame for this page, reading it from disk if it is not cached yet.
    /// Pages past the end of the file start out zeroed.
    fn frame(&mut self, page_num: PageNum) -> Result<&mut Frame> {
        if page_num >= self.max_pages {
            return Err(DbError::PageOutOfBounds {
                page: page_num,
                max: self.max_pages,
            });
        }
        let index = page_num as usize;
        if self.frames.len() <= index {
            self.frames.resize_with(index + 1, || None);
        }
        if self.frames[index].is_none() {
            let mut page = Page::new();
            if page_num < self.file_pages() {
                trace!(page_num, "reading page from disk");
                self.file
                    .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(page.as_mut_slice())?;
            }
            self.frames[index] = Some(Frame::new(page));
            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
        }
        self.frames[index]
            .as_mut()
            .ok_or(DbError::PageNotCached { page: page_num })
    }

    /// Write the full page to its slot in the file
    pub fn flush(&mut self, page_num: PageNum) -> Result<()> {
        let frame = self
            .frames
            .get_mut(page_num as usize)
            .and_then(Option::as_mut)
            .ok_or(DbError::PageNotCached { page: page_num })?;
        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(frame.page.as_slice())?;
        frame.dirty = false;
        self.file_length = self.file_length.max(offset + PAGE_SIZE as u64);
        debug!(page_num, "flushed page");
        Ok(())
    }

    /// Write every dirty page back to disk and release the file handle
    pub fn close(mut self) -> Result<()> {
        for page_num in 0..self.num_pages {
            let dirty = self
                .frames
                .get(page_num as usize)
                .and_then(Option::as_ref)
                .is_some_and(|frame| frame.dirty);
            if dirty {
                self.flush(page_num)?;
            }
        }
        self.file.sync_all()?;
        info!(path = ?self.path, num_pages = self.num_pages, "closed pager");
        Ok(())
    }
}

#[cfg(test)]
mod pager_tests {
    use super::*;
    use crate::test_utils::TestDir;

    fn setup(max_pages: u32) -> (TestDir, Pager) {
        let dir = TestDir::new();
        let pager = Pager::open(dir.path().join("pager.db"), max_pages).unwrap();
        (dir, pager)
    }

    #[test]
    fn test_new_file_has_no_pages() {
        let (_dir, pager) = setup(TABLE_MAX_PAGES);
        assert_eq!(pager.num_pages(), 0);
        assert_eq!(pager.file_pages(), 0);
        assert_eq!(pager.allocate_page_num(), 0);
    }

    #[test]
    fn test_get_page_past_end_is_zeroed_and_advances_count() {
        let (_dir, mut pager) = setup(TABLE_MAX_PAGES);
        let page = pager.get_page(4).unwrap();
        assert!(page.as_slice().iter().all(|b| *b == 0));
        assert_eq!(pager.num_pages(), 5);
        assert_eq!(pager.allocate_page_num(), 5);

        //  touching a lower page does not move the high-water mark
        pager.get_page(2).unwrap();
        assert_eq!(pager.num_pages(), 5);
    }

    #[test]
    fn test_page_out_of_bounds() {
        let (_dir, mut pager) = setup(3);
        assert!(pager.get_page(2).is_ok());
        assert!(matches!(
            pager.get_page(3),
            Err(DbError::PageOutOfBounds { page: 3, max: 3 })
        ));
    }

    #[test]
    fn test_flush_uncached_page() {
        let (_dir, mut pager) = setup(TABLE_MAX_PAGES);
        assert!(matches!(
            pager.flush(1),
            Err(DbError::PageNotCached { page: 1 })
        ));
    }

    #[test]
    fn test_close_and_reopen_reads_pages_back() {
        let dir = TestDir::new();
        let path = dir.path().join("reopen.db");

        let mut pager = Pager::open(&path, TABLE_MAX_PAGES).unwrap();
        pager.get_page_mut(0).unwrap().set_u32(0, 11);
        pager.get_page_mut(1).unwrap().set_u32(100, 22);
        pager.close().unwrap();

        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            2 * PAGE_SIZE as u64
        );

        let mut pager = Pager::open(&path, TABLE_MAX_PAGES).unwrap();
        assert_eq!(pager.num_pages(), 2);
        assert_eq!(pager.get_page(0).unwrap().get_u32(0), 11);
        assert_eq!(pager.get_page(1).unwrap().get_u32(100), 22);
    }

    #[test]
    fn test_clean_pages_are_not_written() {
        let dir = TestDir::new();
        let path = dir.path().join("clean.db");

        let mut pager = Pager::open(&path, TABLE_MAX_PAGES).unwrap();
        pager.get_page(0).unwrap();
        pager.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_corrupt_file_length() {
        let dir = TestDir::new();
        let path = dir.path().join("corrupt.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();

        assert!(matches!(
            Pager::open(&path, TABLE_MAX_PAGES),
            Err(DbError::CorruptFile { length }) if length == PAGE_SIZE as u64 + 10
        ));
    }
}
