//! Memory-mapped buffer addressed with 64-bit offsets
//!
//! A [`LargeBuffer`] maps a region of a file as a sequence of pages. Every
//! page extends [`PAGE_OVERLAP`] bytes into the next one, so any scalar of up
//! to 8 bytes lies entirely inside a single page and is read or written with
//! one slice copy. Longer runs go through [`LargeBuffer::get_bytes`] and
//! [`LargeBuffer::put_bytes`], which split the copy at page boundaries.
//!
//! All scalars are little-endian.

use crate::error::{Result, SsahaError};
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::File;

/// Bytes each page maps past its nominal end
pub const PAGE_OVERLAP: u64 = 8;

/// Default nominal page size
pub const PAGE_SIZE: u64 = i32::MAX as u64 - PAGE_OVERLAP;

/// Access mode of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Reads only; writes fail with `ReadOnlyBuffer`
    ReadOnly,
    /// Reads and writes, shared with the underlying file
    ReadWrite,
}

enum Page {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Page {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Page::ReadOnly(m) => &m[..],
            Page::ReadWrite(m) => &m[..],
        }
    }
}

/// A file region mapped as overlapping pages
pub struct LargeBuffer {
    pages: Vec<Page>,
    page_size: u64,
    size: u64,
    mode: MapMode,
    position: u64,
}

macro_rules! scalar_accessors {
    ($($ty:ty => $get:ident, $put:ident, $read:ident, $write:ident;)*) => {
        $(
            #[doc = concat!("Read a `", stringify!($ty), "` at `offset`")]
            #[inline]
            pub fn $get(&self, offset: u64) -> Result<$ty> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let mut bytes = [0u8; WIDTH];
                bytes.copy_from_slice(self.scalar(offset, WIDTH as u64)?);
                Ok(<$ty>::from_le_bytes(bytes))
            }

            #[doc = concat!("Write a `", stringify!($ty), "` at `offset`")]
            #[inline]
            pub fn $put(&mut self, offset: u64, value: $ty) -> Result<()> {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                self.scalar_mut(offset, WIDTH as u64)?
                    .copy_from_slice(&value.to_le_bytes());
                Ok(())
            }

            #[doc = concat!("Read a `", stringify!($ty), "` at the cursor and advance it")]
            pub fn $read(&mut self) -> Result<$ty> {
                let value = self.$get(self.position)?;
                self.position += std::mem::size_of::<$ty>() as u64;
                Ok(value)
            }

            #[doc = concat!("Write a `", stringify!($ty), "` at the cursor and advance it")]
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                self.$put(self.position, value)?;
                self.position += std::mem::size_of::<$ty>() as u64;
                Ok(())
            }
        )*
    };
}

impl LargeBuffer {
    /// Map `size` bytes of `file` starting at `base` with the default page size
    pub fn map(file: &File, mode: MapMode, base: u64, size: u64) -> Result<Self> {
        Self::map_with_page_size(file, mode, base, size, PAGE_SIZE)
    }

    /// Map `size` bytes of `file` starting at `base`, split into pages of
    /// `page_size` bytes
    ///
    /// # Errors
    /// `InvalidPageSize` if `page_size` is smaller than [`PAGE_OVERLAP`],
    /// `OutOfBounds` if the region extends past the end of the file, `Io` if
    /// mapping fails.
    pub fn map_with_page_size(
        file: &File,
        mode: MapMode,
        base: u64,
        size: u64,
        page_size: u64,
    ) -> Result<Self> {
        if page_size < PAGE_OVERLAP {
            return Err(SsahaError::InvalidPageSize {
                page_size,
                min: PAGE_OVERLAP,
            });
        }
        let file_len = file.metadata()?.len();
        if !matches!(base.checked_add(size), Some(end) if end <= file_len) {
            return Err(SsahaError::OutOfBounds {
                offset: base,
                width: size,
                size: file_len,
            });
        }

        let num_pages = size.div_ceil(page_size);
        let mut pages = Vec::with_capacity(num_pages as usize);
        for i in 0..num_pages {
            let start = i * page_size;
            let len = (page_size + PAGE_OVERLAP).min(size - start);
            let mut options = MmapOptions::new();
            options.offset(base + start).len(len as usize);
            // The file must not be truncated while the mapping is alive
            let page = unsafe {
                match mode {
                    MapMode::ReadOnly => Page::ReadOnly(options.map(file)?),
                    MapMode::ReadWrite => Page::ReadWrite(options.map_mut(file)?),
                }
            };
            pages.push(page);
        }

        tracing::debug!(
            "Mapped {} bytes at offset {} as {} page(s) of {} bytes ({:?})",
            size,
            base,
            pages.len(),
            page_size,
            mode
        );

        Ok(Self {
            pages,
            page_size,
            size,
            mode,
            position: 0,
        })
    }

    /// Mapped size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Access mode
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    /// Nominal page size
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of mapped pages
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Cursor used by the `read_*` and `write_*` methods
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    #[inline]
    fn check_bounds(&self, offset: u64, width: u64) -> Result<()> {
        if !matches!(offset.checked_add(width), Some(end) if end <= self.size) {
            return Err(SsahaError::OutOfBounds {
                offset,
                width,
                size: self.size,
            });
        }
        Ok(())
    }

    #[inline]
    fn check_writable(&self) -> Result<()> {
        match self.mode {
            MapMode::ReadOnly => Err(SsahaError::ReadOnlyBuffer),
            MapMode::ReadWrite => Ok(()),
        }
    }

    /// Page index and in-page offset for `offset`
    #[inline]
    fn locate(&self, offset: u64) -> (usize, usize) {
        (
            (offset / self.page_size) as usize,
            (offset % self.page_size) as usize,
        )
    }

    /// Slice of `width <= PAGE_OVERLAP` bytes at `offset`, always inside one page
    #[inline]
    fn scalar(&self, offset: u64, width: u64) -> Result<&[u8]> {
        debug_assert!(width <= PAGE_OVERLAP);
        self.check_bounds(offset, width)?;
        let (index, within) = self.locate(offset);
        Ok(&self.pages[index].bytes()[within..within + width as usize])
    }

    #[inline]
    fn scalar_mut(&mut self, offset: u64, width: u64) -> Result<&mut [u8]> {
        debug_assert!(width <= PAGE_OVERLAP);
        self.check_writable()?;
        self.check_bounds(offset, width)?;
        let (index, within) = self.locate(offset);
        match &mut self.pages[index] {
            Page::ReadWrite(m) => Ok(&mut m[within..within + width as usize]),
            Page::ReadOnly(_) => Err(SsahaError::ReadOnlyBuffer),
        }
    }

    scalar_accessors! {
        u8 => get_u8, put_u8, read_u8, write_u8;
        i8 => get_i8, put_i8, read_i8, write_i8;
        u16 => get_u16, put_u16, read_u16, write_u16;
        i16 => get_i16, put_i16, read_i16, write_i16;
        u32 => get_u32, put_u32, read_u32, write_u32;
        i32 => get_i32, put_i32, read_i32, write_i32;
        u64 => get_u64, put_u64, read_u64, write_u64;
        i64 => get_i64, put_i64, read_i64, write_i64;
        f32 => get_f32, put_f32, read_f32, write_f32;
        f64 => get_f64, put_f64, read_f64, write_f64;
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`
    pub fn get_bytes(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        self.check_bounds(offset, out.len() as u64)?;
        let mut done = 0usize;
        while done < out.len() {
            let (index, within) = self.locate(offset + done as u64);
            let chunk = (self.page_size as usize - within).min(out.len() - done);
            out[done..done + chunk]
                .copy_from_slice(&self.pages[index].bytes()[within..within + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Copy `bytes` into the buffer starting at `offset`
    pub fn put_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.check_writable()?;
        self.check_bounds(offset, bytes.len() as u64)?;
        let mut done = 0usize;
        while done < bytes.len() {
            let (index, within) = self.locate(offset + done as u64);
            let chunk = (self.page_size as usize - within).min(bytes.len() - done);
            match &mut self.pages[index] {
                Page::ReadWrite(m) => {
                    m[within..within + chunk].copy_from_slice(&bytes[done..done + chunk])
                }
                Page::ReadOnly(_) => return Err(SsahaError::ReadOnlyBuffer),
            }
            done += chunk;
        }
        Ok(())
    }

    /// Read `len` bytes at the cursor and advance it
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.get_bytes(self.position, &mut out)?;
        self.position += len as u64;
        Ok(out)
    }

    /// Write `bytes` at the cursor and advance it
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_bytes(self.position, bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Flush every writable page to the file
    pub fn force(&self) -> Result<()> {
        for page in &self.pages {
            if let Page::ReadWrite(m) = page {
                m.flush()?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LargeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeBuffer")
            .field("size", &self.size)
            .field("page_size", &self.page_size)
            .field("pages", &self.pages.len())
            .field("mode", &self.mode)
            .field("position", &self.position)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(len: u64) -> File {
        let file = tempfile::tempfile().unwrap();
        file.set_len(len).unwrap();
        file
    }

    #[test]
    fn test_page_layout() {
        let file = scratch_file(100);
        let buf = LargeBuffer::map_with_page_size(&file, MapMode::ReadOnly, 0, 100, 16).unwrap();
        assert_eq!(buf.num_pages(), 7);
        assert_eq!(buf.pages[0].bytes().len(), 24);
        // Last page holds only the 4 remaining bytes
        assert_eq!(buf.pages[6].bytes().len(), 4);
    }

    #[test]
    fn test_scalars_straddling_pages() {
        let file = scratch_file(64);
        let mut buf =
            LargeBuffer::map_with_page_size(&file, MapMode::ReadWrite, 0, 64, 16).unwrap();

        // Every offset where a u64 fits, including all page-straddling ones
        for offset in 0..=56u64 {
            let value = 0x0102_0304_0506_0708u64.wrapping_mul(offset + 1);
            buf.put_u64(offset, value).unwrap();
            assert_eq!(buf.get_u64(offset).unwrap(), value, "offset {offset}");
        }

        buf.put_u32(14, 0xDEAD_BEEF).unwrap();
        buf.put_i16(31, -2).unwrap();
        buf.put_f64(40, 2.5).unwrap();
        buf.put_f32(13, -0.75).unwrap();
        assert_eq!(buf.get_f32(13).unwrap(), -0.75);
        assert_eq!(buf.get_i16(31).unwrap(), -2);
        assert_eq!(buf.get_f64(40).unwrap(), 2.5);
        buf.force().unwrap();

        // A mapping with the default page size sees the same bytes
        let whole = LargeBuffer::map(&file, MapMode::ReadOnly, 0, 64).unwrap();
        assert_eq!(whole.num_pages(), 1);
        assert_eq!(whole.get_i16(31).unwrap(), -2);
        assert_eq!(whole.get_f64(40).unwrap(), 2.5);
        assert_eq!(whole.get_f32(13).unwrap(), -0.75);
    }

    #[test]
    fn test_little_endian_layout() {
        let file = scratch_file(8);
        let mut buf = LargeBuffer::map(&file, MapMode::ReadWrite, 0, 8).unwrap();
        buf.put_u32(0, 0x0403_0201).unwrap();
        assert_eq!(buf.get_u8(0).unwrap(), 1);
        assert_eq!(buf.get_u8(3).unwrap(), 4);
        assert_eq!(buf.get_u16(1).unwrap(), 0x0302);
        buf.put_i8(4, -1).unwrap();
        assert_eq!(buf.get_u8(4).unwrap(), 0xFF);
    }

    #[test]
    fn test_bytes_across_pages() {
        let file = scratch_file(50);
        let mut buf =
            LargeBuffer::map_with_page_size(&file, MapMode::ReadWrite, 0, 50, 8).unwrap();
        let payload: Vec<u8> = (0..37).collect();
        buf.put_bytes(5, &payload).unwrap();

        let mut out = vec![0u8; 37];
        buf.get_bytes(5, &mut out).unwrap();
        assert_eq!(out, payload);
        assert_eq!(buf.get_u8(5 + 20).unwrap(), 20);
    }

    #[test]
    fn test_cursor() {
        let file = scratch_file(32);
        let mut buf =
            LargeBuffer::map_with_page_size(&file, MapMode::ReadWrite, 0, 32, 8).unwrap();
        buf.write_u32(7).unwrap();
        buf.write_u64(u64::MAX - 1).unwrap();
        buf.write_bytes(b"name").unwrap();
        buf.write_i64(-42).unwrap();
        assert_eq!(buf.position(), 24);

        buf.set_position(0);
        assert_eq!(buf.read_u32().unwrap(), 7);
        assert_eq!(buf.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(buf.read_bytes(4).unwrap(), b"name");
        assert_eq!(buf.read_i64().unwrap(), -42);
    }

    #[test]
    fn test_base_offset() {
        let file = scratch_file(40);
        {
            let mut buf = LargeBuffer::map(&file, MapMode::ReadWrite, 0, 40).unwrap();
            buf.put_u64(30, 99).unwrap();
            buf.force().unwrap();
        }
        let buf = LargeBuffer::map_with_page_size(&file, MapMode::ReadOnly, 20, 20, 8).unwrap();
        assert_eq!(buf.get_u64(10).unwrap(), 99);
    }

    #[test]
    fn test_out_of_bounds() {
        let file = scratch_file(16);
        let mut buf =
            LargeBuffer::map_with_page_size(&file, MapMode::ReadWrite, 0, 16, 8).unwrap();
        assert!(buf.get_u64(8).is_ok());
        assert!(matches!(
            buf.get_u64(9),
            Err(SsahaError::OutOfBounds { offset: 9, width: 8, size: 16 })
        ));
        assert!(buf.put_u16(15, 1).is_err());
        let mut out = [0u8; 4];
        assert!(buf.get_bytes(14, &mut out).is_err());
        assert!(buf.get_u8(u64::MAX).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let file = scratch_file(16);
        let mut buf = LargeBuffer::map(&file, MapMode::ReadOnly, 0, 16).unwrap();
        assert!(matches!(buf.put_u32(0, 1), Err(SsahaError::ReadOnlyBuffer)));
        assert!(matches!(buf.put_bytes(0, b"x"), Err(SsahaError::ReadOnlyBuffer)));
        assert!(buf.force().is_ok());
    }

    #[test]
    fn test_invalid_mappings() {
        let file = scratch_file(16);
        assert!(matches!(
            LargeBuffer::map_with_page_size(&file, MapMode::ReadOnly, 0, 16, 4),
            Err(SsahaError::InvalidPageSize { page_size: 4, min: 8 })
        ));
        assert!(matches!(
            LargeBuffer::map(&file, MapMode::ReadOnly, 8, 16),
            Err(SsahaError::OutOfBounds { .. })
        ));
        let empty = LargeBuffer::map(&file, MapMode::ReadOnly, 16, 0).unwrap();
        assert_eq!(empty.num_pages(), 0);
        assert!(empty.get_u8(0).is_err());
    }
}
