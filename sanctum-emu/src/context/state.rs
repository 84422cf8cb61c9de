//! memory states
//!
//! byte backings for ram and rom regions. offsets are relative to the
//! region base; the address space has already checked that an access
//! fits inside the region before it gets here.

use nohash_hasher::IntMap;

use crate::context::types::DEFAULT_ALIGNMENT_SIZE;

const PAGE_SIZE: usize = DEFAULT_ALIGNMENT_SIZE as usize;

/// sparse ram backing
///
/// memory is segmented in 0x1000 byte (4 KB) pages that are only
/// allocated on first write. pages that were never written read as zero,
/// so large regions (the 2 GB sanctum dram) cost nothing until touched.
#[derive(Clone, Debug)]
pub struct RamState {
    size: u64,
    pages: IntMap<u64, Box<[u8; PAGE_SIZE]>>,
}

impl RamState {
    pub fn new_with(size: u64) -> Self {
        Self {
            size,
            pages: IntMap::default(),
        }
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    /// number of pages that have been allocated so far
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) {
        let mut done = 0usize;
        while done < buf.len() {
            let at = offset + done as u64;
            let page = at / DEFAULT_ALIGNMENT_SIZE;
            let start = (at % DEFAULT_ALIGNMENT_SIZE) as usize;
            let n = (PAGE_SIZE - start).min(buf.len() - done);
            match self.pages.get(&page) {
                Some(bytes) => buf[done..done + n].copy_from_slice(&bytes[start..start + n]),
                None => buf[done..done + n].fill(0),
            }
            done += n;
        }
    }

    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) {
        let mut done = 0usize;
        while done < bytes.len() {
            let at = offset + done as u64;
            let page = at / DEFAULT_ALIGNMENT_SIZE;
            let start = (at % DEFAULT_ALIGNMENT_SIZE) as usize;
            let n = (PAGE_SIZE - start).min(bytes.len() - done);
            let backing = self.pages
                .entry(page)
                .or_insert_with(|| Box::new([0u8; PAGE_SIZE]));
            backing[start..start + n].copy_from_slice(&bytes[done..done + n]);
            done += n;
        }
    }
}

/// rom backing
///
/// guest writes never reach this state; `load` is the host-side path
/// used to place blobs at board setup.
#[derive(Clone, Debug)]
pub struct RomState {
    inner: Vec<u8>,
}

impl RomState {
    pub fn new_with(size: u64) -> Self {
        Self {
            inner: vec![0u8; size as usize],
        }
    }

    pub fn len(&self) -> u64 {
        self.inner.len() as u64
    }

    pub fn read_bytes(&self, offset: u64, buf: &mut [u8]) {
        let start = offset as usize;
        buf.copy_from_slice(&self.inner[start..start + buf.len()]);
    }

    pub fn load(&mut self, offset: u64, bytes: &[u8]) {
        let start = offset as usize;
        self.inner[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_sparse_pages() {
        let mut ram = RamState::new_with(0x8000_0000);
        let mut buf = [0xffu8; 8];

        ram.read_bytes(0x7fff_fff8, &mut buf);
        assert_eq!(buf, [0u8; 8], "untouched ram must read as zero");
        assert_eq!(ram.resident_pages(), 0, "reads must not allocate");

        // straddle a page boundary
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        ram.write_bytes(0xffc, &bytes);
        assert_eq!(ram.resident_pages(), 2);

        ram.read_bytes(0xffc, &mut buf);
        assert_eq!(buf, bytes, "read/write bytes mismatch across pages");

        let mut tail = [0u8; 4];
        ram.read_bytes(0x1000, &mut tail);
        assert_eq!(tail, [5, 6, 7, 8]);
    }

    #[test]
    fn test_rom_load() {
        let mut rom = RomState::new_with(0x100);
        rom.load(0x10, &[0xaa, 0xbb]);

        let mut buf = [0u8; 4];
        rom.read_bytes(0x0e, &mut buf);
        assert_eq!(buf, [0x00, 0x00, 0xaa, 0xbb]);
        assert_eq!(rom.len(), 0x100);
    }
}
