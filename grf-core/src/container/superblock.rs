use std::io::{Read, Write};

pub const MAGIC: &[u8; 6] = b"GRFALP";
pub const VERSION: u16 = 1;
/// magic + version + table_off + table_len
pub const HEADER_LEN: u64 = 6 + 2 + 8 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub version: u16,
    /// Absolute file offset of the CBOR entry table
    pub table_off: u64,
    /// Byte length of the entry table
    pub table_len: u64,
}

impl Superblock {
    pub fn empty() -> Self {
        Self {
            version: VERSION,
            table_off: 0,
            table_len: 0,
        }
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.table_off.to_le_bytes())?;
        w.write_all(&self.table_len.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> std::io::Result<Self> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "not a GRF archive (bad magic)",
            ));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)?;
        let version = u16::from_le_bytes(v);
        if version != VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unsupported archive version {version}"),
            ));
        }
        let mut off = [0u8; 8];
        r.read_exact(&mut off)?;
        let mut len = [0u8; 8];
        r.read_exact(&mut len)?;
        Ok(Self {
            version,
            table_off: u64::from_le_bytes(off),
            table_len: u64::from_le_bytes(len),
        })
    }
}
