use anyhow::{bail, Context, Result};
use crc32fast::Hasher;

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
pub const IHDR_LEN: usize = 13;

// Chunk layout:
// len  u32 BE (data only)
// type [4]
// data [len]
// crc  u32 BE over type + data
const CHUNK_OVERHEAD: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Grayscale = 0,
    Rgb = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    Rgba = 6,
}

impl ColorType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::Rgb),
            3 => Some(ColorType::Indexed),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorType::Grayscale => "gray",
            ColorType::Rgb => "rgb",
            ColorType::Indexed => "indexed",
            ColorType::GrayscaleAlpha => "gray_alpha",
            ColorType::Rgba => "rgba",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
}

// Pixel data is not inflated.
pub fn inspect(buf: &[u8]) -> Result<PngInfo> {
    if buf.len() < SIGNATURE.len() || buf[..SIGNATURE.len()] != SIGNATURE {
        bail!("not a PNG: signature mismatch");
    }

    let mut pos = SIGNATURE.len();
    let mut header: Option<(u32, u32, u8, ColorType)> = None;
    let mut idat_seen = false;
    let mut chunk_count = 0usize;

    while pos < buf.len() {
        let chunk = read_chunk(buf, pos)
            .with_context(|| format!("chunk {} at offset {}", chunk_count, pos))?;
        pos += CHUNK_OVERHEAD + chunk.data.len();
        chunk_count += 1;

        match &chunk.kind {
            b"IHDR" => {
                if chunk_count != 1 {
                    bail!("IHDR must be the first chunk");
                }
                header = Some(parse_ihdr(chunk.data)?);
            }
            _ if header.is_none() => {
                bail!(
                    "first chunk is {} instead of IHDR",
                    String::from_utf8_lossy(&chunk.kind)
                );
            }
            b"IDAT" => idat_seen = true,
            b"IEND" => {
                if pos != buf.len() {
                    bail!("{} trailing bytes after IEND", buf.len() - pos);
                }
                if !idat_seen {
                    bail!("no IDAT chunk before IEND");
                }
                let (width, height, bit_depth, color_type) =
                    header.context("missing IHDR")?;
                return Ok(PngInfo {
                    width,
                    height,
                    bit_depth,
                    color_type,
                    chunk_count,
                });
            }
            _ => {}
        }
    }

    bail!("truncated PNG: no IEND chunk")
}

fn read_chunk(buf: &[u8], pos: usize) -> Result<Chunk<'_>> {
    let rest = &buf[pos..];
    if rest.len() < CHUNK_OVERHEAD {
        bail!("truncated chunk header ({} bytes left)", rest.len());
    }
    let len = u32::from_be_bytes(rest[0..4].try_into()?) as usize;
    if rest.len() < CHUNK_OVERHEAD + len {
        bail!("chunk length {} exceeds remaining {} bytes", len, rest.len() - CHUNK_OVERHEAD);
    }
    let kind: [u8; 4] = rest[4..8].try_into()?;
    let data = &rest[8..8 + len];
    let stored = u32::from_be_bytes(rest[8 + len..12 + len].try_into()?);
    let actual = chunk_crc(&kind, data);
    if stored != actual {
        bail!(
            "{} CRC mismatch: stored {:08x}, computed {:08x}",
            String::from_utf8_lossy(&kind),
            stored,
            actual
        );
    }
    Ok(Chunk { kind, data })
}

fn parse_ihdr(data: &[u8]) -> Result<(u32, u32, u8, ColorType)> {
    if data.len() != IHDR_LEN {
        bail!("IHDR length {} (expected {})", data.len(), IHDR_LEN);
    }
    let width = u32::from_be_bytes(data[0..4].try_into()?);
    let height = u32::from_be_bytes(data[4..8].try_into()?);
    if width == 0 || height == 0 {
        bail!("IHDR dimensions {}x{} must be non-zero", width, height);
    }
    let bit_depth = data[8];
    let color_type =
        ColorType::from_byte(data[9]).with_context(|| format!("bad color type {}", data[9]))?;
    Ok((width, height, bit_depth, color_type))
}

pub fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(kind);
    h.update(data);
    h.finalize()
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(data);
    h.finalize()
}
