//! Table codec: a canonical, checksummed big-endian byte layout.
//!
//! ```text
//! magic "PHTB" | version u16 | flags u8 (bit 0 = finalized)
//! seed u64 | n_seeds u32 | seed u64*         seeds strictly ascending, first = seed
//! total_events u64 | total_weight f64
//! n_params u32 | (key str, value str)*        keys strictly ascending
//! value_axis u32
//! n_axes u32 | per axis:
//!     label str | unit str | transform u8 (0 identity, 1 log, 2 power + exponent f64)
//!     inclusive_upper u8 | n_edges u32 | edges f64*
//! n_cells u64 | cell* | overflow cell
//!     cell = sample_count u64 | weight_sum f64 | weight_sq_sum f64 | mean f64 | m2 f64
//! checksum u64                                 XxHash64 (seed 0) of everything above
//! str = u32 byte length | UTF-8
//! ```
//!
//! Floats are stored by bit pattern, so a table survives a save/load cycle
//! exactly and `encode(decode(bytes)) == bytes` for every accepted input.

pub mod rbuffer;
pub mod wbuffer;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use pt_core::{Error, Result};
use twox_hash::XxHash64;

use crate::accumulator::Cell;
use crate::axis::{Axis, Transform};
use crate::table::{Provenance, Table};

use self::rbuffer::RBuffer;
use self::wbuffer::WBuffer;

/// File magic.
pub const MAGIC: &[u8; 4] = b"PHTB";
/// Current layout version.
pub const FORMAT_VERSION: u16 = 1;

const FLAG_FINALIZED: u8 = 0b0000_0001;
const CELL_BYTES: usize = 40;
const CHECKSUM_BYTES: usize = 8;

const TAG_IDENTITY: u8 = 0;
const TAG_LOG: u8 = 1;
const TAG_POWER: u8 = 2;

/// Serialize a table.
pub fn encode(table: &Table) -> Vec<u8> {
    let n_cells = table.n_cells() + 1;
    let mut w = WBuffer::with_capacity(256 + n_cells * CELL_BYTES);

    w.write_bytes(MAGIC);
    w.write_u16(FORMAT_VERSION);
    w.write_u8(if table.is_finalized() { FLAG_FINALIZED } else { 0 });

    let prov = table.provenance();
    w.write_u64(prov.seed);
    w.write_len(prov.seeds.len());
    for &s in &prov.seeds {
        w.write_u64(s);
    }
    w.write_u64(prov.total_events);
    w.write_f64(prov.total_weight);
    w.write_len(prov.generator_parameters.len());
    for (k, v) in &prov.generator_parameters {
        w.write_string(k);
        w.write_string(v);
    }

    w.write_len(table.value_axis());
    w.write_len(table.axes().len());
    for axis in table.axes() {
        write_axis(&mut w, axis);
    }

    w.write_u64(table.n_cells() as u64);
    for cell in table.cells() {
        write_cell(&mut w, cell);
    }
    write_cell(&mut w, table.overflow());

    let checksum = XxHash64::oneshot(0, w.as_slice());
    w.write_u64(checksum);
    w.into_inner()
}

/// Deserialize a table, verifying the checksum and every structural invariant.
pub fn decode(bytes: &[u8]) -> Result<Table> {
    if bytes.len() < MAGIC.len() + CHECKSUM_BYTES {
        return Err(Error::CorruptTable(format!("{} bytes is too short for a table", bytes.len())));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_BYTES);
    if &body[..MAGIC.len()] != MAGIC {
        return Err(Error::CorruptTable("bad magic".into()));
    }
    let stored = RBuffer::new(trailer).read_u64()?;
    let actual = XxHash64::oneshot(0, body);
    if stored != actual {
        return Err(Error::CorruptTable(format!(
            "checksum mismatch: stored {stored:016x}, computed {actual:016x}"
        )));
    }

    let mut r = RBuffer::new(body);
    r.read_bytes(MAGIC.len())?;
    let version = r.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(Error::CorruptTable(format!("unsupported format version {version}")));
    }
    let flags = r.read_u8()?;
    if flags & !FLAG_FINALIZED != 0 {
        return Err(Error::CorruptTable(format!("unknown flags {flags:#04x}")));
    }

    let seed = r.read_u64()?;
    let n_seeds = r.read_u32()? as usize;
    if n_seeds > r.remaining() / 8 {
        return Err(Error::CorruptTable(format!("{n_seeds} seeds cannot fit in the input")));
    }
    let mut seeds = BTreeSet::new();
    for _ in 0..n_seeds {
        let s = r.read_u64()?;
        if seeds.last().is_some_and(|&last| last >= s) {
            return Err(Error::CorruptTable(format!("contributing seed {s} out of order")));
        }
        seeds.insert(s);
    }
    let total_events = r.read_u64()?;
    let total_weight = r.read_f64()?;
    let n_params = r.read_u32()? as usize;
    let mut generator_parameters = BTreeMap::new();
    for _ in 0..n_params {
        let key = r.read_string()?;
        let value = r.read_string()?;
        if let Some((last, _)) = generator_parameters.last_key_value()
            && *last >= key
        {
            return Err(Error::CorruptTable(format!(
                "generator parameter '{key}' out of order after '{last}'"
            )));
        }
        generator_parameters.insert(key, value);
    }

    let value_axis = r.read_u32()? as usize;
    let n_axes = r.read_u32()? as usize;
    // Each axis needs at least 30 bytes; reject absurd counts before allocating.
    if n_axes > r.remaining() / 30 {
        return Err(Error::CorruptTable(format!("{n_axes} axes cannot fit in the input")));
    }
    let mut axes = Vec::with_capacity(n_axes);
    for i in 0..n_axes {
        axes.push(read_axis(&mut r).map_err(|e| match e {
            Error::CorruptTable(msg) => Error::CorruptTable(format!("axis {i}: {msg}")),
            other => other,
        })?);
    }

    let n_cells = r.read_u64()?;
    let stored_cells = usize::try_from(n_cells)
        .ok()
        .filter(|&n| n.checked_add(1).and_then(|n| n.checked_mul(CELL_BYTES)) == Some(r.remaining()))
        .ok_or_else(|| {
            Error::CorruptTable(format!(
                "{n_cells} cells declared but {} bytes of cell data remain",
                r.remaining()
            ))
        })?;
    let mut cells = Vec::with_capacity(stored_cells);
    for _ in 0..stored_cells {
        cells.push(read_cell(&mut r)?);
    }
    let overflow = read_cell(&mut r)?;
    debug_assert_eq!(r.remaining(), 0);

    let provenance = Provenance { seed, seeds, total_events, total_weight, generator_parameters };
    Table::from_parts(axes, cells, overflow, provenance, value_axis, flags & FLAG_FINALIZED != 0)
}

/// Write a table to `path`.
///
/// The bytes go to a sibling temporary file that is renamed over `path`, so
/// an interrupted save never leaves a truncated table behind.
pub fn save(table: &Table, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(table);
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(format!(".tmp{}", std::process::id()));
    let tmp = path.with_file_name(tmp_name);
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    log::debug!("saved table to {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Read a table from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    decode(&std::fs::read(path)?)
}

/// Checksum trailer of an encoded table, if it is long enough to carry one.
pub fn checksum(bytes: &[u8]) -> Option<u64> {
    let start = bytes.len().checked_sub(CHECKSUM_BYTES)?;
    RBuffer::new(&bytes[start..]).read_u64().ok()
}

fn write_axis(w: &mut WBuffer, axis: &Axis) {
    w.write_string(axis.label());
    w.write_string(axis.unit());
    match axis.transform() {
        Transform::Identity => w.write_u8(TAG_IDENTITY),
        Transform::Log => w.write_u8(TAG_LOG),
        Transform::Power { exponent } => {
            w.write_u8(TAG_POWER);
            w.write_f64(exponent);
        }
    }
    w.write_u8(u8::from(axis.inclusive_upper()));
    w.write_array_f64(axis.edges());
}

fn read_axis(r: &mut RBuffer<'_>) -> Result<Axis> {
    let label = r.read_string()?;
    let unit = r.read_string()?;
    let transform = match r.read_u8()? {
        TAG_IDENTITY => Transform::Identity,
        TAG_LOG => Transform::Log,
        TAG_POWER => Transform::Power { exponent: r.read_f64()? },
        tag => return Err(Error::CorruptTable(format!("unknown transform tag {tag}"))),
    };
    let inclusive_upper = match r.read_u8()? {
        0 => false,
        1 => true,
        b => return Err(Error::CorruptTable(format!("invalid inclusive_upper byte {b}"))),
    };
    let n_edges = r.read_u32()? as usize;
    let edges = r.read_array_f64(n_edges)?;
    Axis::new(label, unit, transform, edges, inclusive_upper).map_err(|e| match e {
        Error::InvalidConfig(msg) => Error::CorruptTable(msg),
        other => other,
    })
}

fn write_cell(w: &mut WBuffer, cell: &Cell) {
    w.write_u64(cell.sample_count());
    w.write_f64(cell.weight_sum());
    w.write_f64(cell.weight_sq_sum());
    w.write_f64(cell.raw_mean());
    w.write_f64(cell.m2());
}

fn read_cell(r: &mut RBuffer<'_>) -> Result<Cell> {
    let sample_count = r.read_u64()?;
    let weight_sum = r.read_f64()?;
    let weight_sq_sum = r.read_f64()?;
    let mean = r.read_f64()?;
    let m2 = r.read_f64()?;
    Ok(Cell::from_parts(sample_count, weight_sum, weight_sq_sum, mean, m2))
}
