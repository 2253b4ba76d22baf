//! # pt-table
//!
//! Photon-table accumulation engine. Weighted photon detection records are
//! binned on a set of axes (distance, angle, time, ...) and every bin keeps
//! numerically stable running statistics of the accumulated value. Tables
//! filled by independent workers merge into one, and the result persists in
//! an exact, canonical byte layout.
//!
//! ## Example
//!
//! ```
//! use pt_core::PhotonRecord;
//! use pt_table::{AxisSpec, Table, TableConfig, codec};
//!
//! let config = TableConfig::new(42)
//!     .axis(AxisSpec::uniform("r", "m", 0.0, 100.0, 10))
//!     .axis(AxisSpec::logarithmic("t", "ns", 1.0, 1e4, 20));
//! let mut table = Table::new(&config).unwrap();
//! table.ingest(PhotonRecord::new(vec![12.0, 350.0], 1.0, 0)).unwrap();
//! table.finalize();
//!
//! let bytes = codec::encode(&table);
//! assert_eq!(codec::decode(&bytes).unwrap(), table);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod axis;
pub mod binner;
pub mod codec;
pub mod config;
pub mod reduce;
pub mod table;

pub use accumulator::Cell;
pub use axis::{Axis, AxisSpec, Binning, Transform};
pub use binner::BinIndex;
pub use config::TableConfig;
pub use reduce::{accumulate_parallel, merge_tree};
pub use table::{Provenance, Table};
