//!
//! # LefDef21 Design Database
//!
//! Loads a physical design from three interlocking text formats:
//!
//! * [LEF](https://en.wikipedia.org/wiki/Library_Exchange_Format) libraries, describing reusable cell templates ([Macro]s) and placement [Site]s
//! * Structural Verilog netlists, describing a flat module's ports, wires, and macro instances
//! * [DEF](https://en.wikipedia.org/wiki/Design_Exchange_Format) placements, describing the die, placement rows, and placed coordinates of instances and ports
//!
//! and assembles them into a single cross-referenced [Database].
//!
//! Loads must run in order: library first, then netlist, then placement.
//! Each is all-or-nothing; a failed load leaves nothing it parsed visible.
//!
//! ```no_run
//! use lefdef21::Database;
//!
//! let mut db = Database::new();
//! db.load_library("cells.lef")?;
//! db.load_netlist("top.v")?;
//! db.load_placement("top.def")?;
//! println!("{}", db.summary());
//! # Ok::<(), lefdef21::DbError>(())
//! ```
//!
//! All cross-references between entities are dense integer ids ([CellId], [NetId], [PinId], [IoId], and friends),
//! each indexing into one of the [Database]'s append-only arenas.
//!
//! Library dimensions are held as exact decimals ([LefDecimal]),
//! and converted to integer database units at the scale set by the LEF `UNITS` block.
//!

// Internal modules & re-exports
pub use lefdef21utils as utils;

mod data;
pub use data::*;
mod db;
pub use db::*;
mod error;
pub use error::*;
pub mod tokens;

mod def;
mod lef;
mod load;
mod verilog;

#[cfg(test)]
mod tests;
