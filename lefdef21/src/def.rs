//!
//! # DEF Placement Loader
//!
//! Reads the die area, placement rows, component placements, and top-level pin placements.
//! Sections without a counterpart in the database are skipped.
//!

// Std-Lib
use std::collections::HashMap;

// Crates.io
use log::{debug, warn};

// Local imports
use crate::data::*;
use crate::db::Database;
use crate::error::{DbResult, LoadStage, RefKind, ValueKind};
use crate::load::{to_dbu, LoadContext};
use crate::tokens::TokenStream;
use crate::utils::{ErrorContext, ErrorHelper};

/// Sections skipped through their `END <section>`
const SKIPPED_SECTIONS: [&str; 11] = [
    "VIAS",
    "NETS",
    "SPECIALNETS",
    "BLOCKAGES",
    "REGIONS",
    "GROUPS",
    "FILLS",
    "NONDEFAULTRULES",
    "STYLES",
    "SLOTS",
    "SCANCHAINS",
];

/// Placement of a previously declared cell
#[derive(Debug, Clone, Copy)]
pub(crate) struct CellPlacement {
    pub loc: Point,
    pub orient: Orient,
    pub fixed: bool,
}

/// Newly parsed placement content, ready to merge
#[derive(Debug, Default)]
pub(crate) struct PlacementUpdate {
    pub design_name: Option<String>,
    /// `UNITS DISTANCE MICRONS`
    pub units: Option<Int>,
    pub die: Option<Rect>,
    pub rows: Vec<Row>,
    /// Updates to existing cells, applied in order
    pub placements: Vec<(CellId, CellPlacement)>,
    /// Dummy cells, for components absent from the netlist
    pub cells: Vec<Cell>,
    pub ios: Vec<(IoId, IoPlacement)>,
}

/// # DEF Loader
pub(crate) struct DefLoader<'t, 'd> {
    cx: LoadContext<'t>,
    db: &'d Database,
    update: PlacementUpdate,
    /// Indices of new dummy cells into `update.cells`
    dummies: HashMap<String, usize>,
}
impl<'t, 'd> DefLoader<'t, 'd> {
    pub fn new(db: &'d Database, toks: &'t TokenStream) -> Self {
        Self {
            cx: LoadContext::new(toks, LoadStage::Placement),
            db,
            update: PlacementUpdate::default(),
            dummies: HashMap::new(),
        }
    }
    /// Parse the entire token stream
    pub fn load(mut self) -> DbResult<PlacementUpdate> {
        loop {
            let key = match self.cx.peek() {
                Some(key) => key,
                None => return self.cx.fail("Missing `END DESIGN`"),
            };
            match key {
                "DESIGN" => {
                    self.cx.advance();
                    let name = self.cx.get_name()?;
                    self.cx.expect(";")?;
                    self.cx.ctx.push(ErrorContext::Design(name.clone()));
                    self.update.design_name = Some(name);
                }
                "UNITS" => {
                    self.cx.advance();
                    self.cx.expect("DISTANCE")?;
                    self.cx.expect("MICRONS")?;
                    self.update.units = Some(self.cx.parse_int()?);
                    self.cx.expect(";")?;
                }
                "DIEAREA" => self.parse_die_area()?,
                "ROW" => self.parse_row()?,
                "COMPONENTS" => self.parse_components()?,
                "PINS" => self.parse_pins()?,
                "PROPERTYDEFINITIONS" => {
                    // Skipped verbatim through the next END
                    self.cx.advance();
                    self.cx.skip_past("END")?;
                    self.cx.eat("PROPERTYDEFINITIONS");
                }
                "END" if self.cx.peek_nth(1) == Some("DESIGN") => {
                    self.cx.pos += 2;
                    break;
                }
                k if SKIPPED_SECTIONS.contains(&k) => {
                    debug!("Skipping DEF section {}", k);
                    self.cx.advance();
                    self.cx.skip_block(k)?;
                }
                // Header statements: VERSION, DIVIDERCHAR, BUSBITCHARS, TRACKS, GCELLGRID, ...
                _ => self.cx.skip_past(";")?,
            }
        }
        Ok(self.update)
    }
    /// Parse `DIEAREA ( x y ) ( x y ) ... ;` into the bounding box of its points
    fn parse_die_area(&mut self) -> DbResult<()> {
        self.cx.expect("DIEAREA")?;
        self.cx.ctx.push(ErrorContext::DieArea);
        let mut points = Vec::new();
        while self.cx.matches("(") {
            let (x, y) = self.cx.parse_point()?;
            points.push(Point::new(x, y));
        }
        self.cx.assert(points.len() >= 2, "DIEAREA requires at least two points")?;
        self.cx.expect(";")?;
        let die = points
            .iter()
            .fold(Rect::empty(), |acc, p| acc.union(&Rect::from_points(*p, *p)));
        self.update.die = Some(die);
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse `ROW <name> <site> <x> <y> <orient> [DO <nx> BY <ny> [STEP <sx> <sy>]] ;`
    fn parse_row(&mut self) -> DbResult<()> {
        let db = self.db;
        self.cx.expect("ROW")?;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Row(name.clone()));
        let site_name = self.cx.expect_some()?;
        let site_id = match db.lib.site_id(site_name) {
            Some(id) => id,
            None => return self.cx.missing(RefKind::Site, site_name),
        };
        self.cx.advance();
        let x = self.cx.parse_int()?;
        let y = self.cx.parse_int()?;
        let orient = self.cx.parse_enum::<Orient>(ValueKind::Orient)?;
        if orient != Orient::N {
            warn!("ROW {} orientation {} treated as N", name, orient);
        }
        let (mut num_x, mut num_y) = (1, 1);
        let mut step = Point::default();
        if self.cx.eat("DO") {
            num_x = self.cx.parse_int()?;
            self.cx.expect("BY")?;
            num_y = self.cx.parse_int()?;
            if self.cx.eat("STEP") {
                step.x = self.cx.parse_int()?;
                step.y = self.cx.parse_int()?;
            }
        }
        // Remaining attributes, e.g. `+ PROPERTY`
        self.cx.skip_past(";")?;

        let site = &db.lib.sites[site_id.index()];
        let dbu = db.dbu();
        let size = Point::new(
            to_dbu(site.size.0 * LefDecimal::from(num_x), dbu)?,
            to_dbu(site.size.1 * LefDecimal::from(num_y), dbu)?,
        );
        self.update.rows.push(Row {
            name,
            site: site_id,
            origin: Point::new(x, y),
            orient: Orient::N,
            num_x,
            num_y,
            step,
            size,
        });
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse the `COMPONENTS` section
    fn parse_components(&mut self) -> DbResult<()> {
        self.cx.expect("COMPONENTS")?;
        self.cx.ctx.push(ErrorContext::Components);
        let count = self.cx.parse_int()?;
        self.cx.expect(";")?;
        let mut num = 0;
        while !self.cx.eat("END") {
            self.cx.expect("-")?;
            self.parse_component()?;
            num += 1;
        }
        self.cx.expect("COMPONENTS")?;
        if num != count {
            warn!("COMPONENTS declares {} entries, found {}", count, num);
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a component, `- <inst> <macro> [+ <attr> ...] ;`
    fn parse_component(&mut self) -> DbResult<()> {
        let db = self.db;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Component(name.clone()));
        let mac_name = self.cx.expect_some()?;
        let mac_id = match db.lib.macro_id(mac_name) {
            Some(id) => id,
            None => return self.cx.missing(RefKind::Macro, mac_name),
        };
        self.cx.advance();
        let mut placement = None;
        while !self.cx.eat(";") {
            self.cx.expect("+")?;
            match self.cx.next()? {
                status @ ("PLACED" | "FIXED" | "COVER") => {
                    let (x, y) = self.cx.parse_point()?;
                    let orient = self.cx.parse_enum::<Orient>(ValueKind::Orient)?;
                    placement = Some(CellPlacement {
                        loc: Point::new(x, y),
                        orient,
                        fixed: status != "PLACED",
                    });
                }
                "UNPLACED" => placement = None,
                _ => self.skip_attr()?,
            }
        }

        if let Some(id) = db.cell_ids.get(&name).copied() {
            // Declared in the netlist. Its size stays as created.
            let cell = &db.cells[id.index()];
            if cell.lef_macro != mac_id {
                warn!(
                    "Component {} is a {} in DEF, but a {} in the netlist",
                    name, mac_name, db.lib.macros[cell.lef_macro.index()].name
                );
            }
            if let Some(p) = placement {
                self.update.placements.push((id, p));
            }
        } else if let Some(idx) = self.dummies.get(&name).copied() {
            debug!("Component {} repeated", name);
            if let Some(p) = placement {
                let cell = &mut self.update.cells[idx];
                cell.loc = p.loc;
                cell.orient = p.orient;
                cell.fixed = p.fixed;
                cell.placed = true;
            }
        } else {
            debug!("Component {} is not in the netlist, adding a dummy cell", name);
            let mac = &db.lib.macros[mac_id.index()];
            let dbu = db.dbu();
            let size = Point::new(to_dbu(mac.size.0, dbu)?, to_dbu(mac.size.1, dbu)?);
            let id = CellId::new(db.cells.len() + self.update.cells.len());
            self.dummies.insert(name.clone(), self.update.cells.len());
            self.update.cells.push(Cell {
                id,
                name,
                lef_macro: mac_id,
                class: mac.class.into(),
                loc: placement.map(|p| p.loc).unwrap_or_default(),
                orient: placement.map(|p| p.orient).unwrap_or_default(),
                size,
                fixed: placement.map(|p| p.fixed).unwrap_or(false),
                placed: placement.is_some(),
                dummy: true,
                pins: Vec::new(),
            });
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse the `PINS` section
    fn parse_pins(&mut self) -> DbResult<()> {
        self.cx.expect("PINS")?;
        self.cx.ctx.push(ErrorContext::Pins);
        let count = self.cx.parse_int()?;
        self.cx.expect(";")?;
        let mut num = 0;
        while !self.cx.eat("END") {
            self.cx.expect("-")?;
            self.parse_io_pin()?;
            num += 1;
        }
        self.cx.expect("PINS")?;
        if num != count {
            warn!("PINS declares {} entries, found {}", count, num);
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a top-level pin, `- <name> + NET <net> [+ <attr> ...] ;`
    fn parse_io_pin(&mut self) -> DbResult<()> {
        let db = self.db;
        let start = self.cx.pos;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::IoPin(name.clone()));
        let mut placement = IoPlacement::default();
        let mut direction = None;
        while !self.cx.eat(";") {
            self.cx.expect("+")?;
            match self.cx.next()? {
                "NET" => {
                    let net = self.cx.get_name()?;
                    if net != name {
                        debug!("Pin {} is on net {}", name, net);
                    }
                }
                "DIRECTION" => {
                    direction = Some(self.cx.parse_enum::<PinDirection>(ValueKind::PinDirection)?)
                }
                status @ ("PLACED" | "FIXED" | "COVER") => {
                    let (x, y) = self.cx.parse_point()?;
                    let orient = self.cx.parse_enum::<Orient>(ValueKind::Orient)?;
                    if orient != Orient::N {
                        warn!("Pin {} orientation {} is not applied to its shapes", name, orient);
                    }
                    placement.origin = Point::new(x, y);
                    placement.orient = orient;
                    placement.placed = true;
                    placement.fixed = status != "PLACED";
                }
                "LAYER" => {
                    let layer = self.cx.get_name()?;
                    // Skip optional `MASK`, `SPACING` and `DESIGNRULEWIDTH` qualifiers
                    while !self.cx.matches("(") {
                        self.cx.next()?;
                    }
                    let (lx, ly) = self.cx.parse_point()?;
                    let (ux, uy) = self.cx.parse_point()?;
                    placement.shapes.push(IoShape {
                        layer,
                        rect: Rect::from_points(Point::new(lx, ly), Point::new(ux, uy)),
                    });
                }
                // Multi-port pins list their ports in sequence. All shapes are kept together.
                "PORT" => (),
                _ => self.skip_attr()?,
            }
        }

        let id = match db.io_ids.get(&name).copied() {
            Some(id) => id,
            None if db.netlist_loaded => {
                self.cx.pos = start;
                return self.cx.missing(RefKind::Pin, name);
            }
            None => {
                warn!("Pin {} has no netlist port, and is skipped", name);
                self.cx.ctx.pop();
                return Ok(());
            }
        };
        let io = &db.ios[id.index()];
        match direction {
            Some(dir) if dir != io.direction => warn!(
                "Pin {} is {} in DEF, but {} in the netlist",
                name, dir, io.direction
            ),
            _ => (),
        }
        self.update.ios.push((id, placement));
        self.cx.ctx.pop();
        Ok(())
    }
    /// Skip an unmodeled `+` attribute, up to the next `+` or `;`
    fn skip_attr(&mut self) -> DbResult<()> {
        while !self.cx.matches("+") && !self.cx.matches(";") {
            self.cx.next()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{tokenize_str, DEF_TOKENS};
    use crate::DbError;

    fn library() -> DbResult<Database> {
        let mut db = Database::new();
        db.load_library_str(
            r#"
            SITE core CLASS CORE ; SIZE 0.2 BY 1.4 ; END core
            MACRO INV CLASS CORE ; SITE core ; SIZE 0.4 BY 1.4 ; END INV
            END LIBRARY
            "#,
        )?;
        Ok(db)
    }

    #[test]
    fn it_parses_die_area() -> DbResult<()> {
        let db = library()?;
        let toks = tokenize_str(
            "DIEAREA ( 0 0 ) ( 5000 0 ) ( 5000 3000 ) ( 0 3000 ) ; END DESIGN",
            &DEF_TOKENS,
        )?;
        let update = DefLoader::new(&db, &toks).load()?;
        assert_eq!(
            update.die,
            Some(Rect::from_points(Point::new(0, 0), Point::new(5000, 3000)))
        );
        Ok(())
    }
    #[test]
    fn it_rejects_single_point_die() -> DbResult<()> {
        let db = library()?;
        let toks = tokenize_str("DIEAREA ( 0 0 ) ; END DESIGN", &DEF_TOKENS)?;
        let res = DefLoader::new(&db, &toks).load();
        assert!(matches!(res, Err(DbError::Syntax { .. })));
        Ok(())
    }
    #[test]
    fn it_requires_end_design() -> DbResult<()> {
        let db = library()?;
        let toks = tokenize_str("DESIGN top ; DIEAREA ( 0 0 ) ( 10 10 ) ;", &DEF_TOKENS)?;
        match DefLoader::new(&db, &toks).load() {
            Err(DbError::Syntax { state, .. }) => assert_eq!(state.token, "EOF"),
            other => panic!("Expected Syntax, got {:?}", other),
        }
        Ok(())
    }
    #[test]
    fn it_sizes_rows() -> DbResult<()> {
        let db = library()?;
        let toks = tokenize_str(
            "ROW r0 core 0 1400 FS DO 10 BY 1 STEP 200 0 ; END DESIGN",
            &DEF_TOKENS,
        )?;
        let update = DefLoader::new(&db, &toks).load()?;
        let row = &update.rows[0];
        assert_eq!(row.orient, Orient::N);
        assert_eq!(row.size, Point::new(2000, 1400));
        assert_eq!(row.step, Point::new(200, 0));
        Ok(())
    }
    #[test]
    fn it_skips_sections() -> DbResult<()> {
        let db = library()?;
        let toks = tokenize_str(
            r#"
            VERSION 5.8 ;
            BUSBITCHARS "[]" ;
            NETS 1 ;
              - n ( g0 A ) ( g1 Y ) ;
            END NETS
            COMPONENTS 1 ;
              - g0 INV + SOURCE NETLIST + FIXED ( 10 20 ) FS ;
            END COMPONENTS
            END DESIGN
            "#,
            &DEF_TOKENS,
        )?;
        let update = DefLoader::new(&db, &toks).load()?;
        assert_eq!(update.cells.len(), 1);
        let cell = &update.cells[0];
        assert!(cell.dummy && cell.fixed && cell.placed);
        assert_eq!(cell.orient, Orient::FS);
        assert_eq!(cell.loc, Point::new(10, 20));
        Ok(())
    }
}
