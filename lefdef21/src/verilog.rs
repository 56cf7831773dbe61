//!
//! # Structural Verilog Netlist Loader
//!
//! Reads a single flat `module`: its port and wire declarations, and instances of library macros.
//! Bus declarations are bit-blasted, and concatenated connections expanded one pin per bit.
//!

// Std-Lib
use std::collections::HashMap;

// Crates.io
use log::{debug, info, warn};

// Local imports
use crate::data::*;
use crate::db::{Database, PortCounts};
use crate::error::{DbResult, LoadStage, RefKind};
use crate::load::{to_dbu, LoadContext};
use crate::tokens::TokenStream;
use crate::utils::{ErrorContext, ErrorHelper};

/// Nets or instances between progress notices
const PROGRESS_INTERVAL: usize = 200_000;

/// Newly parsed netlist content, ready to merge and link
#[derive(Debug, Default)]
pub(crate) struct NetlistUpdate {
    pub module_name: String,
    pub cells: Vec<Cell>,
    /// Existing dummy cells, now declared by the netlist
    pub claimed: Vec<CellId>,
    pub nets: Vec<Net>,
    pub ios: Vec<Io>,
    /// Pins, in creation order
    pub pins: Vec<Pin>,
    pub ports: PortCounts,
}

/// Parsed content of a connection's parentheses
#[derive(Debug, PartialEq, Eq)]
enum Connection {
    /// `.A()`
    Empty,
    /// `.A(n)`. `None` for tied-off constants.
    Single(Option<String>),
    /// `.A({x, y, z})`, most-significant first
    Concat(Vec<Option<String>>),
}

/// Instance being connected
#[derive(Debug, Clone, Copy)]
struct Instance<'n> {
    cell: CellId,
    lef_macro: MacroId,
    name: &'n str,
}

/// # Verilog Loader
pub(crate) struct VerilogLoader<'t, 'd> {
    cx: LoadContext<'t>,
    db: &'d Database,
    update: NetlistUpdate,
    cell_ids: HashMap<String, CellId>,
    net_ids: HashMap<String, NetId>,
    io_ids: HashMap<String, IoId>,
    num_assigns: usize,
}
impl<'t, 'd> VerilogLoader<'t, 'd> {
    pub fn new(db: &'d Database, toks: &'t TokenStream) -> Self {
        Self {
            cx: LoadContext::new(toks, LoadStage::Netlist),
            db,
            update: NetlistUpdate::default(),
            cell_ids: HashMap::new(),
            net_ids: HashMap::new(),
            io_ids: HashMap::new(),
            num_assigns: 0,
        }
    }
    /// Parse the entire token stream
    pub fn load(mut self) -> DbResult<NetlistUpdate> {
        while !self.cx.done() && !self.cx.matches("module") {
            self.cx.advance();
        }
        self.cx.expect("module")?;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Module(name.clone()));
        self.update.module_name = name;
        // Port names are declared again in the body. Skip the header list.
        self.cx.skip_past(";")?;
        loop {
            let key = self.cx.expect_some()?;
            match key {
                "endmodule" => {
                    self.cx.advance();
                    break;
                }
                "input" => self.parse_decl(Some(PinDirection::Input))?,
                "output" => self.parse_decl(Some(PinDirection::Output))?,
                "inout" => self.parse_decl(Some(PinDirection::Inout))?,
                "wire" | "tri" => self.parse_decl(None)?,
                "assign" => {
                    // Continuous assignments are not modeled
                    self.cx.skip_past(";")?;
                    self.num_assigns += 1;
                }
                _ => self.parse_instance()?,
            }
        }
        if self.num_assigns > 0 {
            warn!(
                "Skipped {} assign statements in module {}",
                self.num_assigns, self.update.module_name
            );
        }
        self.cx.ctx.pop();
        Ok(self.update)
    }
    /// Parse a port or wire declaration.
    /// `dir` is `Some` for ports, and `None` for wires.
    fn parse_decl(&mut self, dir: Option<PinDirection>) -> DbResult<()> {
        let kw = self.cx.next()?;
        self.cx.ctx.push(ErrorContext::Declaration(kw.to_string()));
        if dir.is_some() && !self.cx.eat("wire") {
            self.cx.eat("reg");
        }
        let msb = if self.cx.matches("[") {
            Some(self.parse_range()?)
        } else {
            None
        };
        loop {
            let name = self.parse_ident()?;
            match msb {
                None => self.declare(name, dir),
                Some(msb) => {
                    for bit in 0..=msb {
                        self.declare(format!("{}[{}]", name, bit), dir);
                    }
                }
            }
            if self.cx.eat(",") {
                continue;
            }
            self.cx.expect(";")?;
            break;
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a `[msb:0]` bus range, returning `msb`
    fn parse_range(&mut self) -> DbResult<usize> {
        self.cx.expect("[")?;
        let msb = self.cx.parse_int()?;
        self.cx.expect(":")?;
        let lsb = self.cx.parse_int()?;
        if lsb != 0 || msb < 0 {
            self.cx.pos -= 1;
            return self.cx.fail(format!(
                "Unsupported bus range [{}:{}], only [N:0] is supported",
                msb, lsb
            ));
        }
        self.cx.expect("]")?;
        Ok(msb as usize)
    }
    /// Parse an identifier, rejecting punctuation
    fn parse_ident(&mut self) -> DbResult<String> {
        let txt = self.cx.expect_some()?;
        if is_punct(txt) {
            return self.cx.fail("Expected identifier");
        }
        self.cx.advance();
        Ok(txt.to_string())
    }
    /// Look up a net, among both new and previously loaded nets
    fn net_id(&self, name: &str) -> Option<NetId> {
        self.net_ids
            .get(name)
            .or_else(|| self.db.net_ids.get(name))
            .copied()
    }
    /// Declare a single scalar net, and for ports, its [Io] and external [Pin]
    fn declare(&mut self, name: String, dir: Option<PinDirection>) {
        let net = match self.net_id(&name) {
            Some(id) => {
                debug!("Net {} already declared", name);
                id
            }
            None => self.add_net(name.clone()),
        };
        let dir = match dir {
            Some(dir) => dir,
            None => return,
        };
        if self.io_ids.contains_key(&name) || self.db.io_ids.contains_key(&name) {
            warn!("Duplicate port {}, keeping the first declaration", name);
            return;
        }
        let io = IoId::new(self.db.ios.len() + self.update.ios.len());
        let pin = PinId::new(self.db.pins.len() + self.update.pins.len());
        self.update.pins.push(Pin {
            id: pin,
            name: name.clone(),
            net,
            kind: PinKind::External { io },
            offset: Point::default(),
        });
        self.update.ios.push(Io {
            id: io,
            name: name.clone(),
            direction: dir,
            net,
            pin: None,
            placement: IoPlacement::default(),
        });
        self.io_ids.insert(name, io);
        let ports = &mut self.update.ports;
        match dir {
            PinDirection::Input => ports.num_pi += 1,
            PinDirection::Output => ports.num_po += 1,
            PinDirection::Inout => ports.num_inout += 1,
        }
    }
    fn add_net(&mut self, name: String) -> NetId {
        let id = NetId::new(self.db.nets.len() + self.update.nets.len());
        self.net_ids.insert(name.clone(), id);
        self.update.nets.push(Net {
            id,
            name,
            pins: Vec::new(),
        });
        let num = self.update.nets.len();
        if num % PROGRESS_INTERVAL == 0 {
            info!("{} nets parsed", num);
        }
        id
    }
    /// Parse a macro instance, `<macro> <name> ( .<port>(<net>), ... ) ;`
    fn parse_instance(&mut self) -> DbResult<()> {
        let db = self.db;
        let mac_name = self.cx.expect_some()?;
        let mac_id = match db.lib.macro_id(mac_name) {
            Some(id) => id,
            None => return self.cx.missing(RefKind::Macro, mac_name),
        };
        self.cx.advance();
        let name = self.parse_ident()?;
        self.cx.ctx.push(ErrorContext::Instance(name.clone()));
        // Dummy cells from an earlier placement are claimed by the netlist, keeping their ids
        let existing = db.cell_ids.get(&name).map(|id| &db.cells[id.index()]);
        let claimed = existing.filter(|cell| cell.dummy);
        if self.cell_ids.contains_key(&name) || (existing.is_some() && claimed.is_none()) {
            warn!("Duplicate instance {}, keeping the first declaration", name);
            self.cx.skip_past(";")?;
            self.cx.ctx.pop();
            return Ok(());
        }
        if !self.cx.matches("(") {
            return self.cx.fail("Expected `(` to open port connections");
        }
        let inst = match claimed {
            Some(cell) => {
                if cell.lef_macro != mac_id {
                    warn!(
                        "Instance {} is a {} in the netlist, but a {} in DEF",
                        name, mac_name, db.lib.macros[cell.lef_macro.index()].name
                    );
                }
                Instance {
                    cell: cell.id,
                    lef_macro: cell.lef_macro,
                    name: &name,
                }
            }
            None => Instance {
                cell: CellId::new(db.cells.len() + self.update.cells.len()),
                lef_macro: mac_id,
                name: &name,
            },
        };
        let cell = inst.cell;
        let toks = self.cx.toks;
        let start = self.cx.pos;
        let close = toks.on_next_parens(start, |pos, txt| self.bind(pos, txt, inst))?;
        if close >= toks.len() {
            self.cx.pos = start;
            return self.cx.fail("Unmatched `(` in port connections");
        }
        self.cx.pos = close + 1;
        self.cx.expect(";")?;

        self.cell_ids.insert(name.clone(), cell);
        if claimed.is_some() {
            debug!("Instance {} claims its placed component", name);
            self.update.claimed.push(cell);
            self.cx.ctx.pop();
            return Ok(());
        }
        let mac = &db.lib.macros[mac_id.index()];
        let dbu = db.dbu();
        let size = Point::new(to_dbu(mac.size.0, dbu)?, to_dbu(mac.size.1, dbu)?);
        self.update.cells.push(Cell {
            id: cell,
            name,
            lef_macro: mac_id,
            class: mac.class.into(),
            loc: Point::default(),
            orient: Orient::N,
            size,
            fixed: false,
            placed: false,
            dummy: false,
            pins: Vec::new(),
        });
        let num = self.update.cells.len();
        if num % PROGRESS_INTERVAL == 0 {
            info!("{} instances parsed", num);
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Bracket-scanner callback: bind one `.port(...)` connection at `pos`.
    /// Returns the position following the connection.
    fn bind(&mut self, pos: usize, txt: &str, inst: Instance) -> DbResult<usize> {
        self.cx.pos = pos;
        if txt == "," {
            return Ok(pos + 1);
        }
        let port = match txt.strip_prefix('.') {
            Some(port) if !port.is_empty() => port,
            _ => return self.cx.fail("Positional port connections are not supported"),
        };
        let toks = self.cx.toks;
        let (open, close) = match toks.match_parens(pos + 1) {
            Some((open, close)) if open == pos + 1 => (open, close),
            _ => {
                self.cx.pos = pos + 1;
                return self.cx.fail(format!("Expected `(` after port {}", port));
            }
        };
        match self.connection(open + 1, close)? {
            Connection::Empty | Connection::Single(None) => (),
            Connection::Single(Some(net)) => self.connect(port.to_string(), &net, inst)?,
            Connection::Concat(nets) => {
                let len = nets.len();
                for (k, net) in nets.iter().enumerate() {
                    if let Some(net) = net {
                        self.connect(format!("{}[{}]", port, len - 1 - k), net, inst)?;
                    }
                }
            }
        }
        Ok(close + 1)
    }
    /// Parse the tokens in `[start, stop)` as a [Connection]
    fn connection(&mut self, start: usize, stop: usize) -> DbResult<Connection> {
        let toks = self.cx.toks;
        if start == stop {
            return Ok(Connection::Empty);
        }
        if toks.txt(start) != "{" {
            let (net, next) = self.net_ref(start)?;
            if next != stop {
                self.cx.pos = next;
                return self.cx.fail("Unexpected token in connection");
            }
            return Ok(Connection::Single(net));
        }
        if toks.txt(stop - 1) != "}" {
            self.cx.pos = stop - 1;
            return self.cx.fail("Expected `}` closing concatenation");
        }
        let mut nets = Vec::new();
        let mut pos = start + 1;
        while pos < stop - 1 {
            let (net, next) = self.net_ref(pos)?;
            nets.push(net);
            pos = next;
            if toks.txt(pos) == "," {
                pos += 1;
            } else if pos != stop - 1 {
                self.cx.pos = pos;
                return self.cx.fail("Expected `,` in concatenation");
            }
        }
        Ok(Connection::Concat(nets))
    }
    /// Parse one net reference at `pos`: `n`, `n[3]`, or a constant.
    /// Returns the net name (`None` for constants) and the following position.
    fn net_ref(&mut self, pos: usize) -> DbResult<(Option<String>, usize)> {
        let toks = self.cx.toks;
        self.cx.pos = pos;
        let txt = toks.txt(pos);
        if is_punct(txt) {
            return self.cx.fail("Expected net name");
        }
        if txt.contains('\'') || txt.starts_with(|c: char| c.is_ascii_digit()) {
            // Constant tie-off, not connected to any net
            return Ok((None, pos + 1));
        }
        if toks.txt(pos + 1) != "[" {
            return Ok((Some(txt.to_string()), pos + 1));
        }
        self.cx.pos = pos + 2;
        let bit = self.cx.parse_int()?;
        self.cx.expect("]")?;
        Ok((Some(format!("{}[{}]", txt, bit)), pos + 4))
    }
    /// Create an internal pin named `<pin>:<instance>` on net `net`
    fn connect(&mut self, pin: String, net: &str, inst: Instance) -> DbResult<()> {
        let db = self.db;
        let net = match self.net_id(net) {
            Some(id) => id,
            None => return self.cx.missing(RefKind::Net, net),
        };
        let mac = &db.lib.macros[inst.lef_macro.index()];
        // Bus-bit pins fall back to their base name, for macros declaring a single bus pin
        let base = pin.split('[').next().unwrap_or(pin.as_str());
        let index = match mac.pin_index(&pin).or_else(|| mac.pin_index(base)) {
            Some(idx) => idx,
            None => return self.cx.missing(RefKind::MacroPin, format!("{}/{}", mac.name, pin)),
        };
        let center = mac.pins[index].center();
        let dbu = db.dbu();
        let offset = Point::new(
            to_dbu(center.x + mac.origin.x, dbu)?,
            to_dbu(center.y + mac.origin.y, dbu)?,
        );
        let id = PinId::new(db.pins.len() + self.update.pins.len());
        self.update.pins.push(Pin {
            id,
            name: format!("{}:{}", pin, inst.name),
            net,
            kind: PinKind::Internal {
                cell: inst.cell,
                lef_pin: LefPinRef {
                    lef_macro: inst.lef_macro,
                    index,
                },
            },
            offset,
        });
        Ok(())
    }
}

/// Boolean indication of a punctuation token
fn is_punct(txt: &str) -> bool {
    matches!(
        txt,
        "(" | ")" | "," | ":" | ";" | "[" | "]" | "{" | "}" | "="
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{tokenize_str, VERILOG_TOKENS};

    fn loader_for<'t, 'd>(db: &'d Database, toks: &'t TokenStream) -> VerilogLoader<'t, 'd> {
        VerilogLoader::new(db, toks)
    }

    #[test]
    fn it_parses_connections() -> DbResult<()> {
        let db = Database::new();
        let toks = tokenize_str("( ) ( n ) ( n [ 3 ] ) ( { a , 1'b0 , c [ 0 ] } )", &VERILOG_TOKENS)?;
        let mut loader = loader_for(&db, &toks);
        assert_eq!(loader.connection(1, 1)?, Connection::Empty);
        assert_eq!(loader.connection(3, 4)?, Connection::Single(Some("n".into())));
        assert_eq!(
            loader.connection(6, 10)?,
            Connection::Single(Some("n[3]".into()))
        );
        assert_eq!(
            loader.connection(12, 22)?,
            Connection::Concat(vec![Some("a".into()), None, Some("c[0]".into())])
        );
        Ok(())
    }
    #[test]
    fn it_rejects_unterminated_concat() -> DbResult<()> {
        let db = Database::new();
        let toks = tokenize_str("( { a , b )", &VERILOG_TOKENS)?;
        let mut loader = loader_for(&db, &toks);
        assert!(loader.connection(1, 5).is_err());
        Ok(())
    }
}
