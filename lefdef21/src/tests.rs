use super::*;
use crate::utils::SerializationFormat::{Json, Yaml};

/// Load the single-inverter design, in all three stages
fn load_top() -> DbResult<Database> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    db.load_netlist(resource("top.v"))?;
    db.load_placement(resource("top.def"))?;
    Ok(db)
}
/// Load the bus-heavy design, in all three stages
fn load_busy() -> DbResult<Database> {
    let mut db = Database::new();
    db.load_library(resource("cells.lef"))?;
    db.load_netlist(resource("bus.v"))?;
    db.load_placement(resource("bus.def"))?;
    Ok(db)
}

#[test]
fn it_loads_top() -> DbResult<()> {
    let db = load_top()?;
    let golden: DesignSummary = Yaml.from_str(
        r#"
        design_name: top
        module_name: top
        num_pi: 1
        num_po: 1
        num_inout: 0
        num_inst: 1
        num_dummy: 0
        num_net: 3
        num_pin: 4
        num_row: 1
        dbu: 1000
        metrics:
          die_area: 48000000
          core_area: 10000000
          total_inst_area: 2000000
          stdcell_area: 2000000
          macro_area: 0
          utilization: 0.2
          density: 0.2
        "#,
    )?;
    assert_eq!(db.summary(), golden);
    Ok(())
}
#[test]
fn it_links_top() -> DbResult<()> {
    let db = load_top()?;

    let g0 = db.cell_by_name("g0").ok_or("missing g0")?;
    assert_eq!(g0.id, CellId::new(0));
    assert_eq!(g0.class, CellClass::StdCell);
    assert_eq!(g0.size, Point::new(1000, 2000));
    assert!(g0.placed && !g0.fixed && !g0.dummy);
    assert_eq!(g0.pins, vec![PinId::new(2), PinId::new(3)]);

    // Port pins come first, in declaration order
    let names: Vec<&str> = db.pins().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["a", "y", "A:g0", "Y:g0"]);

    let a = db.net_by_name("a").ok_or("missing net a")?;
    assert_eq!(a.pins, vec![PinId::new(0), PinId::new(2)]);
    let n = db.net_by_name("n").ok_or("missing net n")?;
    assert_eq!(n.pins, vec![PinId::new(3)]);

    // Every pin appears in its net's list
    for pin in db.pins() {
        let net = db.net(pin.net).ok_or("dangling net")?;
        assert!(net.pins.contains(&pin.id));
    }

    let pin = db.pin(PinId::new(2)).ok_or("missing pin")?;
    assert_eq!(pin.cell(), Some(g0.id));
    assert_eq!(pin.offset, Point::new(200, 1000));
    match pin.kind {
        PinKind::Internal { lef_pin, .. } => {
            let mac = db.lef_macro(lef_pin.lef_macro).ok_or("missing macro")?;
            assert_eq!(mac.name, "INV");
            assert_eq!(mac.pins[lef_pin.index].name, "A");
        }
        _ => panic!("Expected an internal pin"),
    }
    assert_eq!(db.pin_location(PinId::new(2)), Some(Point::new(200, 1000)));
    Ok(())
}
#[test]
fn it_places_ports() -> DbResult<()> {
    let db = load_top()?;
    let a = db.io_by_name("a").ok_or("missing port a")?;
    assert_eq!(a.direction, PinDirection::Input);
    assert_eq!(a.pin, Some(PinId::new(0)));
    assert!(a.placement.placed && a.placement.fixed);
    assert_eq!(a.placement.origin, Point::new(0, 2000));
    assert_eq!(a.placement.shapes.len(), 1);
    assert_eq!(a.placement.shapes[0].layer, "M1");
    assert_eq!(db.pin_location(PinId::new(0)), Some(Point::new(0, 2100)));

    let y = db.io_by_name("y").ok_or("missing port y")?;
    assert_eq!(y.placement.orient, Orient::S);
    assert!(y.placement.placed && !y.placement.fixed);
    assert_eq!(db.pin_location(PinId::new(1)), Some(Point::new(12000, 2100)));

    assert_eq!(
        db.die().die,
        Rect::from_points(Point::new(0, 0), Point::new(12000, 4000))
    );
    assert_eq!(
        db.die().core,
        Rect::from_points(Point::new(0, 0), Point::new(10000, 1000))
    );
    Ok(())
}
#[test]
fn it_loads_busy() -> DbResult<()> {
    let db = load_busy()?;
    let golden: DesignSummary = Yaml.from_str(
        r#"
        design_name: busy
        module_name: busy
        num_pi: 6
        num_po: 2
        num_inout: 1
        num_inst: 7
        num_dummy: 2
        num_net: 14
        num_pin: 25
        num_row: 2
        dbu: 2000
        metrics:
          die_area: 6400000000
          core_area: 256000000
          total_inst_area: 49920000
          stdcell_area: 17920000
          macro_area: 32000000
          utilization: 0.195
          density: 0.08
        "#,
    )?;
    assert_eq!(db.summary(), golden);
    let lib = db.library_summary();
    assert_eq!(lib.num_macros, 7);
    assert_eq!(lib.num_sites, 1);
    assert_eq!(lib.dbu, 2000);
    Ok(())
}
#[test]
fn it_parses_library_classes() -> DbResult<()> {
    let db = load_busy()?;
    let class = |name: &str| db.macro_by_name(name).map(|m| m.class);
    assert_eq!(class("INV_X1"), Some(MacroClass::Core));
    assert_eq!(class("FILL1"), Some(MacroClass::CoreSpacer));
    assert_eq!(class("TAP"), Some(MacroClass::EndCap));
    assert_eq!(class("IOPAD"), Some(MacroClass::Pad));
    assert_eq!(class("RAM32"), Some(MacroClass::Block));

    // Blocks may name sites outside the library
    let ram = db.macro_by_name("RAM32").ok_or("missing RAM32")?;
    assert_eq!(ram.site, None);
    assert!(ram.is_block());
    let clk = ram.pin("CLK").ok_or("missing CLK")?;
    assert_eq!(clk.usage, PinUsage::Clock);
    assert!(ram.pin("NC").ok_or("missing NC")?.shapes.is_empty());

    let pad = db.macro_by_name("IOPAD").ok_or("missing IOPAD")?;
    assert_eq!(pad.pins[0].direction, PinDirection::Output);

    let inv = db.macro_by_name("INV_X1").ok_or("missing INV_X1")?;
    assert_eq!(inv.site, db.library().site_id("unit"));
    assert_eq!(inv.size, (LefDecimal::new(4, 1), LefDecimal::new(16, 1)));
    let names: Vec<&str> = inv.pins.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "ZN", "VDD", "VSS"]);
    assert_eq!(inv.pins[3].usage, PinUsage::Ground);
    Ok(())
}
#[test]
fn it_expands_buses() -> DbResult<()> {
    let db = load_busy()?;
    for bit in 0..4 {
        let name = format!("a[{}]", bit);
        let io = db.io_by_name(&name).ok_or("missing bus port")?;
        assert_eq!(io.direction, PinDirection::Input);
        assert!(db.net_by_name(&format!("n[{}]", bit)).is_some());
    }
    assert_eq!(
        db.io_by_name("pad").map(|io| io.direction),
        Some(PinDirection::Inout)
    );

    // Concatenations bind most-significant first
    let m0 = db.cell_by_name("m0").ok_or("missing m0")?;
    let bound: Vec<(String, String)> = m0
        .pins
        .iter()
        .filter_map(|id| db.pin(*id))
        .map(|p| {
            let net = db.net(p.net).map(|n| n.name.clone()).unwrap_or_default();
            (p.name.clone(), net)
        })
        .collect();
    let expected = [
        ("D[3]:m0", "n[3]"),
        ("D[2]:m0", "n[2]"),
        ("D[1]:m0", "n[1]"),
        ("D[0]:m0", "n[0]"),
        ("S[1]:m0", "sel[1]"),
        ("S[0]:m0", "sel[0]"),
        ("Z:m0", "y"),
    ];
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(p, n)| (p.to_string(), n.to_string()))
        .collect();
    assert_eq!(bound, expected);

    // Constants and empty connections create no pins
    let g0 = db.cell_by_name("g0").ok_or("missing g0")?;
    assert_eq!(g0.pins.len(), 2);
    let ram = db.cell_by_name("ram").ok_or("missing ram")?;
    let names: Vec<&str> = ram
        .pins
        .iter()
        .filter_map(|id| db.pin(*id))
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["CLK:ram", "ADDR[1]:ram", "ADDR[0]:ram"]);
    assert_eq!(ram.class, CellClass::Block);
    assert!(ram.fixed);
    Ok(())
}
#[test]
fn it_adds_dummy_cells() -> DbResult<()> {
    let db = load_busy()?;
    assert_eq!(db.num_dummy(), 2);
    let fill = db.cell_by_name("fill_0").ok_or("missing fill_0")?;
    assert!(fill.dummy && fill.placed);
    assert!(fill.pins.is_empty());
    assert_eq!(fill.loc, Point::new(3600, 0));
    assert_eq!(fill.size, Point::new(400, 3200));
    let tap = db.cell_by_name("tap_0").ok_or("missing tap_0")?;
    assert!(tap.dummy && !tap.placed);
    assert_eq!(tap.id, CellId::new(6));
    Ok(())
}
#[test]
fn it_claims_placed_components() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    db.load_placement_str(
        "COMPONENTS 1 ; - g0 INV + PLACED ( 0 0 ) N ; END COMPONENTS END DESIGN",
    )?;
    let g0 = db.cell_by_name("g0").ok_or("missing g0")?;
    assert!(g0.dummy && g0.pins.is_empty());
    assert_eq!(db.num_dummy(), 1);

    // The netlist instance takes over the placed component
    db.load_netlist(resource("top.v"))?;
    assert_eq!(db.cells().len(), 1);
    assert_eq!(db.num_dummy(), 0);
    let g0 = db.cell_by_name("g0").ok_or("missing g0")?;
    assert_eq!(g0.id, CellId::new(0));
    assert!(g0.placed && !g0.dummy);
    assert_eq!(g0.pins, vec![PinId::new(2), PinId::new(3)]);
    let n = db.net_by_name("n").ok_or("missing net n")?;
    assert_eq!(n.pins, vec![PinId::new(3)]);
    assert_eq!(db.pin_location(PinId::new(2)), Some(Point::new(200, 1000)));

    let summary = db.summary();
    assert_eq!(summary.num_inst, 1);
    assert_eq!(summary.num_dummy, 0);
    assert_eq!(summary.num_pin, 4);
    Ok(())
}
#[test]
fn it_orients_placed_pins() -> DbResult<()> {
    let db = load_busy()?;
    let location = |cell: &str, pin: &str| -> Option<Point> {
        let cell = db.cell_by_name(cell)?;
        let id = cell
            .pins
            .iter()
            .copied()
            .find(|id| db.pin(*id).map(|p| p.name.starts_with(pin)) == Some(true))?;
        db.pin_location(id)
    };
    assert_eq!(location("u0", "A:"), Some(Point::new(200, 1600)));
    assert_eq!(location("u1", "A:"), Some(Point::new(1400, 1600)));
    assert_eq!(location("g0", "A1:"), Some(Point::new(200, 4800)));
    assert_eq!(location("ram", "ADDR[1]:"), Some(Point::new(40100, 41100)));

    // Rows are stored north-facing, stacked into the core
    assert!(db.rows().iter().all(|r| r.orient == Orient::N));
    assert_eq!(db.rows()[1].size, Point::new(40000, 3200));
    let a0 = db.io_by_name("a[0]").ok_or("missing a[0]")?;
    let pin = a0.pin.ok_or("unlinked port")?;
    assert_eq!(db.pin_location(pin), Some(Point::new(50, 150)));
    Ok(())
}
#[test]
fn it_applies_orientations() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library_str(
        r#"
        SITE s CLASS CORE ; SIZE 1 BY 4 ; END s
        MACRO BUF
            CLASS CORE ;
            SIZE 2 BY 4 ;
            SITE s ;
            PIN A
                DIRECTION INPUT ;
                PORT
                    LAYER M1 ;
                    RECT 0.2 0.4 0.6 0.8 ;
                END
            END A
        END BUF
        END LIBRARY
        "#,
    )?;
    db.load_netlist_str(
        r#"
        module orient (a);
            input a;
            BUF c_n (.A(a));
            BUF c_s (.A(a));
            BUF c_fn (.A(a));
            BUF c_fs (.A(a));
        endmodule
        "#,
    )?;
    db.load_placement_str(
        r#"
        DESIGN orient ;
        COMPONENTS 4 ;
            - c_n BUF + PLACED ( 0 0 ) N ;
            - c_s BUF + PLACED ( 10000 0 ) S ;
            - c_fn BUF + PLACED ( 0 10000 ) FN ;
            - c_fs BUF + PLACED ( 10000 10000 ) FS ;
        END COMPONENTS
        END DESIGN
        "#,
    )?;
    let expected = [
        Point::new(400, 600),
        Point::new(11600, 3400),
        Point::new(1600, 10600),
        Point::new(10400, 13400),
    ];
    for (k, loc) in expected.iter().enumerate() {
        let cell = db.cell(CellId::new(k)).ok_or("missing cell")?;
        assert_eq!(cell.size, Point::new(2000, 4000));
        let pin = db.pin(cell.pins[0]).ok_or("missing pin")?;
        assert_eq!(pin.offset, Point::new(400, 600));
        assert_eq!(db.pin_location(pin.id), Some(*loc));
    }
    assert_eq!(db.design_name(), Some("orient"));
    Ok(())
}
#[test]
fn it_ignores_repeated_libraries() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    db.load_library(resource("inv.lef"))?;
    assert_eq!(db.macros().len(), 1);
    assert_eq!(db.sites().len(), 1);

    // Content loaded from strings is not tracked, but duplicate names keep the first definition
    db.load_library_str(
        r#"
        MACRO INV CLASS BLOCK ; SIZE 9 BY 9 ; END INV
        MACRO BUF CLASS CORE ; SIZE 1 BY 2 ; SITE core ; END BUF
        END LIBRARY
        "#,
    )?;
    assert_eq!(db.macros().len(), 2);
    let inv = db.macro_by_name("INV").ok_or("missing INV")?;
    assert_eq!(inv.class, MacroClass::Core);
    assert_eq!(db.library().macro_id("BUF"), Some(MacroId::new(1)));
    Ok(())
}
#[test]
fn it_requires_library_first() {
    let mut db = Database::new();
    let res = db.load_netlist(resource("top.v"));
    assert!(matches!(
        res,
        Err(DbError::Precedence {
            stage: LoadStage::Netlist,
            requires: LoadStage::Library,
        })
    ));
    let res = db.load_placement_str("END DESIGN");
    assert!(matches!(
        res,
        Err(DbError::Precedence {
            stage: LoadStage::Placement,
            ..
        })
    ));
}
#[test]
fn it_rejects_missing_site() {
    let mut db = Database::new();
    let res = db.load_library_str(
        r#"
        MACRO BUF CLASS CORE ; SITE nowhere ; SIZE 1 BY 1 ; END BUF
        END LIBRARY
        "#,
    );
    match res {
        Err(DbError::MissingReference { kind, name, .. }) => {
            assert_eq!(kind, RefKind::Site);
            assert_eq!(name, "nowhere");
        }
        other => panic!("Expected MissingReference, got {:?}", other),
    }
    // Nothing from the failed load is visible
    assert!(db.macros().is_empty());
    assert!(matches!(
        db.load_netlist_str("module m; endmodule"),
        Err(DbError::Precedence { .. })
    ));
}
#[test]
fn it_rejects_missing_macros() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    let res = db.load_netlist(resource("missing.v"));
    match res {
        Err(DbError::MissingReference { kind, name, state }) => {
            assert_eq!(kind, RefKind::Macro);
            assert_eq!(name, "XOR9");
            assert_eq!(state.stage, LoadStage::Netlist);
            assert_eq!(state.line, 6);
            assert!(state.file.ends_with("missing.v"));
        }
        other => panic!("Expected MissingReference, got {:?}", other),
    }
    // The instance parsed before the failure is discarded, along with everything else
    assert!(db.cells().is_empty());
    assert!(db.nets().is_empty());
    assert!(db.ios().is_empty());
    assert_eq!(db.module_name(), None);
    Ok(())
}
#[test]
fn it_rejects_missing_nets() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    let res = db.load_netlist_str("module m (a); input a; INV g0 (.A(nope)); endmodule");
    match res {
        Err(DbError::MissingReference { kind, name, .. }) => {
            assert_eq!(kind, RefKind::Net);
            assert_eq!(name, "nope");
        }
        other => panic!("Expected MissingReference, got {:?}", other),
    }
    let res = db.load_netlist_str("module m (a); input a; INV g0 (.B(a)); endmodule");
    match res {
        Err(DbError::MissingReference { kind, name, .. }) => {
            assert_eq!(kind, RefKind::MacroPin);
            assert_eq!(name, "INV/B");
        }
        other => panic!("Expected MissingReference, got {:?}", other),
    }
    Ok(())
}
#[test]
fn it_rejects_unsupported_netlists() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    // Buses must end at bit zero
    let res = db.load_netlist_str("module m (a); input [3:1] a; endmodule");
    assert!(matches!(res, Err(DbError::Syntax { .. })));
    // Connections must be named
    let res = db.load_netlist_str("module m (a, y); input a; output y; INV g0 (a, y); endmodule");
    assert!(matches!(res, Err(DbError::Syntax { .. })));
    let res = db.load_netlist_str("module m (a); input a; INV g0 (.A(a);");
    assert!(matches!(res, Err(DbError::Syntax { .. })));
    assert!(db.cells().is_empty());
    Ok(())
}
#[test]
fn it_handles_unknown_def_pins() -> DbResult<()> {
    let def = "PINS 1 ; - bogus + NET bogus + PLACED ( 0 0 ) N ; END PINS END DESIGN";

    // Without a netlist, unknown pins are skipped
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    db.load_placement_str(def)?;
    assert!(db.ios().is_empty());

    // Once a netlist is loaded, they are errors
    db.load_netlist(resource("top.v"))?;
    match db.load_placement_str(def) {
        Err(DbError::MissingReference { kind, name, state }) => {
            assert_eq!(kind, RefKind::Pin);
            assert_eq!(name, "bogus");
            assert_eq!(state.token, "bogus");
        }
        other => panic!("Expected MissingReference, got {:?}", other),
    }
    Ok(())
}
#[test]
fn it_rejects_missing_def_macros() -> DbResult<()> {
    let mut db = Database::new();
    db.load_library(resource("inv.lef"))?;
    db.load_netlist(resource("top.v"))?;
    let res = db.load_placement_str(
        r#"
        DESIGN top ;
        DIEAREA ( 0 0 ) ( 100 100 ) ;
        COMPONENTS 2 ;
            - g0 INV + PLACED ( 500 500 ) N ;
            - g1 NOR7 + PLACED ( 0 0 ) N ;
        END COMPONENTS
        END DESIGN
        "#,
    );
    assert!(matches!(
        res,
        Err(DbError::MissingReference {
            kind: RefKind::Macro,
            ..
        })
    ));
    // Neither the die nor the earlier placement is applied
    let g0 = db.cell_by_name("g0").ok_or("missing g0")?;
    assert!(!g0.placed);
    assert_eq!(g0.loc, Point::new(0, 0));
    assert!(db.die().die.is_empty());
    assert_eq!(db.design_name(), Some("top"));
    Ok(())
}
#[test]
fn it_reports_missing_files() {
    let mut db = Database::new();
    let res = db.load_library(resource("nope.lef"));
    match res {
        Err(DbError::Io { path, .. }) => assert!(path.ends_with("nope.lef")),
        other => panic!("Expected Io error, got {:?}", other),
    }
}
#[test]
fn it_resets() -> DbResult<()> {
    let mut db = load_top()?;
    db.reset();
    assert!(db.cells().is_empty());
    assert!(db.macros().is_empty());
    assert_eq!(db.summary(), DesignSummary { dbu: DEFAULT_DBU, ..Default::default() });
    // The library record is cleared too, so it loads again
    db.load_library(resource("inv.lef"))?;
    assert_eq!(db.macros().len(), 1);
    Ok(())
}
#[test]
fn it_computes_empty_metrics() {
    let db = Database::new();
    let m = db.metrics();
    assert_eq!(m.core_area, 0);
    assert_eq!(m.utilization, 0.0);
    assert_eq!(m.density, 0.0);
}
#[test]
fn it_displays_summaries() -> DbResult<()> {
    let db = load_top()?;
    let mac = db.macro_by_name("INV").ok_or("missing INV")?;
    let info = mac.to_string();
    assert!(info.contains("MACRO : INV"));
    assert!(info.contains("CLASS : CORE"));

    let summary = db.summary().to_string();
    assert!(summary.contains("Design Statistic"));
    assert!(summary.contains("| Num Inst    : 1"));
    assert!(summary.contains("| Utilization : 20.00%"));
    assert!(db.library_summary().to_string().contains("| Num Macros  : 1"));
    Ok(())
}
#[test]
fn it_serializes_databases() -> DbResult<()> {
    let db = load_top()?;
    let yaml = Yaml.to_string(&db)?;
    let back: Database = Yaml.from_str(&yaml)?;
    assert_eq!(back.summary(), db.summary());
    assert_eq!(back.pin_location(PinId::new(2)), Some(Point::new(200, 1000)));
    Ok(())
}
#[test]
fn it_writes_schema() -> DbResult<()> {
    use schemars::schema_for;
    let schema = schema_for!(Database);
    let title = schema.schema.metadata.as_ref().and_then(|m| m.title.as_deref());
    assert_eq!(title, Some("Design Database"));
    for name in ["Library", "Macro", "Cell", "Net", "Pin", "Io", "Row", "Die"] {
        assert!(schema.definitions.contains_key(name), "missing {}", name);
    }
    let json = Json.to_string(&schema)?;
    assert!(json.contains("\"title\": \"Design Database\""));
    Ok(())
}

/// Grab the full path of resource-file `fname`
fn resource(rname: &str) -> String {
    format!("{}/resources/{}", env!("CARGO_MANIFEST_DIR"), rname)
}
