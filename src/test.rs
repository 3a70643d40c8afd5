//! End-to-end tests for the worked scenarios and testable properties in
//! spec.md §8, run through the bundled parser (`crate::parser`) and the
//! interpreter against an in-memory [`SliceSource`], mirroring the teacher's
//! own end-to-end style in its original `test.rs` (parse fixture bytes, run
//! the engine, assert on the produced structure) rather than unit-testing
//! each submodule in isolation.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rstest::rstest;

use crate::interp::{Interpreter, State};
use crate::reader::SliceSource;
use crate::BTEntry;

/// Captures everything written by `Printf`/`Warning` for assertions,
/// standing in for the stdout sink a real caller would pass.
#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl Sink {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run(source: &str, bytes: &[u8]) -> Interpreter<SliceSource> {
    run_with_sink(source, bytes).0
}

fn run_with_sink(source: &str, bytes: &[u8]) -> (Interpreter<SliceSource>, Sink) {
    let sink = Sink::default();
    let mut interp = Interpreter::with_writer(SliceSource::new(bytes.to_vec()), Box::new(sink.clone()));
    interp.evaluate(source).expect("template should evaluate cleanly");
    (interp, sink)
}

fn find<'a>(tree: &'a [BTEntry], name: &str) -> &'a BTEntry {
    tree.iter().find(|e| e.name == name).unwrap_or_else(|| panic!("no entry named '{name}'"))
}

// --- A. Little-endian u32 triple ---

#[test]
fn scenario_a_little_endian_u32_triple() {
    let bytes = [
        0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
    ];
    let interp = run("LittleEndian(); uint32 a; uint32 b; uint32 c;", &bytes);
    let tree = interp.format();
    assert_eq!(tree.len(), 3);
    for (name, value, offset) in [("a", "1", 0u64), ("b", "2", 4), ("c", "3", 8)] {
        let entry = find(&tree, name);
        assert_eq!(entry.value, value);
        assert_eq!(entry.location.offset, offset);
        assert_eq!(entry.location.size, 4);
    }
    insta::with_settings!({sort_maps => true}, {
        insta::assert_yaml_snapshot!(tree);
    });
}

// --- B. Big-endian nested struct ---

#[test]
fn scenario_b_big_endian_nested_struct() {
    let bytes = [0x00, 0x01, 0x00, 0x02, 0xFF];
    let interp = run(
        "BigEndian(); struct S { uint16 x; uint16 y; } s; uint8 t;",
        &bytes,
    );
    let tree = interp.format();
    assert_eq!(tree.len(), 2);

    let s = find(&tree, "s");
    assert_eq!(s.location.offset, 0);
    assert_eq!(s.location.size, 4);
    let x = find(&s.children, "x");
    assert_eq!(x.value, "1");
    assert_eq!(x.location.offset, 0);
    assert_eq!(x.location.size, 2);
    let y = find(&s.children, "y");
    assert_eq!(y.value, "2");
    assert_eq!(y.location.offset, 2);
    assert_eq!(y.location.size, 2);

    let t = find(&tree, "t");
    assert_eq!(t.value, "255");
    assert_eq!(t.location.offset, 4);
    assert_eq!(t.location.size, 1);
}

// --- C. Union overlap ---

#[test]
fn scenario_c_union() {
    let bytes = [0x78, 0x56, 0x34, 0x12, 0xAA];
    let interp = run(
        "union U { uint32 i; uint16 s[2]; } u; uint8 b;",
        &bytes,
    );
    assert_eq!(interp.reader().offset(), 4, "cursor after union is 4");
    let tree = interp.format();

    let u = find(&tree, "u");
    assert_eq!(u.location.offset, 0);
    assert_eq!(u.location.size, 4);
    let i = find(&u.children, "i");
    assert_eq!(i.value, format!("{}", 0x12345678u32));
    assert_eq!(i.location.offset, 0);
    assert_eq!(i.location.size, 4);
    let s = find(&u.children, "s");
    assert_eq!(s.location.offset, 0);
    assert_eq!(s.children[0].value, format!("{}", 0x5678u32));
    assert_eq!(s.children[0].location.offset, 0);
    assert_eq!(s.children[1].value, format!("{}", 0x1234u32));
    assert_eq!(s.children[1].location.offset, 2);

    let b = find(&tree, "b");
    assert_eq!(b.value, "170");
    assert_eq!(b.location.offset, 4);
}

// --- D. Bitfields ---

#[test]
fn scenario_d_bitfields() {
    let bytes = [0b1101_0110u8, 0xAB];
    let interp = run("struct F { uint a:3; uint b:5; uint c:8; } f;", &bytes);
    let tree = interp.format();
    let f = find(&tree, "f");
    assert_eq!(f.location.size, 2, "sizeof(F) == 2");
    assert_eq!(find(&f.children, "a").value, "6");
    assert_eq!(find(&f.children, "b").value, "26");
    assert_eq!(find(&f.children, "c").value, "171");
}

#[rstest]
#[case(1, 8, 1)]
#[case(3, 8, 1)]
#[case(7, 8, 1)]
#[case(9, 8, 2)]
#[case(16, 8, 2)]
fn bitfield_packing_storage_units(#[case] count: u32, #[case] width: u32, #[case] expected_bytes: u64) {
    let _ = width;
    let template = format!(
        "struct F {{ {} }} f;",
        (0..count).map(|i| format!("uint8 b{i}:1;")).collect::<Vec<_>>().join(" ")
    );
    let bytes = vec![0u8; 4];
    let interp = run(&template, &bytes);
    let tree = interp.format();
    let f = find(&tree, "f");
    assert_eq!(f.location.size, expected_bytes);
}

// --- E. FSeek + ReadUInt peek ---

#[test]
fn scenario_e_fseek_readuint_peek() {
    let mut bytes = vec![0u8; 4];
    bytes.extend_from_slice(&[0, 0, 0, 0]); // bytes 4..8, skipped over by FSeek
    bytes.extend_from_slice(&[0x07, 0x00, 0x00, 0x00]); // bytes 8..12
    let (interp, sink) = run_with_sink(
        "FSeek(4); local uint32 v = ReadUInt(8); Printf(\"%u\", v);",
        &bytes,
    );
    assert_eq!(sink.text(), "7");
    assert_eq!(interp.reader().offset(), 4, "Printf/ReadUInt do not move the cursor");
}

// --- F. Enum auto-values ---

#[test]
fn scenario_f_enum_auto_values() {
    let bytes = [0x0A, 0x00, 0x00, 0x00];
    let interp = run("enum <uint> E { A=1, B, C=10, D }; E e;", &bytes);
    let tree = interp.format();
    let e = find(&tree, "e");
    assert_eq!(e.value, "C");
}

// --- Testable properties (spec.md §8) ---

#[test]
fn property_endianness_idempotence() {
    let le = run("LittleEndian(); uint32 a;", &[0x01, 0x00, 0x00, 0x00]);
    assert_eq!(find(&le.format(), "a").value, "1");
    let be = run("BigEndian(); uint32 a;", &[0x00, 0x00, 0x00, 0x01]);
    assert_eq!(find(&be.format(), "a").value, "1");
}

#[test]
fn property_redeclaration_is_an_error() {
    let mut interp = Interpreter::new(SliceSource::new(vec![0u8; 8]));
    let err = interp.evaluate("uint8 a; uint8 a;");
    assert!(err.is_err());
    assert_eq!(interp.state(), State::Error);
    assert!(interp.format().is_empty());
}

#[test]
fn property_local_and_const_do_not_advance_cursor() {
    let interp = run("local uint32 v = 5; const uint32 k = 9;", &[0u8; 8]);
    assert_eq!(interp.reader().offset(), 0);
    assert!(interp.format().is_empty(), "locals/consts are not top-level allocations");
}

#[test]
fn property_peek_leaves_ftell_unchanged() {
    let mut bytes = vec![0u8; 4];
    bytes.extend_from_slice(&[9, 0, 0, 0]);
    let interp = run("FSeek(0); local uint32 v = ReadUInt(4);", &bytes);
    assert_eq!(interp.reader().offset(), 0);
}
