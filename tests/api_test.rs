mod common;

use common::{field, ids, registry};
use protodef_core::inventory;
use protodef_core::{
    parse, DiagnosticKind, FieldType, ParseParams, ProtoError, PrototypeParser, TypeDescriptor,
    TypeRegistration, TypeRegistry, Value,
};
use std::fs;

fn scanned_unit() -> TypeDescriptor {
    TypeDescriptor::prototype("ScannedUnit")
        .namespace("Plugin")
        .field("hp", FieldType::scalar("int"))
        .field("buddy", FieldType::object("ScannedUnit"))
}

inventory::submit! { TypeRegistration::new(scanned_unit) }

#[test]
fn test_scan_registers_submitted_types() {
    let registry = TypeRegistry::scan().unwrap();
    let unit = registry.find("ScannedUnit", "").unwrap();
    assert_eq!(unit.qualified_name(), "Plugin.ScannedUnit");
    assert_eq!(
        unit.field_descriptor("buddy").unwrap().ty,
        FieldType::reference("Plugin.ScannedUnit")
    );

    let result = parse(
        &registry,
        r#"<Units Type="ScannedUnit"><Item Id="A"><hp>3</hp><buddy>A</buddy></Item></Units>"#,
        "plugin.xml",
    );
    assert!(result.diagnostics.is_empty());
    assert_eq!(field(result.get("A").unwrap(), "hp"), Value::Int(3));
}

#[test]
fn test_scan_is_idempotent() {
    let registry = TypeRegistry::builder().scan().scan().build().unwrap();
    assert_eq!(registry.types().count(), 1);
}

#[test]
fn test_parse_many_rejects_mismatched_batch() {
    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    let err = parser
        .parse_many(
            &[r#"<Items Type="ItemDef"><Item Id="A"/></Items>"#],
            &["a.xml", "b.xml"],
            &ParseParams::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProtoError::MismatchedBatch {
            contents: 1,
            names: 2
        }
    ));
    assert!(parser.prototypes().is_empty());
    assert!(parser.diagnostics().is_empty());
}

#[test]
fn test_parse_many_shares_references() {
    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    let created = parser
        .parse_many(
            &[
                r#"<Units Type="UnitDef"><Item Id="Knight"><loot>Lance</loot></Item></Units>"#,
                r#"<Items Type="ItemDef"><Item Id="Lance" Type="WeaponDef"/></Items>"#,
            ],
            &["units.xml", "items.xml"],
            &ParseParams::default(),
        )
        .unwrap();
    assert_eq!(ids(&created), vec!["Knight", "Lance"]);
    let loot = field(&created[0], "loot");
    assert!(loot.as_reference().unwrap().ptr_eq(&created[1]));
}

#[test]
fn test_parse_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.xml");
    let derived = dir.path().join("derived.xml");
    fs::write(
        &base,
        r#"<Items Type="ItemDef"><Item Id="Base" Abstract="True"><price>9</price></Item></Items>"#,
    )
    .unwrap();
    fs::write(
        &derived,
        "<Items Type=\"ItemDef\">\n<Item Id=\"Derived\" Inherits=\"Base\"><bogus/></Item>\n</Items>",
    )
    .unwrap();

    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    let created = parser
        .parse_files(&[&base, &derived], &ParseParams::default())
        .unwrap();
    assert_eq!(ids(&created), vec!["Derived"]);
    assert_eq!(field(&created[0], "price"), Value::Int(9));

    let diagnostic = &parser.diagnostics()[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::UnknownField);
    assert_eq!(diagnostic.file, derived.display().to_string());
    assert_eq!(diagnostic.line, 2);
}

#[test]
fn test_parse_files_with_byte_order_mark() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bom.xml");
    fs::write(
        &path,
        "\u{FEFF}<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <Items Type=\"ItemDef\">\n<Item Id=\"A\"><price>3</price></Item>\n</Items>",
    )
    .unwrap();

    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    let created = parser.parse_files(&[&path], &ParseParams::default()).unwrap();
    assert!(parser.diagnostics().is_empty(), "{:?}", parser.diagnostics());
    assert_eq!(ids(&created), vec!["A"]);
    assert_eq!(field(&created[0], "price"), Value::Int(3));
    assert_eq!(parser.definition("A").unwrap().location().line, 3);
}

#[test]
fn test_release_clears_referencing_prototypes() {
    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    parser.parse(
        r#"<Items Type="ItemDef">
             <Item Id="Loop"><price>1</price><upgrade>Loop</upgrade></Item>
           </Items>"#,
        "loop.xml",
        &ParseParams::default(),
    );
    let held = parser.get("Loop").unwrap().clone();
    assert!(field(&held, "upgrade").as_reference().unwrap().ptr_eq(&held));

    parser.into_result().release();
    assert_eq!(held.id(), "Loop");
    assert!(held.fields().is_empty());
}

#[test]
fn test_parse_files_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.xml");
    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    match parser.parse_files(&[missing], &ParseParams::default()) {
        Err(ProtoError::Io { path, .. }) => assert!(path.ends_with("missing.xml")),
        other => panic!("expected an Io error, got {other:?}"),
    }
}

#[test]
fn test_definition_lookup() {
    let registry = registry();
    let mut parser = PrototypeParser::new(&registry);
    parser.parse(
        r#"<Items Type="ItemDef">
            <Item Id="Base" Abstract="True"><tags><li>a</li></tags></Item>
            <Item Id="Child" Inherits="Base" Type="WeaponDef"/>
        </Items>"#,
        "defs.xml",
        &ParseParams::default(),
    );
    let child = parser.definition("Child").unwrap();
    assert_eq!(child.inherits.as_deref(), Some("Base"));
    assert_eq!(child.type_override.as_deref(), Some("WeaponDef"));
    assert_eq!(child.descriptor().qualified_name(), "Game.WeaponDef");
    // Staged bodies hold only what the item itself states.
    assert!(child.body.fields.is_empty());
    assert_eq!(parser.definition("Base").unwrap().body.fields.len(), 1);
    assert!(parser.definition("Missing").is_none());
}

#[test]
fn test_to_json() {
    let registry = registry();
    let result = parse(
        &registry,
        r#"<Items Type="ItemDef">
            <Item Id="A"><price>3</price><stats><hp>2</hp></stats><upgrade>B</upgrade></Item>
            <Item Id="B"><tags><li>x</li></tags><upgrade>Gone</upgrade></Item>
        </Items>"#,
        "json.xml",
    );
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "prototypes": [
                {
                    "id": "A",
                    "type": "Game.ItemDef",
                    "fields": {
                        "price": 3,
                        "stats": { "type": "Game.Stats", "fields": { "hp": 2, "speed": 1.0 } },
                        "upgrade": "B"
                    }
                },
                {
                    "id": "B",
                    "type": "Game.ItemDef",
                    "fields": { "price": 0, "tags": ["x"], "upgrade": null }
                }
            ],
            "diagnostics": [
                {
                    "severity": "Warning",
                    "kind": "UnresolvedReference",
                    "file": "json.xml",
                    "line": 3,
                    "message": "no prototype with id 'Gone'; the reference is left empty"
                }
            ]
        })
    );
}

#[test]
fn test_to_yaml() {
    let registry = registry();
    let result = parse(
        &registry,
        r#"<Items Type="ItemDef"><Item Id="A"><label>Apple</label></Item></Items>"#,
        "yaml.xml",
    );
    let yaml = result.to_yaml().unwrap();
    assert!(yaml.contains("id: A"), "{yaml}");
    assert!(yaml.contains("label: Apple"), "{yaml}");
    assert!(yaml.contains("diagnostics: []"), "{yaml}");
}
