#![allow(dead_code)]

use protodef_core::{
    DiagnosticKind, EnumConverter, FieldType, ParseResult, PrototypeRef, TypeDescriptor,
    TypeRegistry, Value,
};

/// A small game-content schema shared by the integration tests.
pub fn registry() -> TypeRegistry {
    TypeRegistry::builder()
        .converter(EnumConverter::new("Rarity", ["Common", "Rare", "Epic"]))
        .register(
            TypeDescriptor::composite("Stats")
                .namespace("Game")
                .field("hp", FieldType::scalar("int"))
                .field_with_default("speed", FieldType::scalar("float"), Value::Float(1.0)),
        )
        .register(TypeDescriptor::composite("Effect").namespace("Game").abstract_type())
        .register(
            TypeDescriptor::composite("Burn")
                .namespace("Game")
                .base("Effect")
                .field("dps", FieldType::scalar("int")),
        )
        .register(
            TypeDescriptor::composite("Freeze")
                .namespace("Game")
                .base("Effect")
                .field("seconds", FieldType::scalar("float")),
        )
        .register(
            TypeDescriptor::prototype("ItemDef")
                .namespace("Game")
                .field("label", FieldType::scalar("string"))
                .field_with_default("price", FieldType::scalar("int"), Value::Int(0))
                .field("rarity", FieldType::scalar("Rarity"))
                .field("stats", FieldType::object("Stats"))
                .field("tags", FieldType::list(FieldType::scalar("string")))
                .field("sizes", FieldType::array(FieldType::scalar("int")))
                .field("flags", FieldType::set(FieldType::scalar("string")))
                .field("effects", FieldType::list(FieldType::object("Effect")))
                .field("upgrade", FieldType::reference("ItemDef"))
                .field("related", FieldType::set(FieldType::reference("ItemDef")))
                .field("icon", FieldType::scalar("Texture")),
        )
        .register(
            TypeDescriptor::prototype("WeaponDef")
                .namespace("Game")
                .base("ItemDef")
                .field("damage", FieldType::scalar("int")),
        )
        .register(
            TypeDescriptor::prototype("UnitDef")
                .namespace("Game")
                .field("name", FieldType::scalar("string"))
                .field("loot", FieldType::object("ItemDef"))
                .field("stats", FieldType::object("Stats")),
        )
        .register(
            TypeDescriptor::prototype("ItemDef")
                .namespace("Mods")
                .field("label", FieldType::scalar("string")),
        )
        .build()
        .unwrap()
}

/// Parses one document and fails the test on any error diagnostic.
pub fn parse_ok(registry: &TypeRegistry, source: &str) -> ParseResult {
    let result = protodef_core::parse(registry, source, "test.xml");
    if result.has_errors() {
        let lines: Vec<String> = result.diagnostics.iter().map(|d| d.to_string()).collect();
        panic!("unexpected diagnostics:\n{}", lines.join("\n"));
    }
    result
}

pub fn field(prototype: &PrototypeRef, name: &str) -> Value {
    match prototype.get(name) {
        Some(value) => value,
        None => panic!("'{}' has no field '{}'", prototype.id(), name),
    }
}

pub fn strings(value: &Value) -> Vec<String> {
    value
        .as_list()
        .expect("a list")
        .iter()
        .map(|v| v.as_str().expect("a string").to_string())
        .collect()
}

pub fn ids(prototypes: &[PrototypeRef]) -> Vec<&str> {
    prototypes.iter().map(|p| p.id()).collect()
}

pub fn kinds(result: &ParseResult) -> Vec<DiagnosticKind> {
    result.diagnostics.iter().map(|d| d.kind).collect()
}
