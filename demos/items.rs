use protodef_core::inventory;
use protodef_core::{
    EnumConverter, FieldType, ParseParams, PrototypeParser, TypeDescriptor, TypeRegistration,
    TypeRegistry,
};

fn item_def() -> TypeDescriptor {
    TypeDescriptor::prototype("ItemDef")
        .namespace("Demo")
        .field("label", FieldType::scalar("string"))
        .field("price", FieldType::scalar("int"))
        .field("rarity", FieldType::scalar("Rarity"))
        .field("tags", FieldType::list(FieldType::scalar("string")))
        .field("upgrade", FieldType::reference("ItemDef"))
}

inventory::submit! { TypeRegistration::new(item_def) }

const BASE: &str = r#"
<Items Type="ItemDef">
    <Item Id="BaseSword" Abstract="True">
        <price>10</price>
        <rarity>Common</rarity>
        <tags><li>weapon</li></tags>
    </Item>
</Items>"#;

const SWORDS: &str = r#"
<Items Type="ItemDef">
    <Item Id="IronSword" Inherits="BaseSword">
        <label>Iron Sword</label>
        <upgrade>FireSword</upgrade>
    </Item>
    <Item Id="FireSword" Inherits="BaseSword">
        <label>Fire Sword</label>
        <rarity>Epic</rarity>
        <tags OverrideAction="Combine"><li>fire</li></tags>
    </Item>
</Items>"#;

fn main() {
    let registry = match TypeRegistry::builder()
        .scan()
        .converter(EnumConverter::new("Rarity", ["Common", "Rare", "Epic"]))
        .build()
    {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to build the type registry: {e:?}");
            return;
        }
    };

    let mut parser = PrototypeParser::new(&registry);
    let params = ParseParams::default();
    parser.parse(BASE, "base.xml", &params);
    parser.parse(SWORDS, "swords.xml", &params);

    for diagnostic in parser.diagnostics() {
        eprintln!("{diagnostic}");
    }
    match parser.into_result().to_json() {
        Ok(json) => println!("Resolved prototypes:\n{json}"),
        Err(e) => eprintln!("Failed to serialize: {e:?}"),
    }
}
