#[derive(Debug, PartialEq, Clone)]
pub struct MarkupDocument {
    pub root: Element,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub pos_start: usize,
    pub pos_end: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub pos_start: usize,
    pub pos_end: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Node {
    Element(Element),
    Text(Text),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Text {
    pub value: String,
    pub pos_start: usize,
    /// `true` for `<![CDATA[...]]>` sections.
    pub cdata: bool,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenated character data of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(&t.value);
            }
        }
        out
    }

    /// The first text child that is not pure whitespace, if any.
    /// Structural elements (objects, collections) must not carry any.
    pub fn stray_text(&self) -> Option<&Text> {
        self.children.iter().find_map(|node| match node {
            Node::Text(t) if t.cdata || !t.value.trim().is_empty() => Some(t),
            _ => None,
        })
    }
}
