/// Represents the different kinds of tokens the markup lexer can produce.
///
/// The lexer runs in two modes: *content* mode between tags, where it produces
/// text runs and tag openers, and *tag* mode inside `<...>`, where it produces
/// names, attribute values and tag closers.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input file.
    Eof,
    /// Whitespace inside a tag, between the name and attributes.
    Whitespace,
    /// A `<!-- ... -->` comment. The associated `String` holds the trimmed body.
    Comment(String),
    /// A `<?...?>` processing instruction or a `<!DOCTYPE ...>` declaration.
    Declaration,
    /// Represents a token that could not be recognized by the lexer.
    Unknown,

    // == Content ==
    /// A run of character data between tags, with entities decoded.
    Text(String),
    /// The body of a `<![CDATA[ ... ]]>` section, kept verbatim.
    CData(String),

    // == Tag contents ==
    /// An element or attribute name, e.g. `Item`, `Id`, `li`.
    Name(String),
    /// A quoted attribute value, with entities decoded.
    AttrValue(String),

    // == Punctuation ==
    /// Start of an opening tag: `<`
    TagOpen,
    /// Start of a closing tag: `</`
    CloseTagOpen,
    /// End of a tag: `>`
    TagClose,
    /// End of a self-closing tag: `/>`
    EmptyTagClose,
    /// Equals: `=` between an attribute name and its value
    Equals,
}

/// A token with its type and position
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

const BOM: char = '\u{FEFF}';

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
    in_tag: bool,
}

impl<'a> Lexer<'a> {
    /// A leading byte-order mark is skipped; token positions stay byte
    /// offsets into `input`.
    pub fn new(input: &'a str) -> Self {
        let start = if input.starts_with(BOM) { BOM.len_utf8() } else { 0 };
        Self {
            input,
            chars: input[start..].chars().peekable(),
            position: start,
            in_tag: false,
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token.ttype == TokenType::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;
        let ttype = if self.in_tag {
            self.next_in_tag()
        } else {
            self.next_in_content()
        };
        Token::new(ttype, start_pos, self.position)
    }

    fn next_in_content(&mut self) -> TokenType {
        let rest = &self.input[self.position..];
        if rest.is_empty() {
            return TokenType::Eof;
        }
        if rest.starts_with("<!--") {
            self.skip(4);
            return match self.read_until("-->") {
                Some(body) => TokenType::Comment(body.trim().to_string()),
                None => TokenType::Unknown,
            };
        }
        if rest.starts_with("<![CDATA[") {
            self.skip(9);
            return match self.read_until("]]>") {
                Some(body) => TokenType::CData(body),
                None => TokenType::Unknown,
            };
        }
        if rest.starts_with("<?") {
            self.skip(2);
            return match self.read_until("?>") {
                Some(_) => TokenType::Declaration,
                None => TokenType::Unknown,
            };
        }
        if rest.starts_with("<!") {
            self.skip(2);
            return match self.read_until(">") {
                Some(_) => TokenType::Declaration,
                None => TokenType::Unknown,
            };
        }
        if rest.starts_with("</") {
            self.skip(2);
            self.in_tag = true;
            return TokenType::CloseTagOpen;
        }
        if rest.starts_with('<') {
            self.skip(1);
            self.in_tag = true;
            return TokenType::TagOpen;
        }
        self.read_text()
    }

    fn next_in_tag(&mut self) -> TokenType {
        let Some(char) = self.advance() else {
            return TokenType::Eof;
        };
        match char {
            '>' => {
                self.in_tag = false;
                TokenType::TagClose
            }
            '/' => {
                if self.peek() == Some(&'>') {
                    self.advance();
                    self.in_tag = false;
                    TokenType::EmptyTagClose
                } else {
                    TokenType::Unknown
                }
            }
            '=' => TokenType::Equals,
            '"' | '\'' => self.read_attr_value(char),
            c if c.is_whitespace() => self.read_whitespace(),
            c if is_name_start(c) => self.read_name(c),
            _ => TokenType::Unknown,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    /// Consumes input up to and including `terminator`, returning what came before it.
    /// Returns `None` (having consumed the rest of the input) if it never appears.
    fn read_until(&mut self, terminator: &str) -> Option<String> {
        let rest = &self.input[self.position..];
        match rest.find(terminator) {
            Some(index) => {
                let body = rest[..index].to_string();
                let target = self.position + index + terminator.len();
                while self.position < target {
                    self.advance();
                }
                Some(body)
            }
            None => {
                while self.advance().is_some() {}
                None
            }
        }
    }

    fn read_text(&mut self) -> TokenType {
        let start = self.position;
        while let Some(c) = self.peek() {
            if *c == '<' {
                break;
            }
            self.advance();
        }
        TokenType::Text(decode_entities(&self.input[start..self.position]))
    }

    fn read_whitespace(&mut self) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Whitespace
    }

    fn read_name(&mut self, first_char: char) -> TokenType {
        let mut name = String::new();
        name.push(first_char);
        while let Some(&c) = self.peek() {
            if is_name_char(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Name(name)
    }

    fn read_attr_value(&mut self, quote: char) -> TokenType {
        let start = self.position;
        while let Some(&c) = self.peek() {
            if c == quote {
                let raw = &self.input[start..self.position];
                let value = decode_entities(raw);
                self.advance(); // Consume the closing quote
                return TokenType::AttrValue(value);
            }
            if c == '<' {
                break;
            }
            self.advance();
        }
        TokenType::Unknown // Unclosed attribute value
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

/// Replaces the predefined entities and numeric character references.
/// Anything that does not decode is kept as written.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
