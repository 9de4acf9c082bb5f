//! Lexer for the usda text format.

use logos::{Lexer, Logos};

fn quoted<'a>(lex: &mut Lexer<'a, Token<'a>>, quote_len: usize) -> &'a str {
    let slice = lex.slice();
    &slice[quote_len..slice.len() - quote_len]
}

fn asset_ref<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let slice = lex.slice();
    if slice.starts_with("@@@") {
        &slice[3..slice.len() - 3]
    } else {
        &slice[1..slice.len() - 1]
    }
}

fn magic<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    lex.slice()["#usda".len()..].trim()
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token<'a> {
    #[regex(r"#usda[ \t]+[0-9]+\.[0-9]+", magic, priority = 10)]
    Magic(&'a str),

    #[token("add")]
    Add,
    #[token("append")]
    Append,
    #[token("class")]
    Class,
    #[token("custom")]
    Custom,
    #[token("customData")]
    CustomData,
    #[token("def")]
    Def,
    #[token("delete")]
    Delete,
    #[token("dictionary")]
    Dictionary,
    #[token("doc")]
    Doc,
    #[token("inf")]
    Inf,
    #[token("inherits")]
    Inherits,
    #[token("kind")]
    Kind,
    #[token("None")]
    None,
    #[token("offset")]
    Offset,
    #[token("over")]
    Over,
    #[token("payload")]
    Payload,
    #[token("prepend")]
    Prepend,
    #[token("references")]
    References,
    #[token("rel")]
    Rel,
    #[token("reorder")]
    Reorder,
    #[token("scale")]
    Scale,
    #[token("specializes")]
    Specializes,
    #[token("subLayers")]
    SubLayers,
    #[token("uniform")]
    Uniform,
    #[token("variantSet")]
    VariantSet,
    #[token("variantSets")]
    VariantSets,
    #[token("variants")]
    Variants,
    #[token("varying")]
    Varying,

    /// Plain identifiers and type names, including array types such as `token[]`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(\[\])?", |lex| lex.slice())]
    Identifier(&'a str),

    /// Namespaced names (`xformOp:translate`) and names carrying a `.connect` or `.timeSamples` suffix.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(:[A-Za-z_][A-Za-z0-9_]*)+", |lex| lex.slice())]
    #[regex(r"[A-Za-z_][A-Za-z0-9_:]*\.(connect|timeSamples|spline)", |lex| lex.slice())]
    NamespacedIdentifier(&'a str),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| quoted(lex, 1))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| quoted(lex, 1))]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| quoted(lex, 3))]
    String(&'a str),

    #[regex(r"@[^@\n]*@", asset_ref)]
    #[regex(r"@@@([^@]|@[^@]|@@[^@])*@@@", asset_ref)]
    AssetRef(&'a str),

    #[regex(r"<[^<>\n]*>", |lex| quoted(lex, 1))]
    PathRef(&'a str),

    #[regex(r"[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?", |lex| lex.slice())]
    Number(&'a str),

    #[regex(r"[(){}\[\],;=:<>.&+-]", |lex| lex.slice().chars().next())]
    Punctuation(char),
}

impl<'a> Token<'a> {
    pub fn try_as_magic(self) -> Option<&'a str> {
        match self {
            Token::Magic(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_as_identifier(self) -> Option<&'a str> {
        match self {
            Token::Identifier(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_as_string(self) -> Option<&'a str> {
        match self {
            Token::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_as_asset_ref(self) -> Option<&'a str> {
        match self {
            Token::AssetRef(v) => Some(v),
            _ => None,
        }
    }

    pub fn try_as_path_ref(self) -> Option<&'a str> {
        match self {
            Token::PathRef(v) => Some(v),
            _ => None,
        }
    }
}

/// Source text of keyword tokens, so keywords can double as property names or dictionary keys.
pub fn keyword_lexeme(token: &Token<'_>) -> Option<&'static str> {
    let lexeme = match token {
        Token::Add => "add",
        Token::Append => "append",
        Token::Class => "class",
        Token::Custom => "custom",
        Token::CustomData => "customData",
        Token::Def => "def",
        Token::Delete => "delete",
        Token::Dictionary => "dictionary",
        Token::Doc => "doc",
        Token::Inf => "inf",
        Token::Inherits => "inherits",
        Token::Kind => "kind",
        Token::None => "None",
        Token::Offset => "offset",
        Token::Over => "over",
        Token::Payload => "payload",
        Token::Prepend => "prepend",
        Token::References => "references",
        Token::Rel => "rel",
        Token::Reorder => "reorder",
        Token::Scale => "scale",
        Token::Specializes => "specializes",
        Token::SubLayers => "subLayers",
        Token::Uniform => "uniform",
        Token::VariantSet => "variantSet",
        Token::VariantSets => "variantSets",
        Token::Variants => "variants",
        Token::Varying => "varying",
        _ => return None,
    };
    Some(lexeme)
}
