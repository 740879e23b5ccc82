//! PDF tokenizer.
//!
//! Splits raw PDF bytes into [`Token`]s. Only the syntax needed to walk object
//! bodies, cross-reference trailers and object streams is recognized:
//! numbers, literal and hex strings, names, the `true`/`false`/`null`
//! keywords, the array and dictionary delimiters, `obj`/`endobj`,
//! `stream`/`endstream` and the `R` reference marker.
//!
//! Whitespace (space, `\t`, `\r`, `\n`, `\0`, `\f`) and `%` comments between
//! tokens are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// Raw literal string body, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Raw hex string body, whitespace included
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R`
    R,
}

/// PDF whitespace byte.
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter byte.
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip any run of whitespace and comments.
pub fn skip_ws(mut input: &[u8]) -> IResult<&[u8], ()> {
    loop {
        let (rest, _) = take_while(is_whitespace)(input)?;
        input = rest;
        match comment(input) {
            Ok((rest, _)) => input = rest,
            Err(_) => return Ok((input, ())),
        }
    }
}

fn number_error(input: &[u8]) -> nom::Err<NomError<&[u8]>> {
    nom::Err::Error(NomError::new(input, ErrorKind::Digit))
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    // Already validated as ASCII digits, sign and dot
    let text = std::str::from_utf8(text).map_err(|_| number_error(input))?;
    let text = text.strip_prefix('+').unwrap_or(text);

    if text.contains('.') {
        let normalized = if text.ends_with('.') {
            format!("{}0", text)
        } else {
            text.to_string()
        };
        let real = normalized.parse::<f64>().map_err(|_| number_error(input))?;
        Ok((rest, Token::Real(real)))
    } else {
        let int = text.parse::<i64>().map_err(|_| number_error(input))?;
        Ok((rest, Token::Integer(int)))
    }
}

/// Length of a literal string body starting right after its opening `(`.
///
/// Balanced parentheses nest; a backslash escapes the byte that follows it.
/// Returns the index of the closing `)` or `None` when the string never
/// closes.
pub fn literal_string_len(body: &[u8]) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            },
            _ => {},
        }
        i += 1;
    }
    None
}

fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let end = literal_string_len(body)
        .ok_or_else(|| nom::Err::Error(NomError::new(input, ErrorKind::Tag)))?;
    Ok((&body[end + 1..], Token::LiteralString(&body[..end])))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)));
    }
    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in a name.
///
/// Malformed escapes are kept literally.
///
/// ```
/// # use pdf_seal::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes("Adobe#2EPPKLite"), "Adobe.PPKLite");
/// assert_eq!(decode_name_escapes("A#Z"), "A#Z");
/// ```
pub fn decode_name_escapes(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)),
            |raw: &[u8]| Token::Name(decode_name_escapes(&String::from_utf8_lossy(raw))),
        ),
    )(input)
}

fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, token) = alt((
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::True, tag(b"true")),
        value(Token::False, tag(b"false")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::R, tag(b"R")),
    ))(input)?;

    // Alphabetic keywords must not run into a longer regular word
    let alphabetic = !matches!(
        token,
        Token::DictStart | Token::DictEnd | Token::ArrayStart | Token::ArrayEnd
    );
    if alphabetic {
        if let Some(&next) = rest.first() {
            if !is_whitespace(next) && !is_delimiter(next) {
                return Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)));
            }
        }
    }
    Ok((rest, token))
}

/// Parse one token after skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}

/// Parse an unsigned decimal integer after optional whitespace.
pub fn unsigned(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, _) = skip_ws(input)?;
    let (rest, digits) = take_while1(|c: u8| c.is_ascii_digit())(input)?;
    let text = std::str::from_utf8(digits).map_err(|_| number_error(input))?;
    let n = text.parse::<u64>().map_err(|_| number_error(input))?;
    Ok((rest, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &[u8]) -> Token<'_> {
        let (rest, tok) = token(input).unwrap();
        assert!(rest.is_empty(), "unconsumed input: {:?}", rest);
        tok
    }

    #[test]
    fn test_numbers() {
        assert_eq!(single(b"42"), Token::Integer(42));
        assert_eq!(single(b"-17"), Token::Integer(-17));
        assert_eq!(single(b"+5"), Token::Integer(5));
        assert_eq!(single(b"2.5"), Token::Real(2.5));
        assert_eq!(single(b".5"), Token::Real(0.5));
        assert_eq!(single(b"5."), Token::Real(5.0));
        assert_eq!(single(b"-.25"), Token::Real(-0.25));
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(single(b"(Signed as CEO)"), Token::LiteralString(b"Signed as CEO"));
        assert_eq!(single(b"(a (b) c)"), Token::LiteralString(b"a (b) c"));
        assert_eq!(single(b"(x\\) y)"), Token::LiteralString(b"x\\) y"));
        assert_eq!(single(b"()"), Token::LiteralString(b""));
        assert!(token(b"(never closed").is_err());
    }

    #[test]
    fn test_literal_string_len() {
        assert_eq!(literal_string_len(b"abc) tail"), Some(3));
        assert_eq!(literal_string_len(b"a\\)b) tail"), Some(4));
        assert_eq!(literal_string_len(b"a(b)c)"), Some(5));
        assert_eq!(literal_string_len(b"open"), None);
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(single(b"<00FF>"), Token::HexString(b"00FF"));
        assert_eq!(single(b"<00 ff>"), Token::HexString(b"00 ff"));
        assert_eq!(single(b"<>"), Token::HexString(b""));
    }

    #[test]
    fn test_names() {
        assert_eq!(single(b"/ByteRange"), Token::Name("ByteRange".to_string()));
        assert_eq!(single(b"/adbe.pkcs7.detached"), Token::Name("adbe.pkcs7.detached".to_string()));
        assert_eq!(single(b"/A#20B"), Token::Name("A B".to_string()));
    }

    #[test]
    fn test_name_stops_at_delimiter() {
        let (rest, tok) = token(b"/Type/Sig").unwrap();
        assert_eq!(tok, Token::Name("Type".to_string()));
        assert_eq!(rest, b"/Sig");
    }

    #[test]
    fn test_decode_name_escapes() {
        assert_eq!(decode_name_escapes("Type"), "Type");
        assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
        assert_eq!(decode_name_escapes("A#"), "A#");
        assert_eq!(decode_name_escapes("A#2"), "A#2");
        assert_eq!(decode_name_escapes("A#ZZ"), "A#ZZ");
    }

    #[test]
    fn test_keywords_and_delimiters() {
        assert_eq!(single(b"true"), Token::True);
        assert_eq!(single(b"false"), Token::False);
        assert_eq!(single(b"null"), Token::Null);
        assert_eq!(single(b"obj"), Token::ObjStart);
        assert_eq!(single(b"endobj"), Token::ObjEnd);
        assert_eq!(single(b"stream"), Token::StreamStart);
        assert_eq!(single(b"endstream"), Token::StreamEnd);
        assert_eq!(single(b"R"), Token::R);
        assert_eq!(single(b"<<"), Token::DictStart);
        assert_eq!(single(b">>"), Token::DictEnd);
        assert_eq!(single(b"["), Token::ArrayStart);
        assert_eq!(single(b"]"), Token::ArrayEnd);
    }

    #[test]
    fn test_keyword_followed_by_delimiter() {
        let (rest, tok) = token(b"R>>").unwrap();
        assert_eq!(tok, Token::R);
        assert_eq!(rest, b">>");
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(single(b"% header\n  % more\r\n 7"), Token::Integer(7));
    }

    #[test]
    fn test_object_header_sequence() {
        let mut input: &[u8] = b"12 0 obj\n<< /Type /Sig >>\nendobj";
        let mut seen = Vec::new();
        while let Ok((rest, tok)) = token(input) {
            seen.push(tok);
            input = rest;
        }
        assert_eq!(
            seen,
            vec![
                Token::Integer(12),
                Token::Integer(0),
                Token::ObjStart,
                Token::DictStart,
                Token::Name("Type".to_string()),
                Token::Name("Sig".to_string()),
                Token::DictEnd,
                Token::ObjEnd,
            ]
        );
    }

    #[test]
    fn test_unsigned() {
        assert_eq!(unsigned(b"  0000012345 00000 n").unwrap().1, 12345);
        assert!(unsigned(b"x").is_err());
    }
}
