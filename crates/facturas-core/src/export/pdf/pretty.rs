//! XML pretty printer used for the rendered invoice pages.
//!
//! Every tag, text node and comment goes on its own line, indented by
//! nesting depth. Text content is never collapsed onto its parent's line.
//! Attribute and text bytes are kept exactly as written in the source.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;

/// Re-indent `xml` with `indent` spaces per level.
pub fn pretty_print(xml: &str, indent: usize) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines: Vec<String> = Vec::new();
    let mut depth = 0usize;

    let mut push = |depth: usize, content: String| {
        lines.push(format!("{}{}", " ".repeat(depth * indent), content));
    };

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(ParseError::Malformed {
                    position: reader.error_position(),
                    message: e.to_string(),
                })
            }
        };

        match event {
            Event::Decl(decl) => push(depth, format!("<?{}?>", lossy(&decl))),
            Event::Start(start) => {
                push(depth, format!("<{}>", lossy(&start)));
                depth += 1;
            }
            Event::Empty(start) => push(depth, format!("<{}/>", lossy(&start))),
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                push(depth, format!("</{}>", lossy(end.name().as_ref())));
            }
            Event::Text(text) => push(depth, lossy(&text)),
            Event::CData(data) => push(depth, format!("<![CDATA[{}]]>", lossy(&data))),
            Event::Comment(comment) => push(depth, format!("<!--{}-->", lossy(&comment))),
            Event::PI(pi) => push(depth, format!("<?{}?>", lossy(&pi))),
            Event::DocType(doctype) => push(depth, format!("<!DOCTYPE {}>", lossy(&doctype))),
            Event::Eof => break,
        }
    }

    Ok(lines.join("\n"))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pretty_print_layout() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><cfdi:Comprobante Folio="1"><cfdi:Emisor Nombre="ACME &amp; Co"/><notas>Hola   mundo</notas><!-- fin --></cfdi:Comprobante>"#;

        let expected = [
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<cfdi:Comprobante Folio="1">"#,
            r#"  <cfdi:Emisor Nombre="ACME &amp; Co"/>"#,
            r#"  <notas>"#,
            r#"    Hola   mundo"#,
            r#"  </notas>"#,
            r#"  <!-- fin -->"#,
            r#"</cfdi:Comprobante>"#,
        ]
        .join("\n");

        assert_eq!(pretty_print(xml, 2).unwrap(), expected);
    }

    #[test]
    fn test_pretty_print_reindents() {
        let xml = "<a>\n\t\t<b>\n<c/>\n      </b>\n</a>";
        assert_eq!(pretty_print(xml, 2).unwrap(), "<a>\n  <b>\n    <c/>\n  </b>\n</a>");
    }

    #[test]
    fn test_pretty_print_rejects_mismatched_tags() {
        assert!(pretty_print("<a><b></a>", 2).is_err());
    }
}
