//! Inline SVG helpers.

use std::io::Cursor;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

/// Set an explicit `width` on the root `<svg>` element.
///
/// Any `height` is dropped so the `viewBox` keeps the aspect ratio.
pub fn set_width(svg: &str, width: &str) -> Result<String> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut done = false;

    loop {
        let event = reader.read_event().context("invalid SVG markup")?;
        match event {
            Event::Eof => break,
            Event::Start(e) if !done && e.local_name().as_ref() == b"svg" => {
                writer.write_event(Event::Start(resized(&e, width)?))?;
                done = true;
            }
            Event::Empty(e) if !done && e.local_name().as_ref() == b"svg" => {
                writer.write_event(Event::Empty(resized(&e, width)?))?;
                done = true;
            }
            other => writer.write_event(other)?,
        }
    }

    String::from_utf8(writer.into_inner().into_inner()).context("SVG output is not UTF-8")
}

fn resized(element: &BytesStart<'_>, width: &str) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in element.attributes() {
        let attr = attr.context("invalid SVG attribute")?;
        let key = attr.key.local_name();
        if key.as_ref() == b"width" || key.as_ref() == b"height" {
            continue;
        }
        out.push_attribute(attr);
    }
    out.push_attribute(("width", width));
    Ok(out.into_owned())
}

/// Replace line breaks with spaces so the markup stays in one paragraph.
pub fn collapse_whitespace(svg: &str) -> String {
    svg.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
