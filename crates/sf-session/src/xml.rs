use quick_xml::events::Event;
use quick_xml::Reader;

/// Text of the first element with the given local name, ignoring namespace prefixes.
pub(crate) fn element_text(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                capturing = true;
                text.clear();
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(String::new());
            }
            Ok(Event::Text(t)) if capturing => {
                text.push_str(&t.unescape().ok()?);
            }
            Ok(Event::CData(t)) if capturing => {
                text.push_str(&String::from_utf8_lossy(&t));
            }
            Ok(Event::End(e)) if capturing && e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(text.trim().to_string());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Escape a value for inclusion in element text.
pub(crate) fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}
